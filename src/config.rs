//! Agent configuration.
//!
//! Every field has a default matching the production device layout, so the
//! agent runs without a configuration file. A JSON file can override any
//! subset of fields (useful for pointing the agent at a test tree or a
//! session bus).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::error::{AgentError, Result};

/// Well-known bus name requested by the agent.
pub const DEFAULT_BUS_NAME: &str = "io.hass.os";
/// Boot command-line file read by the boot loader.
pub const DEFAULT_BOOT_CMDLINE: &str = "/mnt/boot/cmdline.txt";
/// Authorized keys of the root user.
pub const DEFAULT_SSH_AUTHORIZED_KEYS: &str = "/root/.ssh/authorized_keys";
/// USB/IP virtual host controller driver.
pub const DEFAULT_KERNEL_MODULE: &str = "vhci-hcd";
pub const DEFAULT_MODULE_LOADER: &str = "/sbin/modprobe";
pub const DEFAULT_PROC_MODULES: &str = "/proc/modules";

/// Which message bus the agent serves on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

/// How a write to the module-state property is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleWritePolicy {
    /// Cache the requested state, start the loader and return without
    /// waiting. A kernel-level failure is logged but never reported.
    #[default]
    Optimistic,
    /// Wait for the loader, re-read the kernel module table and fail the
    /// write if the kernel does not match the requested state.
    Verified,
}

/// Runtime configuration of the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub bus: BusKind,
    pub bus_name: String,
    pub boot_cmdline: PathBuf,
    pub ssh_authorized_keys: PathBuf,
    pub kernel_module: String,
    pub module_loader: PathBuf,
    pub proc_modules: PathBuf,
    pub module_write_policy: ModuleWritePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::System,
            bus_name: DEFAULT_BUS_NAME.to_string(),
            boot_cmdline: PathBuf::from(DEFAULT_BOOT_CMDLINE),
            ssh_authorized_keys: PathBuf::from(DEFAULT_SSH_AUTHORIZED_KEYS),
            kernel_module: DEFAULT_KERNEL_MODULE.to_string(),
            module_loader: PathBuf::from(DEFAULT_MODULE_LOADER),
            proc_modules: PathBuf::from(DEFAULT_PROC_MODULES),
            module_write_policy: ModuleWritePolicy::Optimistic,
        }
    }
}

impl AgentConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        fs::write(&path, json).map_err(|e| {
            AgentError::io(
                format!("Failed to write configuration to {:?}", path.as_ref()),
                e,
            )
        })?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            AgentError::io(
                format!("Failed to read configuration from {:?}", path.as_ref()),
                e,
            )
        })?;

        let config: Self = serde_json::from_str(&content)?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bus_name.trim().is_empty() {
            return Err(AgentError::config("Bus name must not be empty"));
        }

        if self.boot_cmdline.as_os_str().is_empty() {
            return Err(AgentError::config("Boot command-line path must be specified"));
        }
        // The staging file lives next to the boot file, so both parts are required
        match (self.boot_cmdline.parent(), self.boot_cmdline.file_name()) {
            (Some(parent), Some(_)) if !parent.as_os_str().is_empty() => {}
            _ => {
                return Err(AgentError::config(format!(
                    "Boot command-line path {:?} must name a file inside a directory",
                    self.boot_cmdline
                )));
            }
        }

        if self.ssh_authorized_keys.as_os_str().is_empty() {
            return Err(AgentError::config("SSH authorized keys path must be specified"));
        }

        let module = self.kernel_module.trim();
        if module.is_empty() {
            return Err(AgentError::config("Kernel module name must be specified"));
        }
        if module.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(AgentError::config(format!(
                "Kernel module name {:?} must not contain whitespace or '/'",
                self.kernel_module
            )));
        }

        if self.module_loader.as_os_str().is_empty() {
            return Err(AgentError::config("Module loader path must be specified"));
        }
        if self.proc_modules.as_os_str().is_empty() {
            return Err(AgentError::config("Module listing path must be specified"));
        }

        Ok(())
    }
}
