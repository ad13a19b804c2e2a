//! The agent's operations, independent of the bus they are served on.

use crate::boot_cmdline::BootCmdline;
use crate::command::CommandLauncher;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::kernel_module::ModuleStateProperty;
use crate::ssh_keys::AuthorizedKeys;
use crate::storage::StorageBackend;
use crate::wipe::WipeOrchestrator;

/// Owns every component behind the `io.hass.os.System` interface.
///
/// Handlers share no locks. The module flag is the only shared mutable
/// state and concurrent writes to it are last-write-wins.
pub struct SystemService {
    storage: Box<dyn StorageBackend>,
    boot_cmdline: BootCmdline,
    authorized_keys: AuthorizedKeys,
    module_state: ModuleStateProperty,
}

impl SystemService {
    pub fn new(
        config: &AgentConfig,
        storage: Box<dyn StorageBackend>,
        launcher: Box<dyn CommandLauncher>,
    ) -> Self {
        Self {
            storage,
            boot_cmdline: BootCmdline::new(&config.boot_cmdline),
            authorized_keys: AuthorizedKeys::new(&config.ssh_authorized_keys),
            module_state: ModuleStateProperty::init(
                config.kernel_module.clone(),
                &config.module_loader,
                &config.proc_modules,
                config.module_write_policy,
                launcher,
            ),
        }
    }

    pub fn wipe_device(&self) -> Result<()> {
        WipeOrchestrator::new(self.storage.as_ref()).wipe_device()
    }

    pub fn schedule_wipe_device(&self) -> Result<()> {
        self.boot_cmdline.schedule_wipe()
    }

    pub fn add_ssh_auth_key(&self, key: &str) -> Result<()> {
        self.authorized_keys.add_key(key)
    }

    pub fn clear_ssh_auth_keys(&self) -> Result<()> {
        self.authorized_keys.clear_keys()
    }

    pub fn module_loaded(&self) -> bool {
        self.module_state.get()
    }

    pub fn set_module_loaded(&self, value: bool) -> Result<()> {
        self.module_state.on_write(value)
    }

    pub fn module_name(&self) -> &str {
        self.module_state.module()
    }
}
