//! Kernel module state property.
//!
//! A single cached boolean mirrors whether one kernel module is loaded. It is
//! seeded from `/proc/modules` at startup and changed only by property
//! writes, each of which issues one module-loader command in the matching
//! direction.
//!
//! With [`ModuleWritePolicy::Optimistic`] the cache takes the requested value
//! as soon as the loader has started. A loader that starts but then fails in
//! the kernel is logged and NOT reported to the writer, so the cached value
//! can disagree with the kernel until the next write. This is a known
//! limitation kept on purpose; [`ModuleWritePolicy::Verified`] is the opt-in
//! alternative that waits and reconciles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use strum::Display;

use crate::command::{CommandArgs, CommandLauncher};
use crate::config::ModuleWritePolicy;
use crate::error::{AgentError, Result};

/// Direction of a module-loader invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ModuleAction {
    Load,
    Unload,
}

impl ModuleAction {
    pub fn for_target(loaded: bool) -> Self {
        if loaded { Self::Load } else { Self::Unload }
    }
}

/// Typed arguments for `modprobe`.
///
/// | Action   | Arguments                |
/// |----------|--------------------------|
/// | `Load`   | `<module>`               |
/// | `Unload` | `--remove <module>`      |
#[derive(Debug, Clone)]
pub struct ModprobeArgs {
    pub loader: PathBuf,
    pub module: String,
    pub action: ModuleAction,
}

impl CommandArgs for ModprobeArgs {
    fn program(&self) -> &Path {
        &self.loader
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self.action {
            ModuleAction::Load => vec![self.module.clone()],
            ModuleAction::Unload => vec!["--remove".to_string(), self.module.clone()],
        }
    }
}

/// Kernel module names treat `-` and `_` as the same character.
pub fn same_module_name(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .all(|(x, y)| x == y || matches!((x, y), (b'-', b'_') | (b'_', b'-')))
}

/// Returns true if `module` appears in a `/proc/modules` style listing.
pub fn listing_contains(listing: &str, module: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| same_module_name(name, module))
}

/// Read whether `module` is currently loaded.
pub fn is_loaded(proc_modules: &Path, module: &str) -> Result<bool> {
    let listing = fs::read_to_string(proc_modules).map_err(|e| {
        AgentError::io(format!("Failed to read {}", proc_modules.display()), e)
    })?;
    Ok(listing_contains(&listing, module))
}

/// The module-loaded property and its write hook.
pub struct ModuleStateProperty {
    module: String,
    loader: PathBuf,
    proc_modules: PathBuf,
    policy: ModuleWritePolicy,
    loaded: AtomicBool,
    launcher: Box<dyn CommandLauncher>,
}

impl ModuleStateProperty {
    /// Seed the cached state from the live module table.
    ///
    /// An unreadable table seeds `false`.
    pub fn init(
        module: impl Into<String>,
        loader: impl Into<PathBuf>,
        proc_modules: impl Into<PathBuf>,
        policy: ModuleWritePolicy,
        launcher: Box<dyn CommandLauncher>,
    ) -> Self {
        let module = module.into();
        let proc_modules = proc_modules.into();
        let loaded = is_loaded(&proc_modules, &module).unwrap_or_else(|e| {
            tracing::warn!("Cannot determine state of module {}: {}", module, e);
            false
        });
        tracing::info!("Kernel module {} loaded: {}", module, loaded);

        Self {
            module,
            loader: loader.into(),
            proc_modules,
            policy,
            loaded: AtomicBool::new(loaded),
            launcher,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Last cached state. Not re-checked against the kernel.
    pub fn get(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Handle a property write: update the cache and issue one loader command.
    pub fn on_write(&self, value: bool) -> Result<()> {
        let args = ModprobeArgs {
            loader: self.loader.clone(),
            module: self.module.clone(),
            action: ModuleAction::for_target(value),
        };
        tracing::info!("Setting {} loaded: {} ({})", self.module, value, args.display());

        match self.policy {
            ModuleWritePolicy::Optimistic => self.write_optimistic(value, &args),
            ModuleWritePolicy::Verified => self.write_verified(value, &args),
        }
    }

    fn write_optimistic(&self, value: bool, args: &ModprobeArgs) -> Result<()> {
        let previous = self.loaded.swap(value, Ordering::SeqCst);

        if let Err(e) = self.launcher.spawn_detached(args.program(), &args.to_cli_args()) {
            // Nothing was issued, so the property keeps its old value
            self.loaded.store(previous, Ordering::SeqCst);
            tracing::error!("Failed to start {}: {}", args.program().display(), e);
            return Err(AgentError::io(
                format!("Failed to start {}", args.program().display()),
                e,
            ));
        }
        Ok(())
    }

    fn write_verified(&self, value: bool, args: &ModprobeArgs) -> Result<()> {
        self.loaded.store(value, Ordering::SeqCst);

        let output = self
            .launcher
            .run(args.program(), &args.to_cli_args())
            .map_err(|e| {
                AgentError::io(format!("Failed to start {}", args.program().display()), e)
            });

        let actual = is_loaded(&self.proc_modules, &self.module);
        if let Ok(actual) = actual {
            self.loaded.store(actual, Ordering::SeqCst);
        }

        let output = output?;
        let actual = actual?;
        if actual != value {
            let reason = if output.success {
                "kernel state did not change".to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(AgentError::ModuleState(format!(
                "{} {} failed: {}",
                args.action, self.module, reason
            )));
        }
        Ok(())
    }
}
