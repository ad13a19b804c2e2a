//! haos-agent library
//!
//! A privileged agent that lets the host management process trigger a
//! handful of destructive maintenance operations over D-Bus without running
//! as root itself: wiping the data partitions now or on next boot, managing
//! root's authorized SSH keys and toggling the USB/IP kernel module.

pub mod boot_cmdline;
pub mod cli;
pub mod command;
pub mod config;
pub mod dbus;
pub mod error;
pub mod kernel_module;
pub mod sanity;
pub mod service;
pub mod shutdown;
pub mod ssh_keys;
pub mod storage;
pub mod wipe;

// Re-export main types for convenience
pub use boot_cmdline::{BootCmdline, StagedCmdline, WIPE_DIRECTIVE};
pub use command::{CommandArgs, CommandLauncher, CommandOutput, SystemLauncher};
pub use config::{AgentConfig, BusKind, ModuleWritePolicy};
pub use error::{AgentError, Result};
pub use kernel_module::{ModprobeArgs, ModuleAction, ModuleStateProperty};
pub use service::SystemService;
pub use ssh_keys::AuthorizedKeys;
pub use storage::{StorageBackend, VolumeHandle, VolumeResolver};
pub use wipe::{LABEL_DATA_FILESYSTEM, LABEL_OVERLAY_FILESYSTEM, WipeOrchestrator};
