//! Scheduled wipe via the boot command line.
//!
//! The boot partition is mounted synchronously, so writing a staging file
//! next to `cmdline.txt` and renaming it over the original means a reboot at
//! any point sees either the old or the new command line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

/// Token picked up by the init system to wipe the data partitions on boot.
pub const WIPE_DIRECTIVE: &str = "haos.wipe=1";

/// Mode of the rewritten boot command-line file.
const CMDLINE_MODE: u32 = 0o644;

/// Append `token` to a space-separated command line.
///
/// Trailing ASCII whitespace (including the final newline) is dropped first.
/// Everything before it is kept byte for byte, whatever its encoding.
pub fn append_token(cmdline: &[u8], token: &str) -> Vec<u8> {
    let trimmed = cmdline.trim_ascii_end();
    let mut updated = Vec::with_capacity(trimmed.len() + token.len() + 1);
    updated.extend_from_slice(trimmed);
    if !trimmed.is_empty() {
        updated.push(b' ');
    }
    updated.extend_from_slice(token.as_bytes());
    updated
}

/// The boot command-line file and its staging file in the same directory.
#[derive(Debug, Clone)]
pub struct BootCmdline {
    path: PathBuf,
    staging_path: PathBuf,
}

impl BootCmdline {
    /// `path` must name a file inside a directory (checked by config validation).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cmdline.txt".to_string());
        let staging_path = path.with_file_name(format!(".tmp.{file_name}"));
        Self { path, staging_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Append the wipe directive and atomically replace the boot file.
    pub fn schedule_wipe(&self) -> Result<()> {
        self.stage(WIPE_DIRECTIVE)?.commit()?;
        tracing::info!("Device will get wiped on next reboot!");
        Ok(())
    }

    /// Write the updated command line to the staging file.
    ///
    /// The boot file itself is untouched until [`StagedCmdline::commit`].
    pub fn stage(&self, token: &str) -> Result<StagedCmdline<'_>> {
        let current = fs::read(&self.path).map_err(|e| {
            tracing::error!("Failed to read {}: {}", self.path.display(), e);
            AgentError::io(format!("Failed to read {}", self.path.display()), e)
        })?;

        let updated = append_token(&current, token);
        write_synced(&self.staging_path, &updated).map_err(|e| {
            tracing::error!("Failed to write {}: {}", self.staging_path.display(), e);
            AgentError::io(format!("Failed to write {}", self.staging_path.display()), e)
        })?;

        Ok(StagedCmdline { target: self })
    }
}

/// A fully written staging file waiting to replace the boot file.
#[derive(Debug)]
pub struct StagedCmdline<'a> {
    target: &'a BootCmdline,
}

impl StagedCmdline<'_> {
    /// Rename the staging file over the boot file.
    pub fn commit(self) -> Result<()> {
        fs::rename(&self.target.staging_path, &self.target.path).map_err(|e| {
            tracing::error!(
                "Failed to rename {} to {}: {}",
                self.target.staging_path.display(),
                self.target.path.display(),
                e
            );
            AgentError::io(
                format!("Failed to replace {}", self.target.path.display()),
                e,
            )
        })
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CMDLINE_MODE)
        .open(path)?;
    // A leftover staging file keeps its old mode, and the umask applies on create
    file.set_permissions(fs::Permissions::from_mode(CMDLINE_MODE))?;
    file.write_all(contents)?;
    file.sync_all()
}
