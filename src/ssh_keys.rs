//! Authorized SSH keys of the root user.
//!
//! Keys are opaque lines: no syntax validation happens here, the caller is
//! trusted to hand over well-formed credential material.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone)]
pub struct AuthorizedKeys {
    path: PathBuf,
}

impl AuthorizedKeys {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one key line, creating the file (and its directory) if needed.
    pub fn add_key(&self, key: &str) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(dir)
                .map_err(|e| AgentError::io(format!("Failed to create {}", dir.display()), e))?;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o644)
            .open(&self.path)
            .map_err(|e| {
                tracing::error!(
                    "Failed to open SSH authentication file {}: {}",
                    self.path.display(),
                    e
                );
                AgentError::io(format!("Failed to open {}", self.path.display()), e)
            })?;

        file.write_all(format!("{key}\n").as_bytes()).map_err(|e| {
            tracing::error!("Failed to write SSH authentication file: {}.", e);
            AgentError::io(format!("Failed to write {}", self.path.display()), e)
        })?;

        tracing::info!("New SSH authentication key added for user root.");
        Ok(())
    }

    /// Delete the whole file. A missing file counts as already cleared.
    pub fn clear_keys(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("SSH authentication keys cleared for user root.");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(
                    "Failed to delete SSH authentication file {}: {}",
                    self.path.display(),
                    e
                );
                Err(AgentError::io(
                    format!("Failed to delete {}", self.path.display()),
                    e,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_add_key_last_line_is_key() {
        let dir = TempDir::new().expect("tempdir");
        let keys = AuthorizedKeys::new(dir.path().join("authorized_keys"));

        keys.add_key("ssh-ed25519 AAAAfirst first@host").expect("first");
        keys.add_key("abc").expect("second");

        let contents = fs::read_to_string(keys.path()).expect("read back");
        assert_eq!(contents.lines().last(), Some("abc"));
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_add_key_creates_ssh_directory() {
        let dir = TempDir::new().expect("tempdir");
        let keys = AuthorizedKeys::new(dir.path().join(".ssh").join("authorized_keys"));

        keys.add_key("abc").expect("add");

        let meta = fs::metadata(dir.path().join(".ssh")).expect("dir exists");
        assert!(meta.is_dir());
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn test_clear_keys_removes_file() {
        let dir = TempDir::new().expect("tempdir");
        let keys = AuthorizedKeys::new(dir.path().join("authorized_keys"));
        keys.add_key("abc").expect("add");

        keys.clear_keys().expect("clear");
        assert!(!keys.path().exists());
    }

    #[test]
    fn test_clear_keys_missing_file_is_success() {
        let dir = TempDir::new().expect("tempdir");
        let keys = AuthorizedKeys::new(dir.path().join("authorized_keys"));

        assert!(keys.clear_keys().is_ok());
    }

    #[test]
    fn test_clear_keys_on_directory_is_error() {
        let dir = TempDir::new().expect("tempdir");
        let keys = AuthorizedKeys::new(dir.path().to_path_buf());

        assert!(matches!(keys.clear_keys(), Err(AgentError::Io { .. })));
    }
}
