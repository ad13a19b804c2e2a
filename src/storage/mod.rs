//! Volume resolution by filesystem label.
//!
//! The storage subsystem owns the block devices; this module only asks it
//! three questions through the [`StorageBackend`] trait: which volume carries
//! a label, where is it mounted, and please format it. Handles are resolved
//! fresh for every request and never cached.

pub mod udisks2;

use std::fmt;

use crate::error::{AgentError, Result};

/// Opaque reference to a storage volume, obtained by label lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHandle {
    /// Filesystem label the volume was resolved from
    pub label: String,
    /// Backend-specific identifier (a UDisks2 object path in production)
    pub id: String,
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// The external storage-management collaborator.
///
/// Implementations report lookup and query failures as
/// [`AgentError::LookupFailed`] and format failures as
/// [`AgentError::FormatFailed`].
pub trait StorageBackend: Send + Sync {
    /// Find the volume carrying `label`, or `None` when no volume has it.
    fn find_by_label(&self, label: &str) -> Result<Option<VolumeHandle>>;

    /// Current mount points of the volume. Empty means unmounted.
    fn mount_points(&self, volume: &VolumeHandle) -> Result<Vec<String>>;

    /// Irreversibly create a fresh `fs_type` filesystem labelled `label`.
    fn format(&self, volume: &VolumeHandle, fs_type: &str, label: &str) -> Result<()>;
}

/// Maps labels to volume handles and answers mount-state questions.
pub struct VolumeResolver<'a> {
    backend: &'a dyn StorageBackend,
}

impl<'a> VolumeResolver<'a> {
    pub fn new(backend: &'a dyn StorageBackend) -> Self {
        Self { backend }
    }

    /// Resolve a filesystem label to a volume handle.
    ///
    /// # Errors
    ///
    /// - [`AgentError::NotFound`] if no volume carries `label`
    /// - [`AgentError::LookupFailed`] if the backend call fails
    pub fn resolve(&self, label: &str) -> Result<VolumeHandle> {
        match self.backend.find_by_label(label)? {
            Some(volume) => {
                tracing::debug!("Resolved label {:?} to {}", label, volume.id);
                Ok(volume)
            }
            None => Err(AgentError::not_found(label)),
        }
    }

    /// Returns true if the volume is mounted anywhere.
    pub fn is_mounted(&self, volume: &VolumeHandle) -> Result<bool> {
        Ok(!self.backend.mount_points(volume)?.is_empty())
    }

    /// Fail with [`AgentError::Precondition`] naming the label and its mount
    /// points if the volume is mounted.
    pub fn ensure_unmounted(&self, volume: &VolumeHandle) -> Result<()> {
        let mount_points = self.backend.mount_points(volume)?;
        if mount_points.is_empty() {
            return Ok(());
        }
        Err(AgentError::precondition(format!(
            "Device with label \"{}\" is mounted at {}, aborting.",
            volume.label,
            mount_points.join(", ")
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory backend recording every format call.
    #[derive(Default)]
    pub(crate) struct FakeStorage {
        pub volumes: HashMap<String, Vec<String>>,
        pub broken_lookup: bool,
        pub failing_format: Option<String>,
        pub formats: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeStorage {
        pub fn with_volume(mut self, label: &str, mounts: &[&str]) -> Self {
            self.volumes.insert(
                label.to_string(),
                mounts.iter().map(|m| m.to_string()).collect(),
            );
            self
        }

        pub fn format_calls(&self) -> Vec<(String, String, String)> {
            self.formats.lock().map(|f| f.clone()).unwrap_or_default()
        }
    }

    impl StorageBackend for FakeStorage {
        fn find_by_label(&self, label: &str) -> Result<Option<VolumeHandle>> {
            if self.broken_lookup {
                return Err(AgentError::lookup("udisks2 unavailable"));
            }
            Ok(self.volumes.contains_key(label).then(|| VolumeHandle {
                label: label.to_string(),
                id: format!("/org/freedesktop/UDisks2/block_devices/{label}"),
            }))
        }

        fn mount_points(&self, volume: &VolumeHandle) -> Result<Vec<String>> {
            self.volumes
                .get(&volume.label)
                .cloned()
                .ok_or_else(|| AgentError::lookup("volume vanished"))
        }

        fn format(&self, volume: &VolumeHandle, fs_type: &str, label: &str) -> Result<()> {
            self.formats.lock().expect("formats lock").push((
                volume.id.clone(),
                fs_type.to_string(),
                label.to_string(),
            ));
            if self.failing_format.as_deref() == Some(label) {
                return Err(AgentError::FormatFailed {
                    label: label.to_string(),
                    reason: "device busy".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_resolve_unknown_label_is_not_found() {
        let storage = FakeStorage::default().with_volume("hassos-data", &[]);
        let resolver = VolumeResolver::new(&storage);

        let err = resolver.resolve("hassos-overlay").unwrap_err();
        assert!(matches!(err, AgentError::NotFound { ref label } if label == "hassos-overlay"));
    }

    #[test]
    fn test_resolve_backend_failure_is_lookup_failed() {
        let storage = FakeStorage {
            broken_lookup: true,
            ..FakeStorage::default()
        };
        let resolver = VolumeResolver::new(&storage);

        assert!(matches!(
            resolver.resolve("hassos-data"),
            Err(AgentError::LookupFailed(_))
        ));
    }

    #[test]
    fn test_is_mounted() {
        let storage = FakeStorage::default()
            .with_volume("hassos-data", &["/mnt/data"])
            .with_volume("hassos-overlay", &[]);
        let resolver = VolumeResolver::new(&storage);

        let data = resolver.resolve("hassos-data").expect("resolve data");
        let overlay = resolver.resolve("hassos-overlay").expect("resolve overlay");
        assert!(resolver.is_mounted(&data).expect("query data"));
        assert!(!resolver.is_mounted(&overlay).expect("query overlay"));
    }

    #[test]
    fn test_ensure_unmounted_names_label_and_all_mount_points() {
        let storage =
            FakeStorage::default().with_volume("hassos-data", &["/mnt/data", "/var/lib/docker"]);
        let resolver = VolumeResolver::new(&storage);
        let data = resolver.resolve("hassos-data").expect("resolve");

        let err = resolver.ensure_unmounted(&data).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AgentError::Precondition(_)));
        assert!(msg.contains("\"hassos-data\""));
        assert!(msg.contains("/mnt/data"));
        assert!(msg.contains("/var/lib/docker"));
    }
}
