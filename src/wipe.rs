//! Device wipe orchestration.
//!
//! Wiping reformats the data and overlay volumes. Every volume is resolved
//! and checked for mounts before any of them is formatted, so a mounted
//! overlay never leaves behind a freshly wiped data volume. Formatting is not
//! transactional: a failure stops the sequence and nothing is rolled back.

use crate::error::Result;
use crate::storage::{StorageBackend, VolumeResolver};

/// Filesystem label of the data partition.
pub const LABEL_DATA_FILESYSTEM: &str = "hassos-data";
/// Filesystem label of the overlay partition.
pub const LABEL_OVERLAY_FILESYSTEM: &str = "hassos-overlay";
/// Filesystem the wiped volumes are recreated with.
pub const WIPE_FILESYSTEM_TYPE: &str = "ext4";

/// Volumes touched by a device wipe, in format order.
pub const WIPE_LABELS: [&str; 2] = [LABEL_DATA_FILESYSTEM, LABEL_OVERLAY_FILESYSTEM];

pub struct WipeOrchestrator<'a> {
    backend: &'a dyn StorageBackend,
}

impl<'a> WipeOrchestrator<'a> {
    pub fn new(backend: &'a dyn StorageBackend) -> Self {
        Self { backend }
    }

    /// Reformat the data volume, then the overlay volume.
    pub fn wipe_device(&self) -> Result<()> {
        tracing::info!("Wipe device data.");
        self.wipe_volumes(&WIPE_LABELS)?;
        tracing::info!("Successfully wiped device data.");
        Ok(())
    }

    /// Resolve and check every label, then format the volumes in order.
    ///
    /// Returns the first error. No format call is issued unless all volumes
    /// resolved and are unmounted.
    pub fn wipe_volumes(&self, labels: &[&str]) -> Result<()> {
        let resolver = VolumeResolver::new(self.backend);

        let mut volumes = Vec::with_capacity(labels.len());
        for label in labels {
            let volume = resolver.resolve(label)?;
            resolver.ensure_unmounted(&volume)?;
            volumes.push(volume);
        }

        for volume in &volumes {
            self.backend
                .format(volume, WIPE_FILESYSTEM_TYPE, &volume.label)
                .inspect_err(|e| tracing::error!("Wipe aborted: {}", e))?;
            tracing::info!("Formatted {}", volume);
        }

        Ok(())
    }
}
