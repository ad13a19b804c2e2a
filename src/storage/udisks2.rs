//! UDisks2 storage backend.
//!
//! Talks to `org.freedesktop.UDisks2` over its own blocking D-Bus client
//! connection. The connection is kept separate from the one the agent serves
//! on: bus method handlers block while waiting for UDisks2 replies, and those
//! replies must be read by a different connection's executor.

use std::collections::HashMap;

use zbus::blocking::Connection;
use zbus::proxy;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedObjectPath, Value};

use super::{StorageBackend, VolumeHandle};
use crate::config::BusKind;
use crate::dbus;
use crate::error::{AgentError, Result};

#[proxy(
    interface = "org.freedesktop.UDisks2.Manager",
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2/Manager"
)]
trait Manager {
    /// Resolve a device specification (here: `{"label": ...}`) to block objects.
    fn resolve_device(
        &self,
        devspec: HashMap<&str, Value<'_>>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[proxy(
    interface = "org.freedesktop.UDisks2.Filesystem",
    default_service = "org.freedesktop.UDisks2"
)]
trait Filesystem {
    /// NUL-terminated byte strings, one per mount point.
    #[zbus(property)]
    fn mount_points(&self) -> zbus::Result<Vec<Vec<u8>>>;
}

#[proxy(
    interface = "org.freedesktop.UDisks2.Block",
    default_service = "org.freedesktop.UDisks2"
)]
trait Block {
    fn format(&self, type_: &str, options: HashMap<&str, Value<'_>>) -> zbus::Result<()>;
}

/// [`StorageBackend`] backed by the UDisks2 daemon.
pub struct UDisks2Storage {
    conn: Connection,
}

impl UDisks2Storage {
    /// Open a dedicated client connection on the given bus.
    pub fn connect(bus: BusKind) -> Result<Self> {
        Ok(Self {
            conn: dbus::connect(bus)?,
        })
    }

    fn filesystem<'a>(&self, volume: &'a VolumeHandle) -> zbus::Result<FilesystemProxyBlocking<'a>> {
        FilesystemProxyBlocking::builder(&self.conn)
            .path(volume.id.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
    }

    fn block<'a>(&self, volume: &'a VolumeHandle) -> zbus::Result<BlockProxyBlocking<'a>> {
        BlockProxyBlocking::builder(&self.conn)
            .path(volume.id.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
    }
}

impl StorageBackend for UDisks2Storage {
    fn find_by_label(&self, label: &str) -> Result<Option<VolumeHandle>> {
        let manager = ManagerProxyBlocking::new(&self.conn)
            .map_err(|e| AgentError::lookup(format!("UDisks2 manager unavailable: {e}")))?;

        let devspec = HashMap::from([("label", Value::from(label))]);
        let paths = manager
            .resolve_device(devspec, HashMap::new())
            .map_err(|e| AgentError::lookup(format!("Resolving label \"{label}\": {e}")))?;

        if paths.len() > 1 {
            tracing::warn!(
                "{} devices carry label {:?}, using {}",
                paths.len(),
                label,
                paths[0].as_str()
            );
        }

        Ok(paths.into_iter().next().map(|path| VolumeHandle {
            label: label.to_string(),
            id: path.as_str().to_string(),
        }))
    }

    fn mount_points(&self, volume: &VolumeHandle) -> Result<Vec<String>> {
        let raw = self
            .filesystem(volume)
            .and_then(|fs| fs.mount_points())
            .map_err(|e| {
                AgentError::lookup(format!(
                    "Reading mount points of \"{}\": {e}",
                    volume.label
                ))
            })?;

        Ok(raw.iter().map(|bytes| decode_mount_point(bytes)).collect())
    }

    fn format(&self, volume: &VolumeHandle, fs_type: &str, label: &str) -> Result<()> {
        tracing::info!("Formatting {} as {} with label {:?}", volume, fs_type, label);
        let options = HashMap::from([("label", Value::from(label))]);
        self.block(volume)
            .and_then(|block| block.format(fs_type, options))
            .map_err(|e| AgentError::FormatFailed {
                label: label.to_string(),
                reason: e.to_string(),
            })
    }
}

/// UDisks2 reports mount points as byte arrays with a trailing NUL.
fn decode_mount_point(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mount_point_strips_nul() {
        assert_eq!(decode_mount_point(b"/mnt/data\0"), "/mnt/data");
        assert_eq!(decode_mount_point(b"/mnt/data"), "/mnt/data");
        assert_eq!(decode_mount_point(b"\0"), "");
    }
}
