//! D-Bus surface of the agent.
//!
//! Registers [`SystemInterface`] at [`OBJECT_PATH`]. zbus's object server
//! derives the `org.freedesktop.DBus.Introspectable` document and the
//! `org.freedesktop.DBus.Properties` implementation from the interface
//! declaration, and emits `PropertiesChanged` after a successful
//! `LoadUSBIP` write.
//!
//! Handlers are async and hand the actual work to the `blocking` thread pool,
//! so a wipe that spends minutes in UDisks2 does not stall property reads or
//! other calls on the same object.

use std::sync::Arc;

use blocking::unblock;
use zbus::blocking::Connection;
use zbus::interface;

use crate::command::SystemLauncher;
use crate::config::{AgentConfig, BusKind};
use crate::error::{AgentError, Result};
use crate::service::SystemService;
use crate::shutdown;
use crate::storage::udisks2::UDisks2Storage;

pub const OBJECT_PATH: &str = "/io/hass/os/System";
pub const INTERFACE_NAME: &str = "io.hass.os.System";

/// Bus-facing wrapper around [`SystemService`]. Pure dispatch.
pub struct SystemInterface {
    service: Arc<SystemService>,
}

impl SystemInterface {
    pub fn new(service: Arc<SystemService>) -> Self {
        Self { service }
    }
}

#[interface(name = "io.hass.os.System")]
impl SystemInterface {
    /// Reformat the data and overlay partitions now.
    async fn wipe_device(&self) -> zbus::fdo::Result<bool> {
        let service = Arc::clone(&self.service);
        unblock(move || service.wipe_device()).await?;
        Ok(true)
    }

    /// Make the next boot wipe the data and overlay partitions.
    async fn schedule_wipe_device(&self) -> zbus::fdo::Result<bool> {
        let service = Arc::clone(&self.service);
        unblock(move || service.schedule_wipe_device()).await?;
        Ok(true)
    }

    #[zbus(name = "AddSSHAuthKey")]
    async fn add_ssh_auth_key(&self, key: &str) -> zbus::fdo::Result<()> {
        let service = Arc::clone(&self.service);
        let key = key.to_string();
        Ok(unblock(move || service.add_ssh_auth_key(&key)).await?)
    }

    #[zbus(name = "ClearSSHAuthKeys")]
    async fn clear_ssh_auth_keys(&self) -> zbus::fdo::Result<()> {
        let service = Arc::clone(&self.service);
        Ok(unblock(move || service.clear_ssh_auth_keys()).await?)
    }

    /// Cached state, answered without touching the kernel.
    #[zbus(property, name = "LoadUSBIP")]
    fn load_usbip(&self) -> bool {
        self.service.module_loaded()
    }

    #[zbus(property, name = "LoadUSBIP")]
    async fn set_load_usbip(&self, value: bool) -> zbus::Result<()> {
        let service = Arc::clone(&self.service);
        Ok(unblock(move || service.set_module_loaded(value))
            .await
            .map_err(zbus::fdo::Error::from)?)
    }
}

/// Open a connection to the configured bus.
pub fn connect(bus: BusKind) -> Result<Connection> {
    let conn = match bus {
        BusKind::System => Connection::system()?,
        BusKind::Session => Connection::session()?,
    };
    Ok(conn)
}

/// Register the interface object on `conn`.
pub fn export(conn: &Connection, service: Arc<SystemService>) -> Result<()> {
    conn.object_server()
        .at(OBJECT_PATH, SystemInterface::new(service))?;
    tracing::info!(
        "Exposing object {} with interface {} ...",
        OBJECT_PATH,
        INTERFACE_NAME
    );
    Ok(())
}

/// Run the agent until SIGINT, SIGTERM or SIGHUP.
pub fn serve(config: &AgentConfig) -> Result<()> {
    let storage = UDisks2Storage::connect(config.bus)?;
    let service = Arc::new(SystemService::new(
        config,
        Box::new(storage),
        Box::new(SystemLauncher),
    ));

    let conn = connect(config.bus)?;
    export(&conn, service)?;
    conn.request_name(config.bus_name.as_str())?;
    tracing::info!("Acquired bus name {} on the {} bus", config.bus_name, config.bus);

    let signal = shutdown::wait_for_signal()
        .map_err(|e| AgentError::io("Failed to install signal handlers", e))?;
    tracing::info!("Received {}, shutting down", shutdown::signal_name(signal));

    if let Err(e) = conn.release_name(config.bus_name.as_str()) {
        tracing::warn!("Failed to release bus name {}: {}", config.bus_name, e);
    }
    Ok(())
}
