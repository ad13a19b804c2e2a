//! Error handling module for the agent
//!
//! Provides the error taxonomy for every operation exposed on the bus.
//! Internally the variants stay distinct so logs and tests can tell them
//! apart; at the bus boundary they all collapse into a single generic
//! `org.freedesktop.DBus.Error.Failed` carrying the message text.

use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// No volume carries the requested filesystem label
    #[error("No device found with label \"{label}\"")]
    NotFound { label: String },

    /// A destructive action was refused because its precondition does not hold
    #[error("{0}")]
    Precondition(String),

    /// File read/write/rename or command start failures
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The storage collaborator failed to answer a lookup or query
    #[error("Volume lookup failed: {0}")]
    LookupFailed(String),

    /// The storage collaborator failed to format a volume
    #[error("Formatting device with label \"{label}\" failed: {reason}")]
    FormatFailed { label: String, reason: String },

    /// Kernel module state disagrees with the requested state (verified policy)
    #[error("Kernel module error: {0}")]
    ModuleState(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// D-Bus connection or registration errors
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Create an I/O error with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not-found error for a filesystem label
    pub fn not_found(label: impl Into<String>) -> Self {
        Self::NotFound {
            label: label.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::LookupFailed(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<AgentError> for zbus::fdo::Error {
    fn from(err: AgentError) -> Self {
        zbus::fdo::Error::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::not_found("hassos-data");
        assert_eq!(err.to_string(), "No device found with label \"hassos-data\"");

        let err = AgentError::config("bus name must not be empty");
        assert_eq!(err.to_string(), "Configuration error: bus name must not be empty");
    }

    #[test]
    fn test_io_error_keeps_context() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AgentError::io("Failed to read /mnt/boot/cmdline.txt", io_err);
        assert!(matches!(err, AgentError::Io { .. }));
        assert!(err.to_string().starts_with("Failed to read /mnt/boot/cmdline.txt"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_bus_boundary_is_generic_failed() {
        let err = AgentError::precondition("Device with label \"x\" is mounted at /mnt, aborting.");
        let fdo: zbus::fdo::Error = err.into();
        match fdo {
            zbus::fdo::Error::Failed(msg) => {
                assert!(msg.contains("\"x\""));
                assert!(msg.contains("/mnt"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
