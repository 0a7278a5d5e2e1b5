use std::net::Ipv4Addr;
use std::time::Duration;

/// All error types that can occur when talking to Govee devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The envelope carried a command this crate does not route.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// A firmware/hardware version string was not `major.minor.patch`.
    #[error("invalid version format: {0:?}")]
    InvalidVersionFormat(String),

    /// No device is registered under the given IP address or device ID.
    #[error("no device found for {0}")]
    DeviceNotFound(String),

    /// The device did not answer a status request in time.
    #[error("timeout after {timeout:?} waiting for status of {ip}")]
    StatusTimeout { ip: Ipv4Addr, timeout: Duration },

    /// The outbound queue is full or already closed.
    #[error("failed to enqueue {cmd} for {ip}: outbound queue {reason}")]
    QueueUnavailable {
        ip: Ipv4Addr,
        cmd: String,
        reason: String,
    },

    /// The controller is shutting down.
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// `Controller::start` was called on a running controller.
    #[error("controller already started")]
    AlreadyStarted,
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new queue unavailable error
    pub fn queue_unavailable(ip: &Ipv4Addr, cmd: &str, reason: &str) -> Self {
        Error::QueueUnavailable {
            ip: *ip,
            cmd: cmd.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new device not found error
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        Error::DeviceNotFound(key.to_string())
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
