//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    // Common errors
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Device is not connected")]
    NotConnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Operation not supported by this transport: {0}")]
    NotSupported(String),

    // Serial / RFCOMM
    #[error("Serial error: {0}")]
    Serial(String),

    #[error("Serial port busy or permission denied: {0}")]
    SerialPermissionDenied(String),

    // Bluetooth LE
    #[error("Bluetooth LE error: {0}")]
    Ble(String),

    #[error("GATT attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether the error means the session is gone and a reconnect is needed
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::NotConnected | Self::Io(_) | Self::Serial(_)
        )
    }
}

#[cfg(feature = "serial")]
impl From<tokio_serial::Error> for TransportError {
    fn from(e: tokio_serial::Error) -> Self {
        match e.kind() {
            tokio_serial::ErrorKind::NoDevice => TransportError::DeviceNotFound(e.to_string()),
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::SerialPermissionDenied(e.to_string())
            }
            _ => TransportError::Serial(e.to_string()),
        }
    }
}

#[cfg(feature = "bluetooth")]
impl From<btleplug::Error> for TransportError {
    fn from(e: btleplug::Error) -> Self {
        match e {
            btleplug::Error::DeviceNotFound => TransportError::DeviceNotFound(e.to_string()),
            btleplug::Error::NotConnected => TransportError::NotConnected,
            btleplug::Error::TimedOut(_) => TransportError::Timeout,
            other => TransportError::Ble(other.to_string()),
        }
    }
}
