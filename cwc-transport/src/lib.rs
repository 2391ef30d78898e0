//! Transport abstraction layer for educational robot communication
//!
//! This crate provides a unified byte-pipe interface for talking to robots
//! across different transport backends:
//!
//! - Serial (USB serial adapters, on-board UARTs)
//! - Bluetooth classic (RFCOMM channels exposed as a tty)
//! - Bluetooth LE (GATT characteristics via the host Bluetooth stack)
//! - Mock (in-memory, for tests and dry runs)
//!
//! Inbound bytes are delivered to a single data sink and reassembled into
//! frames by [`StreamReader`].

pub mod error;
pub mod mock;
pub mod printer;
pub mod stream_reader;
pub mod types;

mod discovery;

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "bluetooth")]
pub mod bluetooth_le;

pub use discovery::DeviceDiscovery;
pub use error::TransportError;
pub use mock::{MockDevice, MockDiscovery};
pub use printer::{PrinterConfig, PrinterDevice, TrafficFilter};
pub use stream_reader::{FrameConfig, StreamReader};
pub use types::{
    BleProfile, BleService, ConnectionStatus, DeviceInfo, DiscoveredDevice, DiscoveryEvent,
    TransportType,
};

#[cfg(feature = "serial")]
pub use discovery::SerialDiscovery;
#[cfg(feature = "serial")]
pub use serial::SerialDevice;

#[cfg(feature = "bluetooth")]
pub use bluetooth_le::{BleDevice, BleDiscovery};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receiving end for raw inbound bytes
///
/// A device holds at most one sink. Dropping it (or the device dropping its
/// clone) closes the channel, which the owner treats as a lost session.
pub type DataSink = mpsc::UnboundedSender<Vec<u8>>;

/// The core device trait - all transports implement this
///
/// Connection-level semantics (handshakes, framing, retries) live above this
/// trait; a device only moves bytes.
#[async_trait]
pub trait Device: Send + Sync {
    /// Get device information
    fn info(&self) -> &DeviceInfo;

    /// Open the underlying transport
    ///
    /// For BLE this also resolves every declared service and characteristic;
    /// the call only returns `Ok` once they are cached.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Release the transport handle
    ///
    /// Safe to call in any state. A disconnect on an already disconnected
    /// device is a logged no-op.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Send raw bytes, preserving call order
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Transport-level connection state only
    async fn is_connected(&self) -> bool;

    /// Drop any pending outbound writes
    async fn reset(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Install (or remove) the single inbound data sink
    fn set_data_handler(&self, sink: Option<DataSink>);

    /// Write to a specific GATT characteristic
    async fn write_characteristic(&self, uuid: Uuid, _data: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotSupported(format!(
            "write to characteristic {uuid}"
        )))
    }

    /// Subscribe to notifications of a GATT characteristic and forward them
    /// to the data sink
    async fn listen(&self, uuid: Uuid) -> Result<(), TransportError> {
        Err(TransportError::NotSupported(format!(
            "listen on characteristic {uuid}"
        )))
    }
}

/// Type alias for a shared device
pub type BoxedDevice = Arc<dyn Device>;
