//! Device discovery for serial, Bluetooth classic and mock devices

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::types::{DiscoveredDevice, DiscoveryEvent};
use crate::BoxedDevice;

#[cfg(feature = "serial")]
pub use serial_discovery::SerialDiscovery;

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// List currently available devices
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Open a specific device (not yet connected)
    async fn open_device(&self, device: &DiscoveredDevice) -> Result<BoxedDevice, TransportError>;

    /// Subscribe to hot-plug events
    fn watch(&self) -> broadcast::Receiver<DiscoveryEvent>;

    /// First device whose name or path contains `name`, case-insensitive
    async fn find_by_name(&self, name: &str) -> Result<Option<DiscoveredDevice>, TransportError> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.info.matches_name(name)))
    }
}

#[cfg(feature = "serial")]
mod serial_discovery {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    use super::DeviceDiscovery;
    use crate::error::TransportError;
    use crate::serial::SerialDevice;
    use crate::types::{DeviceInfo, DiscoveredDevice, DiscoveryEvent, TransportType};
    use crate::BoxedDevice;

    /// Serial port enumeration (USB adapters and RFCOMM nodes)
    pub struct SerialDiscovery {
        baud_rate: u32,
        event_tx: broadcast::Sender<DiscoveryEvent>,
    }

    impl SerialDiscovery {
        pub fn new(baud_rate: u32) -> Self {
            let (event_tx, _) = broadcast::channel(16);
            Self {
                baud_rate,
                event_tx,
            }
        }

        fn port_info(port: tokio_serial::SerialPortInfo) -> DeviceInfo {
            let rfcomm = port.port_name.contains("rfcomm");
            let mut info = DeviceInfo::new(
                if rfcomm {
                    TransportType::BluetoothClassic
                } else {
                    TransportType::Serial
                },
                port.port_name,
            );
            match port.port_type {
                tokio_serial::SerialPortType::UsbPort(usb) => {
                    info.vid = Some(usb.vid);
                    info.pid = Some(usb.pid);
                    info.name = usb.product;
                }
                tokio_serial::SerialPortType::BluetoothPort => {
                    info.transport_type = TransportType::BluetoothClassic;
                }
                _ => {}
            }
            info
        }

        /// Poll the port list and emit add/remove events until aborted
        pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut known: HashSet<String> = HashSet::new();
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let Ok(devices) = this.list_devices().await else {
                        continue;
                    };
                    let current: HashSet<String> =
                        devices.iter().map(|d| d.info.path.clone()).collect();

                    for device in devices {
                        if !known.contains(&device.info.path) {
                            debug!("Serial port appeared: {}", device.info.path);
                            let _ = this.event_tx.send(DiscoveryEvent::DeviceAdded(device));
                        }
                    }
                    for gone in known.difference(&current) {
                        debug!("Serial port removed: {}", gone);
                        let _ = this.event_tx.send(DiscoveryEvent::DeviceRemoved(
                            DeviceInfo::new(TransportType::Serial, gone.clone()),
                        ));
                    }
                    known = current;
                }
            })
        }
    }

    #[async_trait]
    impl DeviceDiscovery for SerialDiscovery {
        async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
            let ports = tokio_serial::available_ports()?;
            let devices: Vec<_> = ports
                .into_iter()
                .map(|p| DiscoveredDevice {
                    info: Self::port_info(p),
                })
                .collect();
            debug!("Found {} serial ports", devices.len());
            Ok(devices)
        }

        async fn open_device(
            &self,
            device: &DiscoveredDevice,
        ) -> Result<BoxedDevice, TransportError> {
            info!(
                "Opening {} ({}) at {} baud",
                device.info.display_name(),
                device.info.transport_type.label(),
                self.baud_rate
            );
            Ok(Arc::new(SerialDevice::new(device.info.clone(), self.baud_rate)))
        }

        fn watch(&self) -> broadcast::Receiver<DiscoveryEvent> {
            self.event_tx.subscribe()
        }
    }
}
