//! In-memory device for tests and dry runs
//!
//! [`MockDevice`] records everything written to it and lets callers inject
//! inbound bytes, delay or fail connects, slow down sends, and simulate a
//! dropped link.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::discovery::DeviceDiscovery;
use crate::error::TransportError;
use crate::types::{DeviceInfo, DiscoveredDevice, DiscoveryEvent, TransportType};
use crate::{BoxedDevice, DataSink, Device};

/// Recording in-memory device
pub struct MockDevice {
    info: DeviceInfo,
    gatt: bool,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    reset_calls: AtomicUsize,
    failing_connects: AtomicUsize,
    failing_sends: AtomicBool,
    connect_delay: Mutex<Duration>,
    send_delay: Mutex<Duration>,
    sent: Mutex<Vec<Vec<u8>>>,
    characteristic_writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    listens: Mutex<Vec<Uuid>>,
    sink: Mutex<Option<DataSink>>,
}

impl MockDevice {
    /// Serial-like mock with the given display name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let info = DeviceInfo::new(TransportType::Mock, format!("mock://{}", name)).with_name(name);
        Self::with_info(info, false)
    }

    /// Mock that accepts GATT characteristic writes and listens
    pub fn new_ble(name: impl Into<String>) -> Self {
        let name = name.into();
        let info = DeviceInfo::new(TransportType::Mock, format!("mock-ble://{}", name)).with_name(name);
        Self::with_info(info, true)
    }

    fn with_info(info: DeviceInfo, gatt: bool) -> Self {
        Self {
            info,
            gatt,
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
            failing_sends: AtomicBool::new(false),
            connect_delay: Mutex::new(Duration::ZERO),
            send_delay: Mutex::new(Duration::ZERO),
            sent: Mutex::new(Vec::new()),
            characteristic_writes: Mutex::new(Vec::new()),
            listens: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
        }
    }

    /// Make every `connect()` take this long
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Make every `send()` take this long before the bytes are recorded
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = delay;
    }

    /// Fail the next `count` connect attempts
    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Make sends fail (and mark the link down) until cleared
    pub fn set_failing_sends(&self, fail: bool) {
        self.failing_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliver inbound bytes to the data sink, returns false without one
    pub fn inject(&self, data: &[u8]) -> bool {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.send(data.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Drop the link as if the robot went away
    pub fn simulate_drop(&self) {
        debug!("Mock {} dropping link", self.info.display_name());
        self.connected.store(false, Ordering::SeqCst);
        self.sink.lock().take();
    }

    pub fn has_data_handler(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    /// Frames written through `send()` so far
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Take and clear the recorded frames
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn characteristic_writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.characteristic_writes.lock().clone()
    }

    pub fn listened(&self) -> Vec<Uuid> {
        self.listens.lock().clone()
    }
}

#[async_trait]
impl Device for MockDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::DeviceNotFound(self.info.path.clone()));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connected.swap(false, Ordering::SeqCst) {
            debug!("Mock {} already disconnected", self.info.display_name());
        }
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.failing_sends.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(TransportError::Disconnected);
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().push(data.to_vec());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reset(&self) -> Result<(), TransportError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_data_handler(&self, sink: Option<DataSink>) {
        *self.sink.lock() = sink;
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), TransportError> {
        if !self.gatt {
            return Err(TransportError::NotSupported(format!(
                "write to characteristic {uuid}"
            )));
        }
        self.characteristic_writes.lock().push((uuid, data.to_vec()));
        Ok(())
    }

    async fn listen(&self, uuid: Uuid) -> Result<(), TransportError> {
        if !self.gatt {
            return Err(TransportError::NotSupported(format!(
                "listen on characteristic {uuid}"
            )));
        }
        self.listens.lock().push(uuid);
        Ok(())
    }
}

/// Discovery over a fixed set of mock devices
pub struct MockDiscovery {
    devices: Mutex<Vec<Arc<MockDevice>>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl Default for MockDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiscovery {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            devices: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    /// Make a device discoverable and announce it
    pub fn add(&self, device: Arc<MockDevice>) {
        let info = device.info().clone();
        self.devices.lock().push(device);
        let _ = self.event_tx.send(DiscoveryEvent::DeviceAdded(DiscoveredDevice { info }));
    }

    pub fn remove(&self, path: &str) {
        let removed = {
            let mut devices = self.devices.lock();
            let idx = devices.iter().position(|d| d.info().path == path);
            idx.map(|i| devices.remove(i))
        };
        if let Some(device) = removed {
            let _ = self
                .event_tx
                .send(DiscoveryEvent::DeviceRemoved(device.info().clone()));
        }
    }
}

#[async_trait]
impl DeviceDiscovery for MockDiscovery {
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .map(|d| DiscoveredDevice {
                info: d.info().clone(),
            })
            .collect())
    }

    async fn open_device(&self, device: &DiscoveredDevice) -> Result<BoxedDevice, TransportError> {
        let found = self
            .devices
            .lock()
            .iter()
            .find(|d| d.info().path == device.info.path)
            .cloned();
        match found {
            Some(d) => Ok(d as BoxedDevice),
            None => Err(TransportError::DeviceNotFound(device.info.path.clone())),
        }
    }

    fn watch(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }
}
