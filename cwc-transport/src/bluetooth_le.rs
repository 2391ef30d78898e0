//! Bluetooth LE GATT transport
//!
//! A [`BleDevice`] is only usable once `connect()` has resolved every
//! service and characteristic of its [`BleProfile`]. Writes are serialized
//! through a single queue worker; `reset()` invalidates anything still
//! queued. Notifications of listened characteristics are forwarded to the
//! data sink.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::discovery::DeviceDiscovery;
use crate::error::TransportError;
use crate::types::{BleProfile, DeviceInfo, DiscoveredDevice, DiscoveryEvent, TransportType};
use crate::{BoxedDevice, DataSink, Device};

struct WriteJob {
    generation: u64,
    characteristic: Characteristic,
    data: Vec<u8>,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// GATT device
pub struct BleDevice {
    info: DeviceInfo,
    peripheral: Peripheral,
    profile: BleProfile,
    characteristics: Mutex<HashMap<Uuid, Characteristic>>,
    listened: Arc<Mutex<HashSet<Uuid>>>,
    sink: Arc<Mutex<Option<DataSink>>>,
    write_tx: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
    generation: Arc<AtomicU64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BleDevice {
    pub fn new(info: DeviceInfo, peripheral: Peripheral, profile: BleProfile) -> Self {
        Self {
            info,
            peripheral,
            profile,
            characteristics: Mutex::new(HashMap::new()),
            listened: Arc::new(Mutex::new(HashSet::new())),
            sink: Arc::new(Mutex::new(None)),
            write_tx: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Resolve every declared service, then every declared characteristic
    fn resolve_profile(&self) -> Result<HashMap<Uuid, Characteristic>, TransportError> {
        let services = self.peripheral.services();
        let mut resolved = HashMap::new();

        for declared in &self.profile.services {
            let service = services
                .iter()
                .find(|s| s.uuid == declared.uuid)
                .ok_or_else(|| TransportError::AttributeNotFound(format!("service {}", declared.uuid)))?;
            debug!("Resolved service {}", service.uuid);

            for uuid in &declared.characteristics {
                let characteristic = service
                    .characteristics
                    .iter()
                    .find(|c| c.uuid == *uuid)
                    .ok_or_else(|| TransportError::AttributeNotFound(format!("characteristic {}", uuid)))?;
                debug!("Resolved characteristic {}", uuid);
                resolved.insert(*uuid, characteristic.clone());
            }
        }
        Ok(resolved)
    }

    fn spawn_write_worker(&self) -> (mpsc::UnboundedSender<WriteJob>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
        let peripheral = self.peripheral.clone();
        let generation = Arc::clone(&self.generation);

        let task = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if job.generation != generation.load(Ordering::SeqCst) {
                    trace!("Skipping write queued before reset");
                    let _ = job.done.send(Ok(()));
                    continue;
                }
                let result = peripheral
                    .write(&job.characteristic, &job.data, WriteType::WithoutResponse)
                    .await
                    .map_err(TransportError::from);
                let _ = job.done.send(result);
            }
        });
        (tx, task)
    }

    async fn spawn_notification_forwarder(&self) -> Result<JoinHandle<()>, TransportError> {
        let mut notifications = self.peripheral.notifications().await?;
        let listened = Arc::clone(&self.listened);
        let sink = Arc::clone(&self.sink);
        let address = self.info.path.clone();

        Ok(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if !listened.lock().contains(&notification.uuid) {
                    continue;
                }
                trace!("{}: notify {} bytes", address, notification.value.len());
                if let Some(sink) = sink.lock().as_ref() {
                    let _ = sink.send(notification.value);
                }
            }
            debug!("{}: notification stream ended", address);
            sink.lock().take();
        }))
    }

    async fn enqueue_write(&self, uuid: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let characteristic = self
            .characteristics
            .lock()
            .get(&uuid)
            .cloned()
            .ok_or_else(|| TransportError::AttributeNotFound(format!("characteristic {}", uuid)))?;

        let (done, wait) = oneshot::channel();
        let job = WriteJob {
            generation: self.generation.load(Ordering::SeqCst),
            characteristic,
            data: data.to_vec(),
            done,
        };
        self.write_tx
            .lock()
            .as_ref()
            .ok_or(TransportError::NotConnected)?
            .send(job)
            .map_err(|_| TransportError::Disconnected)?;

        wait.await.map_err(|_| TransportError::Disconnected)?
    }
}

#[async_trait]
impl Device for BleDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.write_tx.lock().is_some() && self.is_connected().await {
            return Ok(());
        }

        info!("Connecting to {} ({})", self.info.display_name(), self.info.path);
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        self.peripheral.discover_services().await?;

        let resolved = self.resolve_profile()?;
        *self.characteristics.lock() = resolved;

        let forwarder = self.spawn_notification_forwarder().await?;
        let (tx, worker) = self.spawn_write_worker();
        *self.write_tx.lock() = Some(tx);

        let mut tasks = self.tasks.lock();
        for old in tasks.drain(..) {
            old.abort();
        }
        tasks.push(forwarder);
        tasks.push(worker);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let tx = self.write_tx.lock().take();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if tx.is_none() && tasks.is_empty() {
            debug!("{} already disconnected", self.info.path);
            return Ok(());
        }
        for task in tasks {
            task.abort();
        }
        self.characteristics.lock().clear();
        self.listened.lock().clear();

        match self.peripheral.is_connected().await {
            Ok(true) => {
                if let Err(e) = self.peripheral.disconnect().await {
                    warn!("{}: disconnect failed: {}", self.info.path, e);
                }
            }
            Ok(false) => {}
            Err(e) => debug!("{}: state query failed: {}", self.info.path, e),
        }
        info!("Disconnected from {}", self.info.display_name());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let uuid = self
            .profile
            .write_characteristic
            .ok_or_else(|| TransportError::NotSupported("no default write characteristic".into()))?;
        self.enqueue_write(uuid, data).await
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn reset(&self) -> Result<(), TransportError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("{}: write queue reset (generation {})", self.info.path, generation);
        Ok(())
    }

    fn set_data_handler(&self, sink: Option<DataSink>) {
        *self.sink.lock() = sink;
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), TransportError> {
        self.enqueue_write(uuid, data).await
    }

    async fn listen(&self, uuid: Uuid) -> Result<(), TransportError> {
        let characteristic = self
            .characteristics
            .lock()
            .get(&uuid)
            .cloned()
            .ok_or_else(|| TransportError::AttributeNotFound(format!("characteristic {}", uuid)))?;
        self.peripheral.subscribe(&characteristic).await?;
        self.listened.lock().insert(uuid);
        debug!("{}: listening on {}", self.info.path, uuid);
        Ok(())
    }
}

/// BLE scanner bound to one GATT profile
pub struct BleDiscovery {
    adapter: Adapter,
    profile: BleProfile,
    scan_window: Duration,
    peripherals: Mutex<HashMap<String, Peripheral>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl BleDiscovery {
    /// Use the first Bluetooth adapter of the host
    pub async fn new(profile: BleProfile, scan_window: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Ble("No Bluetooth adapter found".into()))?;
        let (event_tx, _) = broadcast::channel(16);

        Ok(Self {
            adapter,
            profile,
            scan_window,
            peripherals: Mutex::new(HashMap::new()),
            event_tx,
        })
    }
}

#[async_trait]
impl DeviceDiscovery for BleDiscovery {
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(self.scan_window).await;
        self.adapter.stop_scan().await?;

        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let Some(props) = peripheral.properties().await? else {
                continue;
            };
            let mut info = DeviceInfo::new(TransportType::BluetoothLe, props.address.to_string());
            info.name = props.local_name;
            info.rssi = props.rssi;

            let known = self
                .peripherals
                .lock()
                .insert(info.path.clone(), peripheral)
                .is_some();
            let device = DiscoveredDevice { info };
            if !known {
                let _ = self.event_tx.send(DiscoveryEvent::DeviceAdded(device.clone()));
            }
            devices.push(device);
        }
        debug!("BLE scan found {} peripherals", devices.len());
        Ok(devices)
    }

    async fn open_device(&self, device: &DiscoveredDevice) -> Result<BoxedDevice, TransportError> {
        let peripheral = self
            .peripherals
            .lock()
            .get(&device.info.path)
            .cloned()
            .ok_or_else(|| TransportError::DeviceNotFound(device.info.path.clone()))?;
        Ok(Arc::new(BleDevice::new(
            device.info.clone(),
            peripheral,
            self.profile.clone(),
        )))
    }

    fn watch(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }
}
