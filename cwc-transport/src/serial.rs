//! Serial transport (USB serial adapters and Bluetooth classic RFCOMM ttys)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::types::DeviceInfo;
use crate::{DataSink, Device};

const READ_BUFFER_SIZE: usize = 512;

/// Serial port device
///
/// A reader task forwards every received chunk to the data sink. When the
/// port reports EOF or an error the device marks itself disconnected and
/// drops the sink so the owner notices the lost session.
pub struct SerialDevice {
    info: DeviceInfo,
    baud_rate: u32,
    writer: tokio::sync::Mutex<Option<WriteHalf<SerialStream>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<Mutex<Option<DataSink>>>,
    connected: Arc<AtomicBool>,
}

impl SerialDevice {
    pub fn new(info: DeviceInfo, baud_rate: u32) -> Self {
        Self {
            info,
            baud_rate,
            writer: tokio::sync::Mutex::new(None),
            reader_task: Mutex::new(None),
            sink: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn_reader(&self, mut reader: ReadHalf<SerialStream>) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let connected = Arc::clone(&self.connected);
        let path = self.info.path.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        debug!("{}: EOF", path);
                        break;
                    }
                    Ok(n) => {
                        trace!("{}: read {} bytes", path, n);
                        if let Some(sink) = sink.lock().as_ref() {
                            let _ = sink.send(buf[..n].to_vec());
                        }
                    }
                    Err(e) => {
                        warn!("{}: read error: {}", path, e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            sink.lock().take();
        })
    }
}

#[async_trait]
impl Device for SerialDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        info!("Opening serial port {} at {} baud", self.info.path, self.baud_rate);
        let stream = tokio_serial::new(&self.info.path, self.baud_rate).open_native_async()?;
        let (reader, writer) = tokio::io::split(stream);

        *self.writer.lock().await = Some(writer);
        let task = self.spawn_reader(reader);
        if let Some(old) = self.reader_task.lock().replace(task) {
            old.abort();
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let task = self.reader_task.lock().take();
        let writer = self.writer.lock().await.take();
        let was_connected = self.connected.swap(false, Ordering::SeqCst);

        if task.is_none() && writer.is_none() {
            debug!("{} already disconnected", self.info.path);
            return Ok(());
        }
        if let Some(task) = task {
            task.abort();
        }
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("{}: shutdown failed: {}", self.info.path, e);
            }
        }
        info!(
            "Closed serial port {} (was connected: {})",
            self.info.path, was_connected
        );
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let result = async {
            writer.write_all(data).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("{}: write failed: {}", self.info.path, e);
            self.connected.store(false, Ordering::SeqCst);
            guard.take();
            return Err(e.into());
        }
        trace!("{}: wrote {:02X?}", self.info.path, data);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_data_handler(&self, sink: Option<DataSink>) {
        *self.sink.lock() = sink;
    }
}
