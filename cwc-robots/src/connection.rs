//! Connection lifecycle shared by every robot family
//!
//! A [`Connection`] owns one device at a time, a reconnect timer, the
//! monitoring scheduler and the event hub. Each live session runs two tasks:
//! a writer draining the outbound frame queue in order (honoring per-frame
//! delays) and a reader feeding the stream reader and decoder. A failed send
//! or a closed data handler ends the session and hands over to the timer.
//!
//! Every teardown bumps a teardown epoch. A connect attempt re-checks the
//! epoch after each await and installs its session under the session lock,
//! so an attempt overtaken by `clean_up()` releases its device instead.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use cwc_transport::{BoxedDevice, DeviceDiscovery, StreamReader, TransportError};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::buffer::Frame;
use crate::error::RobotError;
use crate::events::{ConnectionEvent, ConnectionState, EventHub, RobotEvent};
use crate::monitoring::{Monitoring, Planner};
use crate::params::Params;
use crate::protocol::{Family, HandshakeStep, RobotProtocol};
use crate::queue::{frame_queue, FrameQueue, FrameSink};
use crate::topology::Topology;

/// Upper bound for the best-effort stop sent while disconnecting
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Device resolution
// =============================================================================

/// Produces the device a connect attempt should use
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    async fn resolve(&self) -> Result<BoxedDevice, TransportError>;
}

/// Always the same, explicitly chosen device
pub struct FixedDevice(BoxedDevice);

impl FixedDevice {
    pub fn new(device: BoxedDevice) -> Self {
        Self(device)
    }
}

#[async_trait]
impl DeviceResolver for FixedDevice {
    async fn resolve(&self) -> Result<BoxedDevice, TransportError> {
        Ok(self.0.clone())
    }
}

/// First discovered device whose name contains the family's auto-connect name
pub struct AutoDiscover {
    discovery: Arc<dyn DeviceDiscovery>,
    name: String,
}

impl AutoDiscover {
    pub fn new(discovery: Arc<dyn DeviceDiscovery>, name: impl Into<String>) -> Self {
        Self {
            discovery,
            name: name.into(),
        }
    }
}

#[async_trait]
impl DeviceResolver for AutoDiscover {
    async fn resolve(&self) -> Result<BoxedDevice, TransportError> {
        let found = self
            .discovery
            .find_by_name(&self.name)
            .await?
            .ok_or_else(|| TransportError::DeviceNotFound(self.name.clone()))?;
        debug!("Auto-connect matched {}", found.info.display_name());
        self.discovery.open_device(&found).await
    }
}

// =============================================================================
// Connection
// =============================================================================

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Period of the reconnect timer started by `init()`
    pub reconnect_interval: Duration,
    /// Bound for device resolution and the transport connect
    pub connect_timeout: Duration,
    /// Start sensor polling once connected
    pub monitor: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(10_000),
            monitor: true,
        }
    }
}

struct Session {
    id: u64,
    device: BoxedDevice,
    outbound: FrameSink,
    flush: Arc<Notify>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

/// Failed connect step and its cause
type StepError = (u8, RobotError);

struct Inner<P: RobotProtocol> {
    protocol: P,
    resolver: Arc<dyn DeviceResolver>,
    settings: ConnectionSettings,
    events: EventHub,
    monitoring: Monitoring,
    state: Mutex<ConnectionState>,
    connecting: AtomicBool,
    /// Bumped by every `clean_up()`
    epoch: AtomicU64,
    /// The last session ended without a disconnect
    lost: AtomicBool,
    handler_state: Mutex<P::State>,
    decoder: Mutex<P::Decoder>,
    stream: Mutex<StreamReader>,
    /// Device of an attempt that has not produced a session yet
    pending: Mutex<Option<BoxedDevice>>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Generic robot connection driven by a family descriptor
pub struct Connection<P: RobotProtocol> {
    inner: Arc<Inner<P>>,
}

impl<P: RobotProtocol> Clone for Connection<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: RobotProtocol> Connection<P> {
    pub fn new(protocol: P, resolver: Arc<dyn DeviceResolver>, settings: ConnectionSettings) -> Self {
        let plan_for = protocol.clone();
        let planner: Planner = Arc::new(move |topology: &Topology| plan_for.monitor_plan(topology));
        let monitoring = Monitoring::new(protocol.family().as_str(), planner);
        let stream = StreamReader::new(protocol.framing());

        Self {
            inner: Arc::new(Inner {
                protocol,
                resolver,
                settings,
                events: EventHub::new(),
                monitoring,
                state: Mutex::new(ConnectionState::Disconnected),
                connecting: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                lost: AtomicBool::new(false),
                handler_state: Mutex::new(P::State::default()),
                decoder: Mutex::new(P::Decoder::default()),
                stream: Mutex::new(stream),
                pending: Mutex::new(None),
                session: Mutex::new(None),
                next_session: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Connection to one explicit device
    pub fn with_device(protocol: P, device: BoxedDevice, settings: ConnectionSettings) -> Self {
        Self::new(protocol, Arc::new(FixedDevice::new(device)), settings)
    }

    pub fn family(&self) -> Family {
        self.inner.protocol.family()
    }

    pub fn protocol(&self) -> &P {
        &self.inner.protocol
    }

    /// Enter Discovering and start the reconnect timer
    ///
    /// The timer's first tick fires immediately, so the first connect
    /// attempt happens right away. Failures only surface as events.
    pub fn init(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            debug!("{} connection already initialized", self.family());
            return;
        }
        if !self.is_connected() {
            self.inner.set_state(ConnectionState::Discovering);
        }
        *timer = Some(tokio::spawn(reconnect_loop(
            Arc::downgrade(&self.inner),
            self.inner.settings.reconnect_interval,
        )));
    }

    /// Run one connect attempt, returns whether the robot is connected
    ///
    /// Returns immediately while another attempt is in flight.
    pub async fn connect(&self) -> bool {
        self.inner.connect().await
    }

    /// Stop the timer, halt the robot and release the device
    ///
    /// Safe to call any number of times, including before `init()`.
    pub async fn disconnect(&self) {
        self.inner.clean_up().await;
    }

    pub async fn clean_up(&self) {
        self.inner.clean_up().await;
    }

    /// Encode `command` through the family handler and queue its frames
    pub fn exec(&self, command: &str, params: &Params) -> Result<(), RobotError> {
        let frames = {
            let mut state = self.inner.handler_state.lock();
            self.inner.protocol.commands().encode(&mut state, command, params)?
        };
        self.inner.enqueue(frames)
    }

    /// Queue the family stop sequence; the session stays up
    pub fn stop(&self) -> Result<(), RobotError> {
        let frames = self.inner.protocol.stop(&mut self.inner.handler_state.lock())?;
        self.inner.enqueue(frames)
    }

    /// Forget cached readings and drop everything still queued for the device
    pub async fn reset(&self) -> Result<(), RobotError> {
        *self.inner.decoder.lock() = P::Decoder::default();
        self.inner.stream.lock().clear();
        let device = {
            let session = self.inner.session.lock();
            session.as_ref().map(|s| {
                s.outbound.invalidate();
                s.flush.notify_one();
                s.device.clone()
            })
        };
        match device {
            Some(device) => Ok(device.reset().await?),
            None => Ok(()),
        }
    }

    /// Turn sensor polling on or off for the live session
    pub fn monitor(&self, enable: bool) {
        if !enable {
            self.inner.monitoring.stop();
            return;
        }
        let sink = self.inner.session.lock().as_ref().map(|s| s.outbound.clone());
        match sink {
            Some(sink) => self.inner.start_monitoring(sink),
            None => debug!("{} not connected, monitoring stays off", self.family()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn topology(&self) -> Topology {
        self.inner.monitoring.topology()
    }

    pub fn monitoring(&self) -> &Monitoring {
        &self.inner.monitoring
    }

    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe_connection()
    }

    pub fn subscribe_robot(&self) -> broadcast::Receiver<RobotEvent> {
        self.inner.events.subscribe_robot()
    }
}

struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<P: RobotProtocol> Inner<P> {
    fn is_connected(&self) -> bool {
        *self.state.lock() == ConnectionState::Connected
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, next) != next
        };
        if changed {
            info!("{} connection {:?}", self.protocol.family(), next);
            self.events
                .emit_connection(ConnectionEvent::StateChanged(next));
        }
    }

    fn step(&self, step: u8, message: String) {
        info!("[{}] {}", step, message);
        self.events
            .emit_connection(ConnectionEvent::Step { message, step });
    }

    fn enqueue(&self, frames: Vec<Frame>) -> Result<(), RobotError> {
        let session = self.session.lock();
        let session = session.as_ref().ok_or(RobotError::NotConnected)?;
        for frame in frames {
            session
                .outbound
                .send(frame)
                .map_err(|_| RobotError::NotConnected)?;
        }
        Ok(())
    }

    fn check_epoch(&self, epoch: u64, step: u8) -> Result<(), StepError> {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            Ok(())
        } else {
            Err((step, RobotError::Canceled))
        }
    }

    /// The device connected after `clean_up()` already released it
    async fn release_if_stale(
        &self,
        epoch: u64,
        step: u8,
        device: &BoxedDevice,
    ) -> Result<(), StepError> {
        let current = self.check_epoch(epoch, step);
        if current.is_err() {
            device.set_data_handler(None);
            if let Err(e) = device.disconnect().await {
                debug!("Releasing abandoned device: {}", e);
            }
        }
        current
    }

    fn start_monitoring(&self, sink: FrameSink) {
        let known = self.monitoring.topology();
        let topology = if known.is_empty() {
            self.protocol.initial_topology()
        } else {
            known
        };
        self.monitoring.start(sink, topology);
    }

    async fn connect(self: &Arc<Self>) -> bool {
        if self.is_connected() {
            return true;
        }
        if self.connecting.swap(true, Ordering::SeqCst) {
            debug!("{} connect already in flight", self.protocol.family());
            return false;
        }
        let _guard = ConnectingGuard(&self.connecting);
        let epoch = self.epoch.load(Ordering::SeqCst);

        let fallback = if self.lost.load(Ordering::SeqCst) {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Discovering
        };
        self.set_state(ConnectionState::Connecting);

        match self.establish(epoch).await {
            Ok(()) => {
                self.lost.store(false, Ordering::SeqCst);
                true
            }
            Err((step, e)) => {
                let pending = self.pending.lock().take();
                if let Some(device) = pending {
                    device.set_data_handler(None);
                    if let Err(e) = device.disconnect().await {
                        debug!("Releasing failed device: {}", e);
                    }
                }
                if matches!(e, RobotError::Canceled) {
                    debug!("{} connect abandoned at step {}", self.protocol.family(), step);
                    self.set_state(ConnectionState::Disconnected);
                    return false;
                }
                warn!("{} connect failed at step {}: {}", self.protocol.family(), step, e);
                self.events.emit_connection(ConnectionEvent::Error {
                    message: e.to_string(),
                    step,
                });
                self.set_state(fallback);
                false
            }
        }
    }

    async fn establish(self: &Arc<Self>, epoch: u64) -> Result<(), StepError> {
        let family = self.protocol.family();
        let timeout = self.settings.connect_timeout;

        self.step(1, format!("Looking for {} device", family));
        let device = tokio::time::timeout(timeout, self.resolver.resolve())
            .await
            .map_err(|_| TransportError::Timeout)
            .and_then(|r| r)
            .map_err(|e| (1, e.into()))?;
        *self.pending.lock() = Some(device.clone());
        self.check_epoch(epoch, 1)?;

        self.step(2, format!("Attaching to {}", device.info().display_name()));
        self.stream.lock().clear();
        *self.decoder.lock() = P::Decoder::default();
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        device.set_data_handler(Some(data_tx));

        self.step(3, format!("Connecting over {}", device.info().transport_type.label()));
        tokio::time::timeout(timeout, device.connect())
            .await
            .map_err(|_| TransportError::Timeout)
            .and_then(|r| r)
            .map_err(|e| (3, e.into()))?;
        self.release_if_stale(epoch, 3, &device).await?;
        for step in self.protocol.handshake() {
            let result = match step {
                HandshakeStep::Write {
                    characteristic,
                    data,
                } => device.write_characteristic(characteristic, &data).await,
                HandshakeStep::Listen { characteristic } => device.listen(characteristic).await,
            };
            result.map_err(|e| (3, e.into()))?;
            self.release_if_stale(epoch, 3, &device).await?;
        }

        self.step(4, format!("Preparing {}", family));
        let prepare = {
            let mut state = self.handler_state.lock();
            self.protocol.prepare(&mut state)
        }
        .map_err(|e| (4, e.into()))?;

        // clean_up bumps the epoch under this lock, so either it sees the
        // session or the check below sees the bump
        let mut slot = self.session.lock();
        self.check_epoch(epoch, 4)?;

        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound, queue) = frame_queue();
        for frame in prepare {
            let _ = outbound.send(frame);
        }
        let flush = Arc::new(Notify::new());
        let writer = tokio::spawn(write_loop(
            Arc::downgrade(self),
            id,
            device.clone(),
            queue,
            flush.clone(),
        ));
        let reader = tokio::spawn(read_loop(Arc::downgrade(self), id, data_rx));

        self.pending.lock().take();
        *slot = Some(Session {
            id,
            device,
            outbound: outbound.clone(),
            flush,
            writer,
            reader,
        });
        self.set_state(ConnectionState::Connected);

        if self.settings.monitor {
            self.start_monitoring(outbound);
        }
        Ok(())
    }

    /// Route one inbound chunk through the stream reader and decoder
    fn handle_chunk(&self, chunk: &[u8]) {
        let frames = self.stream.lock().push(chunk);
        for frame in frames {
            trace!("RX {:02X?}", frame);
            let topology = self.monitoring.topology();
            let events = {
                let mut decoder = self.decoder.lock();
                self.protocol.decode(&mut decoder, &topology, &frame)
            };
            for event in events {
                if let RobotEvent::ChangedDevices(topology) = &event {
                    self.monitoring.update_topology(topology.clone());
                }
                self.events.emit_robot(event);
            }
        }
    }

    /// Called from the session tasks; teardown runs on its own task
    fn session_lost(self: &Arc<Self>, id: u64) {
        let inner = self.clone();
        tokio::spawn(async move { inner.drop_session(id).await });
    }

    async fn drop_session(&self, id: u64) {
        let session = {
            let mut slot = self.session.lock();
            if slot.as_ref().is_some_and(|s| s.id == id) {
                slot.take()
            } else {
                None
            }
        };
        let Some(session) = session else {
            return;
        };

        warn!("{} session lost", self.protocol.family());
        self.monitoring.stop();
        session.writer.abort();
        session.reader.abort();
        session.device.set_data_handler(None);
        if let Err(e) = session.device.disconnect().await {
            debug!("Disconnect after lost session: {}", e);
        }
        self.lost.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Reconnecting);
    }

    async fn clean_up(&self) {
        let family = self.protocol.family();

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.abort();
            let _ = timer.await;
        }

        let session = {
            let mut slot = self.session.lock();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        self.monitoring.stop();
        let pending = self.pending.lock().take();
        match (session, pending) {
            (Some(session), _) => {
                session.writer.abort();
                session.reader.abort();
                let _ = session.writer.await;

                let stop = self.protocol.stop(&mut self.handler_state.lock());
                match stop {
                    Ok(frames) => {
                        let device = session.device.clone();
                        let send_all = async move {
                            for frame in frames {
                                device.send(frame.bytes()).await?;
                                if let Some(delay) = frame.delay_after() {
                                    tokio::time::sleep(delay).await;
                                }
                            }
                            Ok::<_, TransportError>(())
                        };
                        match tokio::time::timeout(STOP_TIMEOUT, send_all).await {
                            Ok(Ok(())) => debug!("{} stop sent", family),
                            Ok(Err(e)) => debug!("Best-effort stop failed: {}", e),
                            Err(_) => debug!("Best-effort stop timed out"),
                        }
                    }
                    Err(e) => warn!("Encoding {} stop failed: {}", family, e),
                }

                session.device.set_data_handler(None);
                if let Err(e) = session.device.disconnect().await {
                    warn!("Disconnect failed: {}", e);
                }
            }
            (None, Some(device)) => {
                device.set_data_handler(None);
                if let Err(e) = device.disconnect().await {
                    debug!("Releasing pending device: {}", e);
                }
            }
            (None, None) => debug!("{} already disconnected", family),
        }

        self.lost.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        self.events.clear();
    }
}

// =============================================================================
// Session tasks
// =============================================================================

async fn reconnect_loop<P: RobotProtocol>(inner: Weak<Inner<P>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.is_connected() {
            inner.connect().await;
        }
    }
}

async fn write_loop<P: RobotProtocol>(
    inner: Weak<Inner<P>>,
    session: u64,
    device: BoxedDevice,
    mut queue: FrameQueue,
    flush: Arc<Notify>,
) {
    while let Some((stamp, frame)) = queue.recv().await {
        trace!("TX {}", frame.to_hex());
        if let Err(e) = device.send(frame.bytes()).await {
            warn!("Send failed: {}", e);
            if let Some(inner) = inner.upgrade() {
                inner.session_lost(session);
            }
            break;
        }

        // a reset cuts the delay short; a wakeup left over from an older
        // reset does not
        if let Some(delay) = frame.delay_after() {
            let deadline = Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = flush.notified() => {
                        if queue.is_stale(stamp) {
                            debug!("Delay cut short by reset");
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn read_loop<P: RobotProtocol>(
    inner: Weak<Inner<P>>,
    session: u64,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(chunk) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.handle_chunk(&chunk);
    }
    if let Some(inner) = inner.upgrade() {
        debug!("Data handler closed");
        inner.session_lost(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::makeblock::MBotProtocol;
    use cwc_transport::{MockDevice, MockDiscovery};

    #[tokio::test]
    async fn test_exec_requires_session() {
        let device = Arc::new(MockDevice::new("mbot"));
        let conn = Connection::with_device(MBotProtocol, device, ConnectionSettings::default());
        assert!(matches!(
            conn.exec("stop", &Params::new()),
            Err(RobotError::NotConnected)
        ));
        assert!(matches!(
            conn.exec("fly", &Params::new()),
            Err(RobotError::UnsupportedCommand { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_discover_not_found() {
        let discovery = Arc::new(MockDiscovery::new());
        let resolver = AutoDiscover::new(discovery, "Makeblock");
        assert!(matches!(
            resolver.resolve().await,
            Err(TransportError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_emits_error_step() {
        let device = Arc::new(MockDevice::new("mbot"));
        device.fail_next_connects(1);
        let conn = Connection::with_device(MBotProtocol, device.clone(), ConnectionSettings::default());
        let mut events = conn.subscribe_connection();

        assert!(!conn.connect().await);
        assert_eq!(conn.state(), ConnectionState::Discovering);
        assert!(!device.has_data_handler());

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let ConnectionEvent::Error { step, .. } = event {
                assert_eq!(step, 3);
                saw_error = true;
            }
        }
        assert!(saw_error);

        assert!(conn.connect().await);
        assert!(conn.is_connected());
        conn.disconnect().await;
    }
}
