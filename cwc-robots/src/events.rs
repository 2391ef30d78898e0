//! Typed event channels for connection progress and robot telemetry
//!
//! Consumers subscribe to broadcast channels; raw bytes never leave the
//! connection. [`EventHub::clear`] drops the senders so every outstanding
//! receiver observes `Closed`.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::topology::{SensorKind, Topology};

const CONNECTION_CAPACITY: usize = 64;
const ROBOT_CAPACITY: usize = 256;

/// Lifecycle states of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Discovering,
    Connecting,
    Connected,
    Reconnecting,
}

/// Progress and failure notifications of multi-stage connects
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Step { message: String, step: u8 },
    StateChanged(ConnectionState),
    Error { message: String, step: u8 },
}

/// Decoded device telemetry
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    /// Reading of a monitored port
    SensorValue {
        port: u8,
        kind: SensorKind,
        value: f64,
    },
    /// Port topology differs from the last snapshot
    ChangedDevices(Topology),
    Firmware(String),
    Battery(u8),
    Position {
        x: i16,
        y: i16,
        vx: i16,
        vy: i16,
        speed: u16,
    },
    Collision {
        x: i16,
        y: i16,
        z: i16,
        axis: i16,
        x_magnitude: i16,
        y_magnitude: i16,
        speed: u8,
    },
    LineFollower {
        left: bool,
        right: bool,
        raw: Vec<u8>,
    },
    LightSensors {
        light1: f64,
        light2: f64,
    },
    ButtonPressed(u8),
    Rgb {
        r: u8,
        g: u8,
        b: u8,
    },
    Version(Vec<u8>),
    PreSleep,
}

/// Owner of the broadcast senders of one connection
#[derive(Debug, Default)]
pub struct EventHub {
    connection: Mutex<Option<broadcast::Sender<ConnectionEvent>>>,
    robot: Mutex<Option<broadcast::Sender<RobotEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection
            .lock()
            .get_or_insert_with(|| broadcast::channel(CONNECTION_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_robot(&self) -> broadcast::Receiver<RobotEvent> {
        self.robot
            .lock()
            .get_or_insert_with(|| broadcast::channel(ROBOT_CAPACITY).0)
            .subscribe()
    }

    pub fn emit_connection(&self, event: ConnectionEvent) {
        if let Some(tx) = self.connection.lock().as_ref() {
            if tx.send(event).is_err() {
                trace!("No connection event subscribers");
            }
        }
    }

    pub fn emit_robot(&self, event: RobotEvent) {
        if let Some(tx) = self.robot.lock().as_ref() {
            if tx.send(event).is_err() {
                trace!("No robot event subscribers");
            }
        }
    }

    /// Close every channel; later subscriptions get fresh ones
    pub fn clear(&self) {
        self.connection.lock().take();
        self.robot.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe_robot();
        hub.emit_robot(RobotEvent::Battery(80));
        assert_eq!(rx.recv().await.unwrap(), RobotEvent::Battery(80));
    }

    #[tokio::test]
    async fn test_clear_closes_receivers() {
        let hub = EventHub::new();
        let mut conn = hub.subscribe_connection();
        let mut robot = hub.subscribe_robot();
        hub.clear();
        assert!(matches!(conn.recv().await, Err(RecvError::Closed)));
        assert!(matches!(robot.recv().await, Err(RecvError::Closed)));

        // emitting after clear is a no-op, resubscribing works
        hub.emit_robot(RobotEvent::PreSleep);
        let mut again = hub.subscribe_robot();
        hub.emit_robot(RobotEvent::PreSleep);
        assert_eq!(again.recv().await.unwrap(), RobotEvent::PreSleep);
    }
}
