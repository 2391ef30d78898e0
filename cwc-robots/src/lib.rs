//! Robot protocol layer for educational robots
//!
//! Per-family buffer encoders, command tables and reply decoders for LEGO
//! EV3, Sphero (classic and BB-8 / SPRK+), Makeblock mBot and mBot Ranger,
//! plus the family-independent pieces driving them:
//!
//! - [`Connection`]: discovery, connect, reconnect and disconnect over a
//!   [`cwc_transport::Device`]
//! - [`Monitoring`]: per-port sensor polling driven by a [`Topology`]
//! - [`EventHub`]: typed broadcast channels for progress and telemetry
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cwc_robots::{Connection, ConnectionSettings, Params};
//! use cwc_robots::makeblock::MBotProtocol;
//! use cwc_transport::MockDevice;
//!
//! # async fn demo() -> Result<(), cwc_robots::RobotError> {
//! let device = Arc::new(MockDevice::new("Makeblock"));
//! let conn = Connection::with_device(MBotProtocol, device, ConnectionSettings::default());
//! if conn.connect().await {
//!     conn.exec("movePower", &Params::new().with("power", 100))?;
//! }
//! conn.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod connection;
pub mod error;
pub mod ev3;
pub mod events;
pub mod handler;
pub mod makeblock;
pub mod monitoring;
pub mod params;
pub mod protocol;
pub mod queue;
pub mod sphero;
pub mod topology;

pub use buffer::{ByteArray, Frame, Markers};
pub use connection::{AutoDiscover, Connection, ConnectionSettings, DeviceResolver, FixedDevice};
pub use error::{EncodingError, RobotError};
pub use events::{ConnectionEvent, ConnectionState, EventHub, RobotEvent};
pub use handler::CommandTable;
pub use monitoring::{ActiveInterval, MonitorEntry, Monitoring};
pub use params::Params;
pub use protocol::{Family, HandshakeStep, RobotProtocol, DEFAULT_BAUD_RATE};
pub use queue::{frame_queue, FrameQueue, FrameSink};
pub use topology::{PortDevice, SensorKind, Topology, TopologyChange};
