//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `list`: Device listing and handler tables (list, commands)
//! - `encode`: Offline frame encoding
//! - `run`: One-shot command execution against a robot
//! - `monitor`: Live sensor event output
//! - `config`: Config file helpers

pub mod config;
pub mod encode;
pub mod list;
pub mod monitor;
pub mod run;

use std::time::Duration;

use anyhow::anyhow;
use cwc_robots::{Connection, ConnectionEvent, RobotProtocol};
use cwc_transport::{PrinterConfig, TrafficFilter};
use tokio::sync::broadcast;

use cwc_driver::config::Config;
use cwc_driver::target::{self, DeviceTarget};

/// Result type for command handlers
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Everything needed to reach a robot
pub struct DeviceOptions {
    pub target: DeviceTarget,
    pub printer: Option<PrinterConfig>,
    pub config: Config,
}

/// Run `$body` with `$p` bound to the protocol descriptor of `$family`
macro_rules! with_protocol {
    ($family:expr, $p:ident => $body:expr) => {
        match $family {
            cwc_robots::Family::Ev3 => {
                let $p = cwc_robots::ev3::Ev3Protocol;
                $body
            }
            cwc_robots::Family::SpheroClassic => {
                let $p = cwc_robots::sphero::SpheroProtocol::classic();
                $body
            }
            cwc_robots::Family::SpheroV1 => {
                let $p = cwc_robots::sphero::SpheroProtocol::v1();
                $body
            }
            cwc_robots::Family::MBot => {
                let $p = cwc_robots::makeblock::MBotProtocol;
                $body
            }
            cwc_robots::Family::MBotRanger => {
                let $p = cwc_robots::makeblock::RangerProtocol;
                $body
            }
        }
    };
}
pub(crate) use with_protocol;

/// Build a connection for `protocol` from the CLI device options
pub async fn open<P: RobotProtocol>(
    protocol: P,
    options: &DeviceOptions,
    monitor: bool,
) -> Result<Connection<P>, Box<dyn std::error::Error>> {
    let resolver =
        target::resolver(&protocol, &options.target, &options.config, options.printer.clone()).await?;
    Ok(Connection::new(
        protocol,
        resolver,
        options.config.connection_settings(monitor),
    ))
}

/// One explicit connect attempt, failing with the reported step error
pub async fn connect_once<P: RobotProtocol>(
    conn: &Connection<P>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = conn.subscribe_connection();
    if conn.connect().await {
        return Ok(());
    }
    let reason = last_error(&mut events).unwrap_or_else(|| "connect failed".to_string());
    Err(anyhow!("Could not connect to {}: {}", conn.family(), reason).into())
}

fn last_error(events: &mut broadcast::Receiver<ConnectionEvent>) -> Option<String> {
    let mut reason = None;
    while let Ok(event) = events.try_recv() {
        if let ConnectionEvent::Error { message, step } = event {
            reason = Some(format!("{message} (step {step})"));
        }
    }
    reason
}

/// Slack given to the writer task after queueing frames
pub const SETTLE: Duration = Duration::from_millis(250);

/// Time for the writer to push queued frames before disconnecting
pub fn drain_time(delays: impl IntoIterator<Item = Option<Duration>>) -> Duration {
    delays.into_iter().flatten().sum::<Duration>() + SETTLE
}

/// Create printer config from CLI flags
pub fn create_printer_config(
    monitor: bool,
    hex: bool,
    filter: Option<&str>,
) -> Result<Option<PrinterConfig>, Box<dyn std::error::Error>> {
    if !monitor {
        return Ok(None);
    }

    let filter = match filter {
        Some(f) => f.parse::<TrafficFilter>()?,
        None => TrafficFilter::All,
    };

    Ok(Some(
        PrinterConfig::default()
            .with_hex(hex)
            .with_filter(filter),
    ))
}
