//! Makeblock mBot and mBot Ranger
//!
//! Both robots use the same `FF 55` request format and `FF 55 ... 0D 0A`
//! replies; they differ in device ids, ports and reply indices. Sensors have
//! no port discovery, so the topology is a fixed list keyed by reply index
//! (Ranger's second light sensor and temperature sensor share a port).

pub mod buffer;
pub mod decoder;
pub mod mbot;
pub mod ranger;

use std::time::Duration;

use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::monitoring::MonitorEntry;
use crate::params::Params;
use crate::topology::{PortDevice, SensorKind, Topology};

pub use buffer::MakeblockBuffer;
pub use decoder::{MakeblockDecoder, ReplyIndices, FRAMING};
pub use mbot::MBotProtocol;
pub use ranger::RangerProtocol;

/// One pollable on-board sensor
#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    pub index: u8,
    pub kind: SensorKind,
    pub device: u8,
    pub port: u8,
    pub interval: Duration,
}

/// Request for a sensor reading answered under `index`
pub fn get_sensor_data(index: u8, device: u8, port: u8) -> Result<Frame, EncodingError> {
    MakeblockBuffer::new(index, buffer::action::GET)
        .byte(device)
        .byte(port)
        .serialize()
}

pub(crate) fn cmd_get_sensor_data(p: &Params) -> Result<Vec<Frame>, EncodingError> {
    let index = p.byte_or("index", 0)?;
    let device = crate::params::byte("device", p.require_i64("device")?)?;
    let port = p.byte_or("port", 0)?;
    Ok(vec![get_sensor_data(index, device, port)?])
}

pub fn reset() -> Result<Frame, EncodingError> {
    MakeblockBuffer::new(0x00, buffer::action::RESET).serialize()
}

pub fn start() -> Result<Frame, EncodingError> {
    MakeblockBuffer::new(0x00, buffer::action::START).serialize()
}

fn sensor_topology(sensors: &[SensorSpec]) -> Topology {
    Topology::from_ports(
        sensors
            .iter()
            .map(|s| (s.index, PortDevice::new(s.kind, 0))),
    )
}

fn sensor_plan(sensors: &[SensorSpec], topology: &Topology) -> Vec<MonitorEntry> {
    topology
        .iter()
        .filter_map(|(index, device)| {
            let sensor = sensors.iter().find(|s| s.index == index && s.kind == device.kind)?;
            let frame = get_sensor_data(sensor.index, sensor.device, sensor.port).ok()?;
            Some(MonitorEntry {
                port: index,
                kind: sensor.kind,
                interval: sensor.interval,
                frame,
            })
        })
        .collect()
}
