//! EV3 reply decoding

use std::collections::HashMap;

use tracing::{debug, warn};
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::constants::{callback, reply};
use crate::events::RobotEvent;
use crate::topology::{PortDevice, SensorKind, Topology};

/// Fixed prefix of every reply frame
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ReplyHeader {
    length: U16,
    callback: u8,
    port: u8,
    status: u8,
}

/// Last reported values, used to suppress unchanged readings
#[derive(Debug, Default)]
pub struct Ev3Decoder {
    values: HashMap<(u8, u8), f64>,
}

impl Ev3Decoder {
    fn changed(&mut self, callback: u8, port: u8, value: f64) -> bool {
        self.values.insert((callback, port), value) != Some(value)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn nul_trimmed(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

/// Decode one reply frame against the current topology
pub fn decode(decoder: &mut Ev3Decoder, topology: &Topology, frame: &[u8]) -> Vec<RobotEvent> {
    let Ok((header, data)) = ReplyHeader::read_from_prefix(frame) else {
        debug!("Short EV3 reply: {:02X?}", frame);
        return Vec::new();
    };
    if header.status == reply::ERROR {
        debug!(
            "EV3 reply error for callback {:#04x} port {} (length {})",
            header.callback,
            header.port,
            header.length.get()
        );
        return Vec::new();
    }

    let port = header.port;
    match header.callback {
        callback::FIRMWARE => vec![RobotEvent::Firmware(nul_trimmed(data))],
        callback::BATTERY => match data.first() {
            Some(&level) => vec![RobotEvent::Battery(level)],
            None => Vec::new(),
        },
        callback::DEVICE_NAME => decode_device_name(topology, port, data),
        callback::DEVICE_PCT_VALUE | callback::DEVICE_RAW_VALUE => match data.first() {
            Some(&v) => value_event(decoder, topology, header.callback, port, f64::from(v)),
            None => Vec::new(),
        },
        callback::DEVICE_SI_VALUE => match data.get(..4) {
            Some(bytes) => {
                let raw = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let value = round_to(f64::from(raw), 1);
                value_event(decoder, topology, header.callback, port, value)
            }
            None => Vec::new(),
        },
        callback::ACTOR_VALUE => match data.get(..4) {
            Some(bytes) => {
                let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                value_event(decoder, topology, header.callback, port, f64::from(raw))
            }
            None => Vec::new(),
        },
        other => {
            debug!("Unhandled EV3 callback {:#04x}", other);
            Vec::new()
        }
    }
}

fn value_event(
    decoder: &mut Ev3Decoder,
    topology: &Topology,
    callback: u8,
    port: u8,
    value: f64,
) -> Vec<RobotEvent> {
    // Readings for ports no longer in the topology are stale replies
    let Some(device) = topology.get(port) else {
        return Vec::new();
    };
    if !decoder.changed(callback, port, value) {
        return Vec::new();
    }
    vec![RobotEvent::SensorValue {
        port,
        kind: device.kind,
        value,
    }]
}

fn decode_device_name(topology: &Topology, port: u8, data: &[u8]) -> Vec<RobotEvent> {
    let name = nul_trimmed(data);
    let device = if name.eq_ignore_ascii_case("none") {
        None
    } else {
        match SensorKind::from_ev3_name(&name) {
            Some((kind, mode)) => Some(PortDevice::new(kind, mode)),
            None => {
                // PORT ERROR, TERMINAL and unknown devices leave the port as is
                warn!("Ignoring device '{}' on port {:#04x}", name, port);
                return Vec::new();
            }
        }
    };

    let updated = topology.with_port(port, device);
    if updated == *topology {
        return Vec::new();
    }
    vec![RobotEvent::ChangedDevices(updated)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_frame(callback: u8, port: u8, data: &[u8]) -> Vec<u8> {
        let len = (data.len() + 3) as u16;
        let mut frame = len.to_le_bytes().to_vec();
        frame.extend_from_slice(&[callback, port, reply::OK]);
        frame.extend_from_slice(data);
        frame
    }

    #[test]
    fn test_device_name_updates_topology() {
        let mut decoder = Ev3Decoder::default();
        let frame = reply_frame(callback::DEVICE_NAME, 0x01, b"GYRO-ANG\0\0\0");
        let events = decode(&mut decoder, &Topology::new(), &frame);
        let RobotEvent::ChangedDevices(topology) = &events[0] else {
            panic!("expected ChangedDevices, got {:?}", events);
        };
        assert_eq!(
            topology.get(0x01),
            Some(&PortDevice::new(SensorKind::GyroAngle, 0))
        );

        // same name again changes nothing
        assert!(decode(&mut decoder, topology, &frame).is_empty());
    }

    #[test]
    fn test_none_removes_port_and_errors_are_ignored() {
        let mut decoder = Ev3Decoder::default();
        let topology =
            Topology::from_ports([(0x00, PortDevice::new(SensorKind::Touch, 0))]);

        let error = reply_frame(callback::DEVICE_NAME, 0x00, b"PORT ERROR\0");
        assert!(decode(&mut decoder, &topology, &error).is_empty());

        let none = reply_frame(callback::DEVICE_NAME, 0x00, b"NONE\0");
        let events = decode(&mut decoder, &topology, &none);
        assert_eq!(events, vec![RobotEvent::ChangedDevices(Topology::new())]);
    }

    #[test]
    fn test_values_only_on_change() {
        let mut decoder = Ev3Decoder::default();
        let topology =
            Topology::from_ports([(0x00, PortDevice::new(SensorKind::Touch, 0))]);
        let frame = reply_frame(callback::DEVICE_PCT_VALUE, 0x00, &[100]);

        assert_eq!(
            decode(&mut decoder, &topology, &frame),
            vec![RobotEvent::SensorValue {
                port: 0,
                kind: SensorKind::Touch,
                value: 100.0
            }]
        );
        assert!(decode(&mut decoder, &topology, &frame).is_empty());
    }

    #[test]
    fn test_si_and_actor_values() {
        let mut decoder = Ev3Decoder::default();
        let topology = Topology::from_ports([
            (0x03, PortDevice::new(SensorKind::UltrasonicCm, 0)),
            (0x11, PortDevice::new(SensorKind::LargeMotorDegree, 0)),
        ]);

        let si = reply_frame(callback::DEVICE_SI_VALUE, 0x03, &12.34f32.to_le_bytes());
        assert_eq!(
            decode(&mut decoder, &topology, &si),
            vec![RobotEvent::SensorValue {
                port: 3,
                kind: SensorKind::UltrasonicCm,
                value: 12.3
            }]
        );

        let actor = reply_frame(callback::ACTOR_VALUE, 0x11, &(-720i32).to_le_bytes());
        assert_eq!(
            decode(&mut decoder, &topology, &actor),
            vec![RobotEvent::SensorValue {
                port: 0x11,
                kind: SensorKind::LargeMotorDegree,
                value: -720.0
            }]
        );
    }

    #[test]
    fn test_firmware_battery_and_short_frames() {
        let mut decoder = Ev3Decoder::default();
        let topology = Topology::new();
        let fw = reply_frame(callback::FIRMWARE, 0, b"V1.09H\0\0\0\0");
        assert_eq!(
            decode(&mut decoder, &topology, &fw),
            vec![RobotEvent::Firmware("V1.09H".into())]
        );
        let battery = reply_frame(callback::BATTERY, 0, &[87]);
        assert_eq!(
            decode(&mut decoder, &topology, &battery),
            vec![RobotEvent::Battery(87)]
        );
        assert!(decode(&mut decoder, &topology, &[0x03, 0x00]).is_empty());
    }
}
