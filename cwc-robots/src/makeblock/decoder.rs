//! Makeblock response decoding
//!
//! Responses are `[FF 55 index type data...]` (the `0D 0A` footer is cut by
//! the stream reader). The index echoes the one the request was sent with.
//! Bare `FF 55` acknowledgements never reach the decoder.

use std::collections::HashMap;

use tracing::debug;

use super::buffer::{FOOTER, HEADER};
use crate::events::RobotEvent;
use crate::topology::SensorKind;
use cwc_transport::FrameConfig;

pub const FRAMING: FrameConfig = FrameConfig {
    headers: &[HEADER],
    footer: Some(FOOTER),
    min_size: 4,
    checksum: None,
    length: None,
    max_size: None,
};

/// Reply indices of one robot model
#[derive(Debug, Clone, Copy)]
pub struct ReplyIndices {
    pub ultrasonic: u8,
    pub line_follower: u8,
    pub light: u8,
    /// Second light sensor; when set both readings are reported together
    pub light2: Option<u8>,
    pub temperature: Option<u8>,
    pub inner_button: Option<u8>,
    pub version: u8,
}

/// Last raw payload per index plus the last light pair
#[derive(Debug, Default)]
pub struct MakeblockDecoder {
    raw: HashMap<u8, Vec<u8>>,
    light1: f64,
    light2: f64,
}

impl MakeblockDecoder {
    fn changed(&mut self, index: u8, data: &[u8]) -> bool {
        if self.raw.get(&index).is_some_and(|last| last == data) {
            return false;
        }
        self.raw.insert(index, data.to_vec());
        true
    }
}

/// f32 LE rounded to two decimals
fn float_value(data: &[u8]) -> Option<f64> {
    let bytes = data.get(..4)?;
    let raw = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Some((f64::from(raw) * 100.0).round() / 100.0)
}

pub fn decode(decoder: &mut MakeblockDecoder, indices: &ReplyIndices, frame: &[u8]) -> Vec<RobotEvent> {
    if frame.len() < 4 || !frame.starts_with(HEADER) {
        return Vec::new();
    }
    let index = frame[2];
    let data = &frame[4..];

    if index == indices.version {
        let version = String::from_utf8_lossy(data)
            .trim_matches(|c: char| c.is_control())
            .to_string();
        return vec![RobotEvent::Firmware(version)];
    }

    let is_sensor = index == indices.ultrasonic
        || index == indices.line_follower
        || index == indices.light
        || Some(index) == indices.light2
        || Some(index) == indices.temperature;
    if is_sensor && data.len() < 4 {
        return Vec::new();
    }
    if Some(index) == indices.inner_button && data.is_empty() {
        return Vec::new();
    }
    if !decoder.changed(index, data) {
        return Vec::new();
    }

    let sensor = |kind: SensorKind| {
        float_value(data).map(|value| RobotEvent::SensorValue {
            port: index,
            kind,
            value,
        })
    };

    let event = if index == indices.ultrasonic {
        sensor(SensorKind::Ultrasonic)
    } else if index == indices.line_follower {
        Some(RobotEvent::LineFollower {
            left: data[3] >= 64,
            right: data[2] >= 64,
            raw: data.to_vec(),
        })
    } else if Some(index) == indices.temperature {
        sensor(SensorKind::Temperature)
    } else if Some(index) == indices.inner_button {
        Some(RobotEvent::ButtonPressed(data[0]))
    } else if index == indices.light && indices.light2.is_none() {
        sensor(SensorKind::Light)
    } else if index == indices.light || Some(index) == indices.light2 {
        float_value(data).map(|value| {
            if index == indices.light {
                decoder.light1 = value;
            } else {
                decoder.light2 = value;
            }
            RobotEvent::LightSensors {
                light1: decoder.light1,
                light2: decoder.light2,
            }
        })
    } else {
        debug!("Unknown Makeblock reply index {:#04x}: {:02X?}", index, data);
        None
    };
    event.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDICES: ReplyIndices = ReplyIndices {
        ultrasonic: 0x10,
        line_follower: 0x11,
        light: 0x2A,
        light2: Some(0x2B),
        temperature: Some(0x21),
        inner_button: None,
        version: 0x20,
    };

    fn reply(index: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0x55, index, 0x02];
        frame.extend_from_slice(data);
        frame
    }

    #[test]
    fn test_float_rounding_and_change_detection() {
        let mut decoder = MakeblockDecoder::default();
        let frame = reply(0x10, &12.3456f32.to_le_bytes());
        assert_eq!(
            decode(&mut decoder, &INDICES, &frame),
            vec![RobotEvent::SensorValue {
                port: 0x10,
                kind: SensorKind::Ultrasonic,
                value: 12.35
            }]
        );
        assert!(decode(&mut decoder, &INDICES, &frame).is_empty());
    }

    #[test]
    fn test_line_follower_bits() {
        let mut decoder = MakeblockDecoder::default();
        // 2.0f32 = 00 00 00 40: right clear, left set
        let events = decode(&mut decoder, &INDICES, &reply(0x11, &2.0f32.to_le_bytes()));
        assert_eq!(
            events,
            vec![RobotEvent::LineFollower {
                left: true,
                right: false,
                raw: vec![0x00, 0x00, 0x00, 0x40]
            }]
        );
    }

    #[test]
    fn test_light_pair() {
        let mut decoder = MakeblockDecoder::default();
        decode(&mut decoder, &INDICES, &reply(0x2A, &100.0f32.to_le_bytes()));
        let events = decode(&mut decoder, &INDICES, &reply(0x2B, &250.0f32.to_le_bytes()));
        assert_eq!(
            events,
            vec![RobotEvent::LightSensors {
                light1: 100.0,
                light2: 250.0
            }]
        );
    }

    #[test]
    fn test_short_sensor_payload_ignored() {
        let mut decoder = MakeblockDecoder::default();
        assert!(decode(&mut decoder, &INDICES, &reply(0x10, &[0x01, 0x02])).is_empty());
    }

    #[test]
    fn test_version_string() {
        let mut decoder = MakeblockDecoder::default();
        let mut frame = vec![0xFF, 0x55, 0x20, 0x04];
        frame.extend_from_slice(b"09.01.016");
        assert_eq!(
            decode(&mut decoder, &INDICES, &frame),
            vec![RobotEvent::Firmware("09.01.016".into())]
        );
    }
}
