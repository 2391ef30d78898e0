//! Sphero response decoding
//!
//! Acknowledgements (`FF FF`) answer a command; the sequence byte carries
//! the callback type the command was sent with. Async messages (`FF FE`)
//! are pushed by the robot on its own.

use tracing::{debug, warn};

use super::buffer::checksum;
use super::constants::{callback, message, SOP1, SOP2_ANSWER, SOP2_ASYNC};
use crate::events::RobotEvent;

fn i16_be(data: &[u8], at: usize) -> Option<i16> {
    let bytes = data.get(at..at + 2)?;
    Some(i16::from_be_bytes([bytes[0], bytes[1]]))
}

fn u16_be(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Total frame length once the length field is buffered
pub fn frame_length(buffer: &[u8]) -> Option<usize> {
    match buffer.get(1)? {
        &SOP2_ANSWER => Some(usize::from(*buffer.get(4)?) + 5),
        _ => Some(usize::from(u16_be(buffer, 3)?) + 5),
    }
}

pub fn verify_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&last, body)) if body.len() > 2 => checksum(&body[2..]) == last,
        _ => false,
    }
}

/// Last position report, used to suppress repeats
#[derive(Debug, Default)]
pub struct SpheroDecoder {
    location: Option<(i16, i16)>,
}

pub fn decode(decoder: &mut SpheroDecoder, frame: &[u8]) -> Vec<RobotEvent> {
    if frame.len() < 6 || frame[0] != SOP1 {
        return Vec::new();
    }
    // data sits between the length field and the checksum
    let data = &frame[5..frame.len() - 1];
    match frame[1] {
        SOP2_ANSWER => decode_ack(decoder, frame[3], data),
        SOP2_ASYNC => decode_async(frame[2], data),
        other => {
            warn!("Unknown Sphero packet type {:#04x}", other);
            Vec::new()
        }
    }
}

fn decode_ack(decoder: &mut SpheroDecoder, seq: u8, data: &[u8]) -> Vec<RobotEvent> {
    match seq {
        callback::NONE => Vec::new(),
        callback::RGB => match data.get(..3) {
            Some(rgb) => vec![RobotEvent::Rgb {
                r: rgb[0],
                g: rgb[1],
                b: rgb[2],
            }],
            None => Vec::new(),
        },
        callback::LOCATION => decode_location(decoder, data).into_iter().collect(),
        callback::VERSION => vec![RobotEvent::Version(data.to_vec())],
        other => {
            debug!("Ack for unknown callback {} with {:02X?}", other, data);
            Vec::new()
        }
    }
}

fn decode_location(decoder: &mut SpheroDecoder, data: &[u8]) -> Option<RobotEvent> {
    let x = i16_be(data, 0)?;
    let y = i16_be(data, 2)?;
    let vx = i16_be(data, 4)?;
    let vy = i16_be(data, 6)?;
    let speed = u16_be(data, 8)?;
    if decoder.location == Some((x, y)) {
        return None;
    }
    decoder.location = Some((x, y));
    Some(RobotEvent::Position {
        x,
        y,
        vx,
        vy,
        speed,
    })
}

fn decode_async(id: u8, data: &[u8]) -> Vec<RobotEvent> {
    match id {
        message::PRE_SLEEP => {
            warn!("Sphero goes to sleep in 10 seconds");
            vec![RobotEvent::PreSleep]
        }
        message::COLLISION_DETECTED => decode_collision(data).into_iter().collect(),
        other => {
            debug!("Async message {:#04x} with {} bytes", other, data.len());
            Vec::new()
        }
    }
}

fn decode_collision(data: &[u8]) -> Option<RobotEvent> {
    let x = i16_be(data, 0)?;
    let y = i16_be(data, 2)?;
    let z = i16_be(data, 4)?;
    let axis = if *data.get(6)? == 0x01 { y } else { x };
    Some(RobotEvent::Collision {
        x,
        y,
        z,
        axis,
        x_magnitude: i16_be(data, 7)?,
        y_magnitude: i16_be(data, 9)?,
        speed: *data.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(seq: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFF, 0x00, seq, (data.len() + 1) as u8];
        frame.extend_from_slice(data);
        frame.push(checksum(&frame[2..]));
        frame
    }

    #[test]
    fn test_length_of_ack_and_async() {
        assert_eq!(frame_length(&[0xFF, 0xFF, 0x00, 0x02, 0x0B]), Some(16));
        assert_eq!(frame_length(&[0xFF, 0xFE, 0x07, 0x00, 0x11]), Some(22));
        assert_eq!(frame_length(&[0xFF, 0xFE, 0x07]), None);
    }

    #[test]
    fn test_location_reported_on_change() {
        let mut decoder = SpheroDecoder::default();
        let data = [0x00, 0x0A, 0xFF, 0xF6, 0x00, 0x01, 0x00, 0x02, 0x00, 0x14];
        let frame = ack(callback::LOCATION, &data);
        assert!(verify_checksum(&frame));
        assert_eq!(
            decode(&mut decoder, &frame),
            vec![RobotEvent::Position {
                x: 10,
                y: -10,
                vx: 1,
                vy: 2,
                speed: 20
            }]
        );
        assert!(decode(&mut decoder, &frame).is_empty());
    }

    #[test]
    fn test_collision_message() {
        let data = [
            0x00, 0x64, 0xFF, 0x9C, 0x00, 0x00, 0x01, 0x00, 0x30, 0x00, 0x20, 0x55, 0, 0, 0, 0,
        ];
        let mut frame = vec![0xFF, 0xFE, 0x07, 0x00, (data.len() + 1) as u8];
        frame.extend_from_slice(&data);
        frame.push(checksum(&frame[2..]));

        let events = decode(&mut SpheroDecoder::default(), &frame);
        assert_eq!(
            events,
            vec![RobotEvent::Collision {
                x: 100,
                y: -100,
                z: 0,
                axis: -100,
                x_magnitude: 0x30,
                y_magnitude: 0x20,
                speed: 0x55
            }]
        );
    }

    #[test]
    fn test_pre_sleep_and_rgb() {
        let mut decoder = SpheroDecoder::default();
        let pre_sleep = [0xFF, 0xFE, 0x05, 0x00, 0x01, 0xF9];
        assert_eq!(decode(&mut decoder, &pre_sleep), vec![RobotEvent::PreSleep]);

        let rgb = ack(callback::RGB, &[0x10, 0x20, 0x30]);
        assert_eq!(
            decode(&mut decoder, &rgb),
            vec![RobotEvent::Rgb {
                r: 0x10,
                g: 0x20,
                b: 0x30
            }]
        );
    }
}
