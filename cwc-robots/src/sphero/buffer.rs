//! Sphero client command packets

use super::constants::{callback, SOP1, SOP2_ANSWER, SOP2_ASYNC};
use crate::buffer::{ByteArray, Frame};

/// `(sum(bytes) & 0xFF) ^ 0xFF` over everything after the start bytes
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) ^ 0xFF
}

/// Builder of one client command
///
/// Serialized layout: `[FF, FF|FE, did, cid, seq, dlen, payload..., chk]`
/// with `dlen = payload.len() + 1`. The sequence byte carries the callback
/// type so acknowledgements can be routed.
#[derive(Debug)]
pub struct SpheroBuffer {
    command: [u8; 2],
    callback_type: u8,
    data: ByteArray,
}

impl SpheroBuffer {
    pub fn new(command: [u8; 2]) -> Self {
        Self {
            command,
            callback_type: callback::NONE,
            data: ByteArray::new(),
        }
    }

    /// Request an acknowledgement routed by `callback_type`
    pub fn callback(mut self, callback_type: u8) -> Self {
        self.callback_type = callback_type;
        self
    }

    pub fn byte(mut self, value: u8) -> Self {
        self.data.write_byte(value);
        self
    }

    pub fn uint16(mut self, value: u16) -> Self {
        self.data.write_uint16(value);
        self
    }

    pub fn serialize(self) -> Frame {
        let payload = self.data.into_vec();
        let sop2 = if self.callback_type != callback::NONE {
            SOP2_ANSWER
        } else {
            SOP2_ASYNC
        };
        let mut bytes = Vec::with_capacity(payload.len() + 7);
        bytes.extend_from_slice(&[
            SOP1,
            sop2,
            self.command[0],
            self.command[1],
            self.callback_type,
            (payload.len() + 1) as u8,
        ]);
        bytes.extend_from_slice(&payload);
        bytes.push(checksum(&bytes[2..]));
        Frame::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphero::constants::command;

    #[test]
    fn test_answer_requested_with_callback() {
        let frame = SpheroBuffer::new(command::RGB_LED_GET)
            .callback(callback::RGB)
            .serialize();
        assert_eq!(frame.bytes(), &[0xFF, 0xFF, 0x02, 0x22, 0x01, 0x01, 0xD9]);
    }

    #[test]
    fn test_heading_is_big_endian() {
        let frame = SpheroBuffer::new(command::HEADING).uint16(270).serialize();
        assert_eq!(&frame.bytes()[5..8], &[0x03, 0x01, 0x0E]);
    }
}
