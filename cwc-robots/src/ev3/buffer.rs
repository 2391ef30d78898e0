//! EV3 direct command framing

use super::constants::{callback, command_type, parameter};
use crate::buffer::{ByteArray, Frame, Markers};

const EV3_MARKERS: Markers = Markers {
    byte: Some(parameter::BYTE),
    short: Some(parameter::SHORT),
    int: Some(parameter::INT),
    string: Some(parameter::STRING),
};

/// Builder of one EV3 direct command
///
/// Serialized layout: `[len lo, len hi, callback type, callback target,
/// payload...]` with `len = payload.len() + 2`.
#[derive(Debug, Default)]
pub struct Ev3Buffer {
    data: ByteArray,
    callback_type: u8,
    callback_target: u8,
}

impl Ev3Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header with the default global (4) and local (0) sizes
    pub fn header(self, callback_type: u8) -> Self {
        self.header_sized(callback_type, 0x04, 0x00)
    }

    /// Header `[cmd type, global lo, (local << 2 | global hi)]`
    ///
    /// A callback type other than `NONE` requests a reply.
    pub fn header_sized(mut self, callback_type: u8, global_size: u16, local_size: u8) -> Self {
        self.callback_type = callback_type;
        self.data.set_markers(EV3_MARKERS);

        let cmd_type = if callback_type != callback::NONE {
            command_type::DIRECT_REPLY
        } else {
            command_type::DIRECT_NO_REPLY
        };
        let global_hi = ((global_size >> 8) & 0x03) as u8;
        self.data
            .write_raw(cmd_type)
            .write_raw((global_size & 0xFF) as u8)
            .write_raw((local_size << 2) | global_hi);
        self
    }

    pub fn command(mut self, opcode: &[u8]) -> Self {
        self.data.write_raw_bytes(opcode);
        self
    }

    pub fn byte(mut self, value: u8) -> Self {
        self.data.write_byte(value);
        self
    }

    pub fn short(mut self, value: u16) -> Self {
        self.data.write_short(value);
        self
    }

    pub fn int(mut self, value: u32) -> Self {
        self.data.write_int(value);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        self.data.write_string(value);
        self
    }

    pub fn null_byte(self) -> Self {
        self.byte(0x00)
    }

    pub fn single_byte(self) -> Self {
        self.byte(0x01)
    }

    /// Layer byte and port; the port also becomes the callback target
    pub fn port(mut self, port: u8) -> Self {
        self.callback_target = port;
        self.null_byte().byte(port)
    }

    /// Layer byte and a motor bit mask
    pub fn ports(self, ports: u8) -> Self {
        self.null_byte().byte(ports)
    }

    /// Global variable index the reply lands in
    pub fn index(mut self) -> Self {
        self.data.write_raw(parameter::INDEX).write_raw(0x00);
        self
    }

    pub fn serialize(self) -> Frame {
        let payload = self.data.into_vec();
        let len = (payload.len() + 2) as u16;
        let mut bytes = Vec::with_capacity(payload.len() + 4);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.push(self.callback_type);
        bytes.push(self.callback_target);
        bytes.extend_from_slice(&payload);
        Frame::new(bytes)
    }
}
