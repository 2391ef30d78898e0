//! Makeblock (Orion / Auriga firmware) request packets

use crate::buffer::{ByteArray, Frame};
use crate::error::EncodingError;

pub const HEADER: &[u8] = &[0xFF, 0x55];
pub const FOOTER: &[u8] = &[0x0D, 0x0A];

/// Largest payload the single length byte can describe
pub const MAX_PAYLOAD: usize = 255;

/// Request actions
pub mod action {
    pub const GET: u8 = 0x01;
    pub const RUN: u8 = 0x02;
    pub const RESET: u8 = 0x04;
    pub const START: u8 = 0x05;
}

/// Builder of one request: `[FF 55 len index action device ...]`
#[derive(Debug, Default)]
pub struct MakeblockBuffer {
    data: ByteArray,
}

impl MakeblockBuffer {
    /// Start a request with its reply index and action
    pub fn new(index: u8, action: u8) -> Self {
        let mut data = ByteArray::new();
        data.write_byte(index).write_byte(action);
        Self { data }
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

    pub fn serialize(self) -> Result<Frame, EncodingError> {
        let payload = self.data.into_vec();
        if payload.len() > MAX_PAYLOAD {
            return Err(EncodingError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let mut bytes = Vec::with_capacity(payload.len() + 3);
        bytes.extend_from_slice(HEADER);
        bytes.push(payload.len() as u8);
        bytes.extend_from_slice(&payload);
        Ok(Frame::new(bytes))
    }
}
