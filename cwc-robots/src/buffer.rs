//! Field-level byte encoder and the immutable frame type
//!
//! Every family builds its payload through [`ByteArray`]: bytes, little-endian
//! shorts and ints, big-endian uint16 and NUL-terminated strings. A family
//! may register prefix markers so each field of a type is preceded by a tag
//! byte (EV3 parameter encoding).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Per-type prefix bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Markers {
    pub byte: Option<u8>,
    pub short: Option<u8>,
    pub int: Option<u8>,
    pub string: Option<u8>,
}

/// Ordered field writer
#[derive(Debug, Clone, Default)]
pub struct ByteArray {
    data: Vec<u8>,
    markers: Markers,
}

impl ByteArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers(markers: Markers) -> Self {
        Self {
            data: Vec::new(),
            markers,
        }
    }

    pub fn set_markers(&mut self, markers: Markers) {
        self.markers = markers;
    }

    fn marker(&mut self, marker: Option<u8>) {
        if let Some(m) = marker {
            self.data.push(m);
        }
    }

    /// Append one byte, bypassing markers
    pub fn write_raw(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn write_raw_bytes(&mut self, values: &[u8]) -> &mut Self {
        self.data.extend_from_slice(values);
        self
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.marker(self.markers.byte);
        self.data.push(value);
        self
    }

    /// 2 bytes, little-endian
    pub fn write_short(&mut self, value: u16) -> &mut Self {
        self.marker(self.markers.short);
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// 4 bytes, little-endian
    pub fn write_int(&mut self, value: u32) -> &mut Self {
        self.marker(self.markers.int);
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// 2 bytes, big-endian, never marked
    pub fn write_uint16(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// String bytes followed by a NUL terminator
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.marker(self.markers.string);
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0x00);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// A serialized, immutable frame ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Arc<[u8]>,
    delay_after: Option<Duration>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            delay_after: None,
        }
    }

    /// Hold the outbound queue for `delay` after this frame is written
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_after = Some(delay);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn delay_after(&self) -> Option<Duration> {
        self.delay_after
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_encodings() {
        let mut buf = ByteArray::new();
        buf.write_byte(0xAB)
            .write_short(0x1234)
            .write_int(0xDEADBEEF)
            .write_uint16(0x1234)
            .write_string("hi");
        assert_eq!(
            buf.as_slice(),
            &[0xAB, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE, 0x12, 0x34, b'h', b'i', 0x00]
        );
    }

    #[test]
    fn test_values_survive_decoding() {
        for value in [0u16, 1, 0x7FFF, 0x8000, 0xFFFF] {
            let mut buf = ByteArray::new();
            buf.write_short(value).write_uint16(value);
            let bytes = buf.as_slice();
            assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), value);
            assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), value);
        }
        for value in [0u32, 50, u32::MAX, 0x8000_0000] {
            let mut buf = ByteArray::new();
            buf.write_int(value);
            let b = buf.as_slice();
            assert_eq!(u32::from_le_bytes([b[0], b[1], b[2], b[3]]), value);
        }
    }

    #[test]
    fn test_markers_prefix_fields() {
        let mut buf = ByteArray::with_markers(Markers {
            byte: Some(0x81),
            short: Some(0x82),
            int: Some(0x83),
            string: Some(0x84),
        });
        buf.write_byte(1).write_short(2).write_int(3).write_string("");
        buf.write_raw(0xE1).write_uint16(0x0102);
        assert_eq!(
            buf.as_slice(),
            &[0x81, 1, 0x82, 2, 0, 0x83, 3, 0, 0, 0, 0x84, 0x00, 0xE1, 0x01, 0x02]
        );
    }

    #[test]
    fn test_frame_hex() {
        let frame = Frame::new(vec![0xFF, 0x55, 0x00]);
        assert_eq!(frame.to_hex(), "FF 55 00");
        assert_eq!(frame.delay_after(), None);
        let delayed = frame.with_delay(Duration::from_millis(500));
        assert_eq!(delayed.delay_after(), Some(Duration::from_millis(500)));
    }
}
