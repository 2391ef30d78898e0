//! Frame de-framer for inbound byte streams
//!
//! Robots deliver bytes in arbitrary chunks. [`StreamReader`] keeps a
//! carry-over buffer and cuts it into frames using a per-family
//! [`FrameConfig`]: a header set, then either a footer or a length strategy,
//! a minimum size and an optional checksum.
//!
//! Rules:
//! - bytes before the first header are garbage and get dropped
//! - partial frames stay buffered until more data arrives
//! - a candidate under the minimum size is dropped
//! - on checksum failure the reader resyncs one byte forward only if another
//!   header is already buffered; otherwise it waits
//! - a declared length above the maximum frame size is corrupt and resyncs
//!   one byte forward right away

use tracing::trace;

/// Checksum validator over a complete candidate frame
pub type ChecksumFn = fn(&[u8]) -> bool;

/// Total frame length from the buffered prefix, `None` until known
pub type LengthFn = fn(&[u8]) -> Option<usize>;

/// Static framing description of one robot family
#[derive(Debug, Clone, Copy)]
pub struct FrameConfig {
    /// Valid frame headers; empty means frames start at the buffer start
    pub headers: &'static [&'static [u8]],
    /// Footer terminating a frame (excluded from the frame)
    pub footer: Option<&'static [u8]>,
    /// Frames shorter than this are dropped
    pub min_size: usize,
    pub checksum: Option<ChecksumFn>,
    /// Header+length mode; ignored when a footer is set
    pub length: Option<LengthFn>,
    /// Largest frame a length field may declare
    pub max_size: Option<usize>,
}

/// Reassembles frames from raw chunks
#[derive(Debug)]
pub struct StreamReader {
    config: FrameConfig,
    buffer: Vec<u8>,
}

impl StreamReader {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
        }
    }

    /// Append newly received bytes
    pub fn add_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes waiting in the carry-over buffer
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Add a chunk and drain every complete frame
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.add_chunk(chunk);
        std::iter::from_fn(|| self.try_extract_frame()).collect()
    }

    /// Extract the next complete, validated frame
    pub fn try_extract_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }

            let header_len = if self.config.headers.is_empty() {
                0
            } else {
                match self.find_header(0) {
                    Some((pos, len)) => {
                        if pos > 0 {
                            trace!("Dropping {} bytes before header", pos);
                            self.buffer.drain(..pos);
                        }
                        len
                    }
                    None => {
                        self.keep_partial_header();
                        return None;
                    }
                }
            };

            if self.declares_oversized() {
                trace!("Declared length over {:?}, resyncing", self.config.max_size);
                self.buffer.drain(..1);
                continue;
            }

            let (frame_len, consumed) = self.candidate_bounds(header_len)?;

            if frame_len < self.config.min_size {
                trace!(
                    "Dropping short frame ({} < {}): {:02X?}",
                    frame_len,
                    self.config.min_size,
                    &self.buffer[..frame_len]
                );
                self.buffer.drain(..consumed.max(1));
                continue;
            }

            if let Some(checksum) = self.config.checksum {
                if !checksum(&self.buffer[..frame_len]) {
                    if self.has_later_start(frame_len) {
                        trace!("Checksum mismatch, resyncing");
                        self.buffer.drain(..1);
                        continue;
                    }
                    trace!("Checksum mismatch, waiting for more data");
                    return None;
                }
            }

            let frame = self.buffer[..frame_len].to_vec();
            self.buffer.drain(..consumed);
            return Some(frame);
        }
    }

    /// `(frame length, bytes consumed)` of the candidate at buffer start
    fn candidate_bounds(&self, header_len: usize) -> Option<(usize, usize)> {
        if let Some(footer) = self.config.footer {
            let from = header_len.min(self.buffer.len());
            let pos = find_subslice(&self.buffer[from..], footer)?;
            let end = from + pos;
            return Some((end, end + footer.len()));
        }

        if let Some(length) = self.config.length {
            let total = length(&self.buffer)?;
            if total == 0 {
                return Some((0, 1));
            }
            if self.buffer.len() < total {
                return None;
            }
            return Some((total, total));
        }

        let len = self.buffer.len();
        Some((len, len))
    }

    fn declares_oversized(&self) -> bool {
        if self.config.footer.is_some() {
            return false;
        }
        match (self.config.length, self.config.max_size) {
            (Some(length), Some(max)) => length(&self.buffer).is_some_and(|total| total > max),
            _ => false,
        }
    }

    fn find_header(&self, from: usize) -> Option<(usize, usize)> {
        (from..self.buffer.len()).find_map(|pos| {
            self.config
                .headers
                .iter()
                .find(|h| self.buffer[pos..].starts_with(h))
                .map(|h| (pos, h.len()))
        })
    }

    /// Whether another frame start exists after the current one
    fn has_later_start(&self, frame_len: usize) -> bool {
        if self.config.headers.is_empty() {
            self.buffer.len() > frame_len
        } else {
            self.find_header(1).is_some()
        }
    }

    /// Keep only the longest suffix that could still grow into a header
    fn keep_partial_header(&mut self) {
        let keep = self
            .config
            .headers
            .iter()
            .flat_map(|h| (1..h.len()).rev().map(move |n| (h, n)))
            .filter(|(h, n)| *n <= self.buffer.len() && self.buffer.ends_with(&h[..*n]))
            .map(|(_, n)| n)
            .max()
            .unwrap_or(0);

        let drop = self.buffer.len() - keep;
        if drop > 0 {
            trace!("Dropping {} bytes without header", drop);
            self.buffer.drain(..drop);
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTER_CONFIG: FrameConfig = FrameConfig {
        headers: &[&[0xFF, 0x55]],
        footer: Some(&[0x0D, 0x0A]),
        min_size: 4,
        checksum: None,
        length: None,
        max_size: None,
    };

    fn le_length(buf: &[u8]) -> Option<usize> {
        (buf.len() >= 2).then(|| u16::from_le_bytes([buf[0], buf[1]]) as usize + 2)
    }

    const LENGTH_CONFIG: FrameConfig = FrameConfig {
        headers: &[],
        footer: None,
        min_size: 5,
        checksum: None,
        length: Some(le_length),
        max_size: Some(64),
    };

    #[test]
    fn test_footer_frame_excludes_footer() {
        let mut reader = StreamReader::new(FOOTER_CONFIG);
        let frames = reader.push(&[0xFF, 0x55, 0x01, 0x02, 0x03, 0x0D, 0x0A]);
        assert_eq!(frames, vec![vec![0xFF, 0x55, 0x01, 0x02, 0x03]]);
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn test_garbage_before_header_dropped() {
        let mut reader = StreamReader::new(FOOTER_CONFIG);
        let frames = reader.push(&[0x00, 0x13, 0xFF, 0x55, 0x10, 0x01, 0x0D, 0x0A]);
        assert_eq!(frames, vec![vec![0xFF, 0x55, 0x10, 0x01]]);
    }

    #[test]
    fn test_short_ack_dropped() {
        let mut reader = StreamReader::new(FOOTER_CONFIG);
        let frames = reader.push(&[0xFF, 0x55, 0x0D, 0x0A, 0xFF, 0x55, 0x20, 0x04, 0x0D, 0x0A]);
        assert_eq!(frames, vec![vec![0xFF, 0x55, 0x20, 0x04]]);
    }

    #[test]
    fn test_partial_header_kept() {
        let mut reader = StreamReader::new(FOOTER_CONFIG);
        assert!(reader.push(&[0x01, 0x02, 0xFF]).is_empty());
        assert_eq!(reader.buffered_len(), 1);
        let frames = reader.push(&[0x55, 0x10, 0x02, 0x0D, 0x0A]);
        assert_eq!(frames, vec![vec![0xFF, 0x55, 0x10, 0x02]]);
    }

    #[test]
    fn test_headerless_length_frames() {
        let mut reader = StreamReader::new(LENGTH_CONFIG);
        let frames = reader.push(&[0x03, 0x00, 0x21, 0x00, 0x02, 0x04, 0x00]);
        assert_eq!(frames, vec![vec![0x03, 0x00, 0x21, 0x00, 0x02]]);
        assert_eq!(reader.buffered_len(), 2);
    }

    #[test]
    fn test_oversized_length_skipped() {
        let mut reader = StreamReader::new(LENGTH_CONFIG);
        // 0xF0 declares 242 bytes; skipping ahead realigns on 03 00
        let frames = reader.push(&[0xF0, 0x00, 0x03, 0x00, 0x21, 0x00, 0x02]);
        assert_eq!(frames, vec![vec![0x03, 0x00, 0x21, 0x00, 0x02]]);
    }

    #[test]
    fn test_waits_for_complete_length() {
        let mut reader = StreamReader::new(LENGTH_CONFIG);
        assert!(reader.push(&[0x04, 0x00, 0x21]).is_empty());
        assert_eq!(reader.buffered_len(), 3);
        assert_eq!(reader.push(&[0x00, 0x02, 0x5A]).len(), 1);
    }
}
