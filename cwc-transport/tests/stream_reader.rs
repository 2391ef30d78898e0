//! De-framing behavior over chunked, noisy input

use cwc_transport::{FrameConfig, StreamReader};

fn sum_checksum(frame: &[u8]) -> bool {
    let Some((&last, body)) = frame.split_last() else {
        return false;
    };
    if body.len() < 2 {
        return false;
    }
    let sum = body[2..].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (sum ^ 0xFF) == last
}

fn sync_length(buf: &[u8]) -> Option<usize> {
    if buf.len() < 5 {
        return None;
    }
    if buf[1] == 0xFF {
        Some(buf[4] as usize + 5)
    } else {
        Some(u16::from_be_bytes([buf[3], buf[4]]) as usize + 5)
    }
}

const CHECKED: FrameConfig = FrameConfig {
    headers: &[&[0xFF, 0xFF], &[0xFF, 0xFE]],
    footer: None,
    min_size: 6,
    checksum: Some(sum_checksum),
    length: Some(sync_length),
    max_size: Some(128),
};

/// Ack carrying two data bytes: FF FF 00 01 03 AA BB chk
fn ack_frame() -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFF, 0x00, 0x01, 0x03, 0xAA, 0xBB];
    let sum = frame[2..].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    frame.push(sum ^ 0xFF);
    frame
}

#[test]
fn single_chunk_yields_frame_once() {
    let frame = ack_frame();
    let mut reader = StreamReader::new(CHECKED);
    reader.add_chunk(&frame);
    assert_eq!(reader.try_extract_frame(), Some(frame));
    assert_eq!(reader.try_extract_frame(), None);
}

#[test]
fn split_chunks_yield_identical_frame_once() {
    let frame = ack_frame();
    for split in 1..frame.len() {
        let mut reader = StreamReader::new(CHECKED);
        let mut frames = reader.push(&frame[..split]);
        frames.extend(reader.push(&frame[split..]));
        assert_eq!(frames, vec![frame.clone()], "split at {}", split);
        assert_eq!(reader.buffered_len(), 0);
    }
}

#[test]
fn corrupted_frame_followed_by_valid_frame() {
    let mut corrupted = ack_frame();
    corrupted[5] ^= 0x10;
    let valid = ack_frame();

    let mut reader = StreamReader::new(CHECKED);
    let mut stream = corrupted.clone();
    stream.extend_from_slice(&valid);
    assert_eq!(reader.push(&stream), vec![valid]);
    assert_eq!(reader.buffered_len(), 0);
}

#[test]
fn corrupted_frame_alone_stays_buffered() {
    let mut corrupted = ack_frame();
    corrupted[6] ^= 0x01;

    let mut reader = StreamReader::new(CHECKED);
    reader.add_chunk(&corrupted);
    for _ in 0..3 {
        assert_eq!(reader.try_extract_frame(), None);
        assert_eq!(reader.buffered_len(), corrupted.len());
    }

    // the valid frame arriving later still comes through
    let valid = ack_frame();
    assert_eq!(reader.push(&valid), vec![valid]);
}

#[test]
fn corrupted_length_does_not_swallow_later_frames() {
    let mut corrupted = ack_frame();
    corrupted[4] = 0xF0;

    let mut reader = StreamReader::new(CHECKED);
    assert!(reader.push(&corrupted).is_empty());
    let mut frames = Vec::new();
    for _ in 0..20 {
        frames.extend(reader.push(&ack_frame()));
    }
    assert_eq!(frames.len(), 20);
    assert!(frames.iter().all(|f| *f == ack_frame()));
    assert_eq!(reader.buffered_len(), 0);
}

#[test]
fn repeated_calls_without_data_are_idempotent() {
    let frame = ack_frame();
    let mut reader = StreamReader::new(CHECKED);
    reader.add_chunk(&[0x13, 0x37]);
    reader.add_chunk(&frame[..4]);

    assert_eq!(reader.try_extract_frame(), None);
    let buffered = reader.buffered_len();
    assert_eq!(buffered, 4);
    for _ in 0..5 {
        assert_eq!(reader.try_extract_frame(), None);
        assert_eq!(reader.buffered_len(), buffered);
    }
}

#[test]
fn async_header_uses_two_byte_length() {
    // FF FE id=07 len=00 03 data 01 02 chk
    let mut frame = vec![0xFF, 0xFE, 0x07, 0x00, 0x03, 0x01, 0x02];
    let sum = frame[2..].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    frame.push(sum ^ 0xFF);

    let mut reader = StreamReader::new(CHECKED);
    assert_eq!(reader.push(&frame), vec![frame]);
}
