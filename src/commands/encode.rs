//! Offline frame encoding.

use cwc_robots::{Family, Frame};

use super::CommandResult;
use cwc_driver::args::parse_params;

pub fn format_frame(index: usize, frame: &Frame) -> String {
    match frame.delay_after() {
        Some(delay) => format!("[{index}] {}  (+{} ms)", frame.to_hex(), delay.as_millis()),
        None => format!("[{index}] {}", frame.to_hex()),
    }
}

/// Print every frame `command` encodes to, with any post-send delay
pub fn encode(robot: Family, command: &str, params: &[String]) -> CommandResult {
    let params = parse_params(params)?;
    let frames = robot.encode(command, &params)?;
    println!("{robot} {command}: {} frame(s)", frames.len());
    for (i, frame) in frames.iter().enumerate() {
        println!("  {}", format_frame(i, frame));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_frame_with_delay() {
        let frame = Frame::new(vec![0xFF, 0x55, 0x00]).with_delay(Duration::from_millis(500));
        assert_eq!(format_frame(2, &frame), "[2] FF 55 00  (+500 ms)");
    }
}
