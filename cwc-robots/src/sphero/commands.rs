//! Sphero command encoders and handler table

use std::time::Duration;

use super::buffer::SpheroBuffer;
use super::constants::{callback, command};
use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::handler::CommandTable;
use crate::params::{self, Params};

/// Last roll values and the calibration flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpheroState {
    pub heading: u16,
    pub speed: u8,
    pub calibrating: bool,
}

impl Default for SpheroState {
    fn default() -> Self {
        Self {
            heading: 0,
            speed: 20,
            calibrating: false,
        }
    }
}

type Result<T> = std::result::Result<T, EncodingError>;

const ROLL_TICK: Duration = Duration::from_millis(500);
const ROLL_STOP_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Encoders
// =============================================================================

pub fn set_rgb(red: u8, green: u8, blue: u8, persistent: bool) -> Frame {
    SpheroBuffer::new(command::RGB_LED_SET)
        .byte(red)
        .byte(green)
        .byte(blue)
        .byte(u8::from(persistent))
        .serialize()
}

pub fn get_rgb() -> Frame {
    SpheroBuffer::new(command::RGB_LED_GET)
        .callback(callback::RGB)
        .serialize()
}

pub fn set_back_led(brightness: u8) -> Frame {
    SpheroBuffer::new(command::BACK_LED).byte(brightness).serialize()
}

pub fn set_heading(heading: u16) -> Frame {
    SpheroBuffer::new(command::HEADING).uint16(heading).serialize()
}

pub fn roll(speed: u8, heading: u16, state: bool) -> Frame {
    SpheroBuffer::new(command::ROLL)
        .byte(speed)
        .uint16(heading)
        .byte(u8::from(state))
        .serialize()
}

pub fn boost(enable: bool) -> Frame {
    SpheroBuffer::new(command::BOOST)
        .byte(u8::from(enable))
        .serialize()
}

/// Collision detection settings; `method` 0 disables the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionSettings {
    pub method: u8,
    pub threshold_x: u8,
    pub threshold_y: u8,
    pub speed_x: u8,
    pub speed_y: u8,
    /// Dead time after a collision, in 10 ms units
    pub interval: u8,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            method: 0x01,
            threshold_x: 0x60,
            threshold_y: 0x60,
            speed_x: 0x60,
            speed_y: 0x60,
            interval: 0x0A,
        }
    }
}

pub fn collision_detection(settings: &CollisionSettings) -> Frame {
    SpheroBuffer::new(command::COLLISION_DETECTION)
        .byte(settings.method)
        .byte(settings.threshold_x)
        .byte(settings.threshold_y)
        .byte(settings.speed_x)
        .byte(settings.speed_y)
        .byte(settings.interval)
        .serialize()
}

pub fn get_location() -> Frame {
    SpheroBuffer::new(command::LOCATION_GET)
        .callback(callback::LOCATION)
        .serialize()
}

pub fn get_version() -> Frame {
    SpheroBuffer::new(command::VERSION)
        .callback(callback::VERSION)
        .serialize()
}

// =============================================================================
// Handler table
// =============================================================================

/// Back LED brightness as the JS API accepts it; full 255 stays reserved
/// for calibration
fn brightness(p: &Params) -> Result<u8> {
    params::byte("brightness", p.clamped_or("brightness", 0, 0, 254)?)
}

fn heading_or(p: &Params, default: u16) -> Result<u16> {
    p.short_or("heading", default.into())
}

fn cmd_set_rgb(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![set_rgb(
        p.byte_or("red", 0)?,
        p.byte_or("green", 0)?,
        p.byte_or("blue", 0)?,
        p.bool_or("persistent", false)?,
    )])
}

fn cmd_get_rgb(_: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![get_rgb()])
}

fn cmd_set_back_led(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![set_back_led(brightness(p)?)])
}

fn cmd_set_heading(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![set_heading(heading_or(p, 0)?)])
}

fn cmd_roll(state: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    state.speed = p.byte_or("speed", state.speed.into())?;
    state.heading = heading_or(p, state.heading)?;
    Ok(vec![roll(
        state.speed,
        state.heading,
        p.bool_or("state", true)?,
    )])
}

fn roll_stop(state: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![roll(0, state.heading, false)])
}

/// Repeated roll frames spaced by the writer, one per 500 ms
fn roll_time(state: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    let time = p.f64_or("time", 0.0)?.max(0.0);
    state.speed = p.byte_or("speed", 20)?;
    state.heading = heading_or(p, state.heading)?;

    let ticks = (time * 2.0).floor() as usize;
    let mut frames: Vec<Frame> = (0..ticks)
        .map(|_| roll(state.speed, state.heading, true).with_delay(ROLL_TICK))
        .collect();
    if p.bool_or("stop", false)? {
        frames.push(roll(0, state.heading, true).with_delay(ROLL_STOP_DELAY));
    }
    Ok(frames)
}

fn cmd_boost(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![boost(p.bool_or("enable", false)?)])
}

fn set_collision_detection(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    let defaults = CollisionSettings::default();
    let settings = CollisionSettings {
        method: p.byte_or("method", defaults.method.into())?,
        threshold_x: p.byte_or("thresholdX", defaults.threshold_x.into())?,
        threshold_y: p.byte_or("thresholdY", defaults.threshold_y.into())?,
        speed_x: p.byte_or("speedX", defaults.speed_x.into())?,
        speed_y: p.byte_or("speedY", defaults.speed_y.into())?,
        interval: p.byte_or("interval", defaults.interval.into())?,
    };
    Ok(vec![collision_detection(&settings)])
}

fn set_motion_timeout(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    let frame = SpheroBuffer::new(command::MOTION_TIMEOUT)
        .byte(p.byte_or("timeout", 0)?)
        .serialize();
    Ok(vec![frame])
}

fn sleep(_: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    let frame = SpheroBuffer::new(command::SLEEP)
        .byte(p.byte_or("wakeup", 0)?)
        .byte(p.byte_or("macro", 0)?)
        .byte(p.byte_or("orbBasic", 0)?)
        .serialize();
    Ok(vec![frame])
}

fn cmd_get_location(_: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![get_location()])
}

fn cmd_get_version(_: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![get_version()])
}

fn ping(_: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![SpheroBuffer::new(command::PING).serialize()])
}

/// Dims the main LED and lights the tail light while the user aims
fn calibrate(state: &mut SpheroState, p: &Params) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    if !state.calibrating {
        frames.push(set_rgb(0, 0, 0, false));
        frames.push(set_back_led(255));
        state.calibrating = true;
    }
    state.speed = 0;
    state.heading = heading_or(p, state.heading)?;
    frames.push(roll(0, state.heading, true));
    Ok(frames)
}

/// Stores the current direction as the new zero heading
fn set_calibration(state: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    state.calibrating = false;
    state.heading = 0;
    Ok(vec![set_back_led(0), set_heading(0)])
}

fn stop(state: &mut SpheroState, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![
        set_rgb(0, 0, 0, true),
        set_back_led(0),
        boost(false),
        roll(0, state.heading, false),
    ])
}

pub static COMMANDS: CommandTable<SpheroState> = CommandTable {
    family: "sphero",
    entries: &[
        ("setRGB", cmd_set_rgb),
        ("getRGB", cmd_get_rgb),
        ("setBackLed", cmd_set_back_led),
        ("setHeading", cmd_set_heading),
        ("roll", cmd_roll),
        ("rollStop", roll_stop),
        ("rollTime", roll_time),
        ("boost", cmd_boost),
        ("setCollisionDetection", set_collision_detection),
        ("setMotionTimeout", set_motion_timeout),
        ("sleep", sleep),
        ("getLocation", cmd_get_location),
        ("getVersion", cmd_get_version),
        ("ping", ping),
        ("calibrate", calibrate),
        ("setCalibration", set_calibration),
        ("stop", stop),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(state: &mut SpheroState, name: &str, params: Params) -> Vec<Frame> {
        COMMANDS.encode(state, name, &params).unwrap()
    }

    #[test]
    fn test_reference_frames() {
        let mut state = SpheroState::default();
        let rgb = encode(
            &mut state,
            "setRGB",
            Params::new()
                .with("red", 255)
                .with("persistent", true),
        );
        assert_eq!(rgb[0].to_hex(), "FF FE 02 20 00 05 FF 00 00 01 D8");

        let roll = encode(
            &mut state,
            "roll",
            Params::new().with("speed", 0).with("heading", 0).with("state", 1),
        );
        assert_eq!(roll[0].to_hex(), "FF FE 02 30 00 05 00 00 00 01 C7");
    }

    #[test]
    fn test_roll_remembers_speed_and_heading() {
        let mut state = SpheroState::default();
        encode(&mut state, "roll", Params::new().with("heading", 90));
        assert_eq!(state.speed, 20);
        assert_eq!(state.heading, 90);

        let frames = encode(&mut state, "rollStop", Params::new());
        assert_eq!(&frames[0].bytes()[6..10], &[0x00, 0x00, 0x5A, 0x00]);
    }

    #[test]
    fn test_roll_time_ticks() {
        let mut state = SpheroState::default();
        let frames = encode(
            &mut state,
            "rollTime",
            Params::new().with("time", 1.7).with("stop", true),
        );
        assert_eq!(frames.len(), 4);
        assert!(frames[..3]
            .iter()
            .all(|f| f.delay_after() == Some(Duration::from_millis(500))));
        assert_eq!(frames[3].delay_after(), Some(Duration::from_millis(100)));
        assert_eq!(frames[3].bytes()[6], 0x00);
    }

    #[test]
    fn test_calibration_cycle() {
        let mut state = SpheroState::default();
        let first = encode(&mut state, "calibrate", Params::new().with("heading", 45));
        assert_eq!(first.len(), 3);
        assert!(state.calibrating);

        let again = encode(&mut state, "calibrate", Params::new().with("heading", 50));
        assert_eq!(again.len(), 1);

        let done = encode(&mut state, "setCalibration", Params::new());
        assert_eq!(done.len(), 2);
        assert!(!state.calibrating);
        assert_eq!(state.heading, 0);
    }

    #[test]
    fn test_stop_sequence() {
        let mut state = SpheroState::default();
        let frames = encode(&mut state, "stop", Params::new());
        let commands: Vec<_> = frames.iter().map(|f| [f.bytes()[2], f.bytes()[3]]).collect();
        assert_eq!(
            commands,
            vec![
                command::RGB_LED_SET,
                command::BACK_LED,
                command::BOOST,
                command::ROLL
            ]
        );
        // persistent flag set on the LED reset
        assert_eq!(frames[0].bytes()[9], 0x01);
    }

    #[test]
    fn test_back_led_clamped() {
        let mut state = SpheroState::default();
        let frames = encode(&mut state, "setBackLed", Params::new().with("brightness", 400));
        assert_eq!(frames[0].bytes()[6], 0xFE);

        let frames = encode(&mut state, "setBackLed", Params::new().with("brightness", 255));
        assert_eq!(frames[0].to_hex(), "FF FE 02 21 00 02 FE DC");

        // calibration still lights the tail LED fully
        let frames = encode(&mut state, "calibrate", Params::new());
        let back_led = frames
            .iter()
            .find(|f| f.bytes()[2..4] == command::BACK_LED)
            .unwrap();
        assert_eq!(back_led.bytes()[6], 0xFF);
    }
}
