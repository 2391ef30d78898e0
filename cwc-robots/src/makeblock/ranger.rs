//! mBot Ranger (Auriga board)
//!
//! Drive motors sit behind the encoder board and are addressed by slot.

use std::time::Duration;

use cwc_transport::{FrameConfig, TransportType};

use super::buffer::{action, MakeblockBuffer};
use super::decoder::{self, MakeblockDecoder, ReplyIndices};
use super::SensorSpec;
use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::events::RobotEvent;
use crate::handler::CommandTable;
use crate::monitoring::MonitorEntry;
use crate::params::{self, Params};
use crate::protocol::{Family, RobotProtocol};
use crate::topology::{SensorKind, Topology};

pub mod device {
    pub const VERSION: u8 = 0;
    pub const ULTRASONIC: u8 = 0x01;
    pub const LIGHTSENSOR: u8 = 0x03;
    pub const RGBLED: u8 = 8;
    pub const LINEFOLLOWER: u8 = 17;
    pub const TEMPERATURE: u8 = 0x1B;
    pub const TONE: u8 = 34;
    pub const ENCODER_BOARD: u8 = 62;
}

pub mod port {
    pub const AUTO: u8 = 0x00;
    pub const ENCODER_BOARD_POS: u8 = 0x01;
    pub const ENCODER_BOARD_SPEED: u8 = 0x02;
    pub const LINEFOLLOWER: u8 = 0x09;
    pub const ULTRASONIC: u8 = 0x0A;
    pub const LIGHTSENSOR_1: u8 = 0x0C;
    pub const LIGHTSENSOR_2: u8 = 0x0D;
    pub const TEMPERATURE: u8 = 0x0D;
    pub const TONE: u8 = 0x2D;
}

pub mod slot {
    pub const AUTO: u8 = 0;
    pub const ONE: u8 = 1;
    pub const TWO: u8 = 2;
}

pub mod index {
    pub const NONE: u8 = 0x00;
    pub const ULTRASONIC: u8 = 0x10;
    pub const LINEFOLLOWER: u8 = 0x11;
    pub const VERSION: u8 = 0x20;
    pub const TEMPERATURE: u8 = 0x21;
    pub const LIGHTSENSOR_1: u8 = 0x2A;
    pub const LIGHTSENSOR_2: u8 = 0x2B;
}

/// Encoder motor power limit
pub const MAX_POWER: i64 = 130;

pub const INDICES: ReplyIndices = ReplyIndices {
    ultrasonic: index::ULTRASONIC,
    line_follower: index::LINEFOLLOWER,
    light: index::LIGHTSENSOR_1,
    light2: Some(index::LIGHTSENSOR_2),
    temperature: Some(index::TEMPERATURE),
    inner_button: None,
    version: index::VERSION,
};

pub const SENSORS: [SensorSpec; 5] = [
    SensorSpec {
        index: index::LIGHTSENSOR_1,
        kind: SensorKind::Light,
        device: device::LIGHTSENSOR,
        port: port::LIGHTSENSOR_1,
        interval: Duration::from_millis(1500),
    },
    SensorSpec {
        index: index::LIGHTSENSOR_2,
        kind: SensorKind::Light2,
        device: device::LIGHTSENSOR,
        port: port::LIGHTSENSOR_2,
        interval: Duration::from_millis(1750),
    },
    SensorSpec {
        index: index::LINEFOLLOWER,
        kind: SensorKind::LineFollower,
        device: device::LINEFOLLOWER,
        port: port::LINEFOLLOWER,
        interval: Duration::from_millis(250),
    },
    SensorSpec {
        index: index::TEMPERATURE,
        kind: SensorKind::Temperature,
        device: device::TEMPERATURE,
        port: port::TEMPERATURE,
        interval: Duration::from_millis(1500),
    },
    SensorSpec {
        index: index::ULTRASONIC,
        kind: SensorKind::Ultrasonic,
        device: device::ULTRASONIC,
        port: port::ULTRASONIC,
        interval: Duration::from_millis(250),
    },
];

type Result<T> = std::result::Result<T, EncodingError>;

pub fn set_rgb_led(red: u8, green: u8, blue: u8, led: u8) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::RGBLED)
        .byte(port::AUTO)
        .byte(slot::AUTO)
        .byte(led)
        .byte(red)
        .byte(green)
        .byte(blue)
        .serialize()
}

pub fn play_tone(frequency: u16, duration: u16) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::TONE)
        .byte(port::TONE)
        .short(frequency)
        .short(duration)
        .serialize()
}

pub fn move_power(power: i16, motor_slot: u8) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::ENCODER_BOARD)
        .byte(port::ENCODER_BOARD_SPEED)
        .byte(motor_slot)
        .short(power as u16)
        .serialize()
}

pub fn move_steps(steps: i32, power: i16, motor_slot: u8) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::ENCODER_BOARD)
        .byte(port::ENCODER_BOARD_POS)
        .byte(motor_slot)
        .int(steps as u32)
        .short(power as u16)
        .serialize()
}

pub fn get_version() -> Result<Frame> {
    MakeblockBuffer::new(index::VERSION, action::GET)
        .byte(device::VERSION)
        .serialize()
}

fn power_or(p: &Params, default: i64) -> Result<i16> {
    // clamped into ±130, so the cast cannot truncate
    Ok(p.clamped_or("power", default, -MAX_POWER, MAX_POWER)? as i16)
}

fn slot_param(p: &Params) -> Result<Option<u8>> {
    p.i64("slot")?.map(|s| params::byte("slot", s)).transpose()
}

fn cmd_set_rgb_led(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![set_rgb_led(
        p.byte_or("red", 0)?,
        p.byte_or("green", 0)?,
        p.byte_or("blue", 0)?,
        p.byte_or("index", 0)?,
    )?])
}

fn cmd_play_tone(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    Ok(vec![play_tone(
        p.short_or("frequency", 0)?,
        p.short_or("duration", 0)?,
    )?])
}

/// Slot one is mounted mirrored, so driving straight negates it
fn cmd_move_power(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    let power = power_or(p, 0)?;
    match slot_param(p)? {
        Some(s) => Ok(vec![move_power(power, s)?]),
        None => Ok(vec![
            move_power(-power, slot::ONE)?,
            move_power(power, slot::TWO)?,
        ]),
    }
}

fn cmd_rotate_power(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    let power = power_or(p, 0)?;
    match slot_param(p)? {
        Some(s) => Ok(vec![move_power(power, s)?]),
        None => Ok(vec![
            move_power(power, slot::ONE)?,
            move_power(power, slot::TWO)?,
        ]),
    }
}

fn cmd_move_steps(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    let steps = p.require_i64("steps")?;
    // params::int accepts the full u32 range; steps must fit an i32
    let steps = i32::try_from(steps).map_err(|_| EncodingError::OutOfRange {
        name: "steps",
        value: steps,
        min: i64::from(i32::MIN),
        max: i64::from(i32::MAX),
    })?;
    let power = power_or(p, MAX_POWER)?;
    match slot_param(p)? {
        Some(s) => Ok(vec![move_steps(steps, power, s)?]),
        None => Ok(vec![
            move_steps(steps.saturating_neg(), power, slot::ONE)?,
            move_steps(steps, power, slot::TWO)?,
        ]),
    }
}

fn cmd_get_version(_: &mut (), _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![get_version()?])
}

fn get_sensor_data(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    super::cmd_get_sensor_data(p)
}

fn reset(_: &mut (), _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![super::reset()?])
}

fn start(_: &mut (), _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![super::start()?])
}

fn stop(_: &mut (), _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![
        set_rgb_led(0, 0, 0, 0)?,
        move_power(0, slot::ONE)?,
        move_power(0, slot::TWO)?,
        super::reset()?,
    ])
}

pub static COMMANDS: CommandTable<()> = CommandTable {
    family: "mbot-ranger",
    entries: &[
        ("setRGBLED", cmd_set_rgb_led),
        ("playTone", cmd_play_tone),
        ("movePower", cmd_move_power),
        ("rotatePower", cmd_rotate_power),
        ("moveSteps", cmd_move_steps),
        ("getVersion", cmd_get_version),
        ("getSensorData", get_sensor_data),
        ("reset", reset),
        ("start", start),
        ("stop", stop),
    ],
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RangerProtocol;

impl RobotProtocol for RangerProtocol {
    type State = ();
    type Decoder = MakeblockDecoder;

    fn family(&self) -> Family {
        Family::MBotRanger
    }

    fn commands(&self) -> &'static CommandTable<()> {
        &COMMANDS
    }

    fn framing(&self) -> FrameConfig {
        decoder::FRAMING
    }

    fn auto_connect_name(&self) -> &'static str {
        "Ranger"
    }

    fn transport(&self) -> TransportType {
        TransportType::Serial
    }

    fn prepare(&self, _state: &mut ()) -> Result<Vec<Frame>> {
        Ok(vec![
            play_tone(524, 240)?,
            play_tone(584, 240)?,
            set_rgb_led(0, 0, 0, 0)?,
            get_version()?,
        ])
    }

    fn initial_topology(&self) -> Topology {
        super::sensor_topology(&SENSORS)
    }

    fn monitor_plan(&self, topology: &Topology) -> Vec<MonitorEntry> {
        super::sensor_plan(&SENSORS, topology)
    }

    fn decode(&self, decoder: &mut MakeblockDecoder, _topology: &Topology, frame: &[u8]) -> Vec<RobotEvent> {
        decoder::decode(decoder, &INDICES, frame)
    }
}
