//! mBot (mCore board)

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
    pub const ULTRASONIC: u8 = 1;
    pub const LIGHTSENSOR: u8 = 3;
    pub const LEDLIGHT: u8 = 8;
    pub const DCMOTOR: u8 = 10;
    pub const LINEFOLLOWER: u8 = 17;
    pub const BUZZER: u8 = 0x22;
}

pub mod port {
    pub const LINEFOLLOWER: u8 = 2;
    pub const ULTRASONIC: u8 = 3;
    pub const LIGHTSENSOR: u8 = 6;
    pub const LED_LIGHT: u8 = 7;
    pub const LEFT_MOTOR: u8 = 0x09;
    pub const RIGHT_MOTOR: u8 = 0x0A;
}

/// On-board LED slot
pub const LED_SLOT: u8 = 2;

pub mod index {
    pub const NONE: u8 = 0x00;
    pub const ULTRASONIC: u8 = 0x10;
    pub const LINEFOLLOWER: u8 = 0x11;
    pub const LIGHTSENSOR: u8 = 0x12;
    pub const INNER_BUTTON: u8 = 0x13;
    pub const VERSION: u8 = 0x20;
}

pub const INDICES: ReplyIndices = ReplyIndices {
    ultrasonic: index::ULTRASONIC,
    line_follower: index::LINEFOLLOWER,
    light: index::LIGHTSENSOR,
    light2: None,
    temperature: None,
    inner_button: Some(index::INNER_BUTTON),
    version: index::VERSION,
};

pub const SENSORS: [SensorSpec; 3] = [
    SensorSpec {
        index: index::LIGHTSENSOR,
        kind: SensorKind::Light,
        device: device::LIGHTSENSOR,
        port: port::LIGHTSENSOR,
        interval: Duration::from_millis(1500),
    },
    SensorSpec {
        index: index::LINEFOLLOWER,
        kind: SensorKind::LineFollower,
        device: device::LINEFOLLOWER,
        port: port::LINEFOLLOWER,
        interval: Duration::from_millis(200),
    },
    SensorSpec {
        index: index::ULTRASONIC,
        kind: SensorKind::Ultrasonic,
        device: device::ULTRASONIC,
        port: port::ULTRASONIC,
        interval: Duration::from_millis(200),
    },
];

type Result<T> = std::result::Result<T, EncodingError>;

pub fn set_rgb_led(red: u8, green: u8, blue: u8, led: u8) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::LEDLIGHT)
        .byte(port::LED_LIGHT)
        .byte(LED_SLOT)
        .byte(led)
        .byte(red)
        .byte(green)
        .byte(blue)
        .serialize()
}

pub fn play_tone(frequency: u16, duration: u16) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::BUZZER)
        .short(frequency)
        .short(duration)
        .serialize()
}

pub fn motor_power(motor_port: u8, power: u16) -> Result<Frame> {
    MakeblockBuffer::new(index::NONE, action::RUN)
        .byte(device::DCMOTOR)
        .byte(motor_port)
        .short(power)
        .serialize()
}

pub fn get_version() -> Result<Frame> {
    MakeblockBuffer::new(index::VERSION, action::GET)
        .byte(device::VERSION)
        .serialize()
}

fn power(p: &Params) -> Result<i64> {
    p.i64_or("power", 0)
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

/// Both motors face opposite ways, so driving straight negates the left one
fn move_power(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    let power = power(p)?;
    match p.i64("slot")? {
        Some(slot) => Ok(vec![motor_power(
            params::byte("slot", slot)?,
            params::short("power", power)?,
        )?]),
        None => Ok(vec![
            motor_power(port::LEFT_MOTOR, params::short("power", -power)?)?,
            motor_power(port::RIGHT_MOTOR, params::short("power", power)?)?,
        ]),
    }
}

fn rotate_power(_: &mut (), p: &Params) -> Result<Vec<Frame>> {
    let power = params::short("power", power(p)?)?;
    match p.i64("slot")? {
        Some(slot) => Ok(vec![motor_power(params::byte("slot", slot)?, power)?]),
        None => Ok(vec![
            motor_power(port::LEFT_MOTOR, power)?,
            motor_power(port::RIGHT_MOTOR, power)?,
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
        motor_power(port::LEFT_MOTOR, 0)?,
        motor_power(port::RIGHT_MOTOR, 0)?,
        super::reset()?,
    ])
}

pub static COMMANDS: CommandTable<()> = CommandTable {
    family: "mbot",
    entries: &[
        ("setRGBLED", cmd_set_rgb_led),
        ("playTone", cmd_play_tone),
        ("movePower", move_power),
        ("rotatePower", rotate_power),
        ("getVersion", cmd_get_version),
        ("getSensorData", get_sensor_data),
        ("reset", reset),
        ("start", start),
        ("stop", stop),
    ],
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MBotProtocol;

impl RobotProtocol for MBotProtocol {
    type State = ();
    type Decoder = MakeblockDecoder;

    fn family(&self) -> Family {
        Family::MBot
    }

    fn commands(&self) -> &'static CommandTable<()> {
        &COMMANDS
    }

    fn framing(&self) -> FrameConfig {
        decoder::FRAMING
    }

    fn auto_connect_name(&self) -> &'static str {
        "Makeblock"
    }

    fn transport(&self) -> TransportType {
        TransportType::Serial
    }

    /// Two start-up beeps, LED off, then the firmware version
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_frame() {
        let frame = set_rgb_led(0x10, 0x20, 0x30, 0).unwrap();
        assert_eq!(frame.to_hex(), "FF 55 09 00 02 08 07 02 00 10 20 30");
    }

    #[test]
    fn test_move_power_negates_left() {
        let frames = COMMANDS
            .encode(&mut (), "movePower", &Params::new().with("power", 100))
            .unwrap();
        assert_eq!(frames[0].to_hex(), "FF 55 06 00 02 0A 09 9C FF");
        assert_eq!(frames[1].to_hex(), "FF 55 06 00 02 0A 0A 64 00");
    }

    #[test]
    fn test_single_slot() {
        let frames = COMMANDS
            .encode(
                &mut (),
                "movePower",
                &Params::new().with("power", 50).with("slot", port::RIGHT_MOTOR),
            )
            .unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_plan_cadences() {
        let protocol = MBotProtocol;
        let plan = protocol.monitor_plan(&protocol.initial_topology());
        let cadences: Vec<_> = plan
            .iter()
            .map(|e| (e.kind, e.interval.as_millis()))
            .collect();
        assert_eq!(
            cadences,
            vec![
                (SensorKind::Ultrasonic, 200),
                (SensorKind::LineFollower, 200),
                (SensorKind::Light, 1500),
            ]
        );
        // ultrasonic read: index, GET, device, port
        assert_eq!(plan[0].frame.to_hex(), "FF 55 04 10 01 01 03");
    }

    #[test]
    fn test_prepare() {
        let frames = MBotProtocol.prepare(&mut ()).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3].bytes()[3], index::VERSION);
    }
}
