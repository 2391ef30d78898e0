//! EV3 command encoders and handler table

use super::buffer::Ev3Buffer;
use super::constants::{callback, input_port, op, output_port, IMAGE_ROOT, SCREEN_MAX_X, SCREEN_MAX_Y};
use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::handler::CommandTable;
use crate::params::{self, Params};

/// Motor assignment used by the drive commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ev3State {
    pub motor_left: u8,
    pub motor_right: u8,
    pub medium_motor: u8,
}

impl Default for Ev3State {
    fn default() -> Self {
        Self {
            motor_left: output_port::B,
            motor_right: output_port::C,
            medium_motor: output_port::A,
        }
    }
}

type Result<T> = std::result::Result<T, EncodingError>;

// =============================================================================
// Encoders
// =============================================================================

pub fn battery() -> Frame {
    Ev3Buffer::new()
        .header(callback::BATTERY)
        .command(op::UI_READ_BATTERY)
        .index()
        .serialize()
}

pub fn firmware() -> Frame {
    Ev3Buffer::new()
        .header_sized(callback::FIRMWARE, 0x10, 0)
        .command(op::UI_READ_FIRMWARE)
        .byte(0x10)
        .index()
        .serialize()
}

pub fn device_type(port: u8) -> Frame {
    Ev3Buffer::new()
        .header_sized(callback::DEVICE_NAME, 0x7F, 0)
        .command(op::INPUT_GET_DEVICE_NAME)
        .port(port)
        .byte(0x7F)
        .index()
        .serialize()
}

/// Read a port value; the opcode decides the unit (raw, percent, SI)
pub fn read_port(callback_type: u8, opcode: &[u8], port: u8, mode: u8) -> Frame {
    Ev3Buffer::new()
        .header(callback_type)
        .command(opcode)
        .port(port)
        .null_byte()
        .byte(mode)
        .single_byte()
        .index()
        .serialize()
}

pub fn sensor_raw(port: u8, mode: u8) -> Frame {
    read_port(callback::DEVICE_RAW_VALUE, op::INPUT_READ_RAW, port, mode)
}

pub fn sensor_pct(port: u8, mode: u8) -> Frame {
    read_port(callback::DEVICE_PCT_VALUE, op::INPUT_READ_PCT, port, mode)
}

pub fn sensor_si(port: u8, mode: u8) -> Frame {
    read_port(callback::DEVICE_SI_VALUE, op::INPUT_READ_SI, port, mode)
}

pub fn actor(port: u8, mode: u8) -> Frame {
    read_port(callback::ACTOR_VALUE, op::INPUT_READ_RAW, port, mode)
}

pub fn stop_motors(ports: u8, brake: bool) -> Frame {
    Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(ports)
        .byte(u8::from(brake))
        .serialize()
}

pub fn move_power(ports: u8, power: u8, brake: bool) -> Frame {
    Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(ports)
        .byte(u8::from(brake))
        .command(op::OUTPUT_POWER)
        .ports(ports)
        .byte(power)
        .command(op::OUTPUT_START)
        .ports(ports)
        .serialize()
}

pub fn rotate_power(left: u8, right: u8, power_left: u8, power_right: u8, brake: bool) -> Frame {
    Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(left | right)
        .byte(u8::from(brake))
        .command(op::OUTPUT_POWER)
        .port(left)
        .byte(power_left)
        .command(op::OUTPUT_POWER)
        .port(right)
        .byte(power_right)
        .command(op::OUTPUT_START)
        .ports(left | right)
        .serialize()
}

/// Speed-regulated step move on one port set
#[derive(Debug, Clone, Copy)]
pub struct Steps {
    pub steps: u32,
    pub speed: u8,
    pub ramp_up: u32,
    pub ramp_down: u32,
    pub brake: bool,
}

fn step_speed(buffer: Ev3Buffer, speed: u8, steps: &Steps) -> Ev3Buffer {
    buffer
        .byte(speed)
        .int(steps.ramp_up)
        .int(steps.steps)
        .int(steps.ramp_down)
        .byte(u8::from(steps.brake))
}

pub fn move_steps(ports: u8, steps: &Steps) -> Frame {
    let buffer = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(ports)
        .byte(u8::from(steps.brake))
        .command(op::OUTPUT_STEP_SPEED)
        .ports(ports);
    step_speed(buffer, steps.speed, steps).serialize()
}

pub fn rotate_steps(left: u8, right: u8, speed_right: u8, steps: &Steps) -> Frame {
    let buffer = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(left | right)
        .byte(u8::from(steps.brake))
        .command(op::OUTPUT_STEP_SPEED)
        .port(left);
    let buffer = step_speed(buffer, steps.speed, steps)
        .command(op::OUTPUT_STEP_SPEED)
        .port(right);
    step_speed(buffer, speed_right, steps).serialize()
}

/// Stop-then-step on a port set addressed as a single port
pub fn custom_rotate_steps(ports: u8, steps: &Steps) -> Frame {
    let buffer = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::OUTPUT_STOP)
        .ports(ports)
        .byte(u8::from(steps.brake))
        .command(op::OUTPUT_STEP_SPEED)
        .port(ports);
    step_speed(buffer, steps.speed, steps).serialize()
}

// =============================================================================
// Handler table
// =============================================================================

fn negate(name: &'static str, value: i64) -> Result<u8> {
    params::byte(name, -value)
}

fn get_battery(_: &mut Ev3State, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![battery()])
}

fn get_firmware(_: &mut Ev3State, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![firmware()])
}

fn get_device_type(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let port = params::byte("port", p.require_i64("port")?)?;
    Ok(vec![device_type(port)])
}

fn get_device_types(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let ports = match p.int_list("ports")? {
        Some(list) => list
            .into_iter()
            .map(|v| params::byte("ports", v))
            .collect::<Result<Vec<_>>>()?,
        None => input_port::ALL.to_vec(),
    };
    Ok(ports.into_iter().map(device_type).collect())
}

fn port_and_mode(p: &Params) -> Result<(u8, u8)> {
    let port = params::byte("port", p.require_i64("port")?)?;
    Ok((port, p.byte_or("mode", 0)?))
}

fn get_sensor_data(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (port, mode) = port_and_mode(p)?;
    Ok(vec![sensor_raw(port, mode)])
}

fn get_sensor_data_pct(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (port, mode) = port_and_mode(p)?;
    Ok(vec![sensor_pct(port, mode)])
}

fn get_sensor_data_si(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (port, mode) = port_and_mode(p)?;
    Ok(vec![sensor_si(port, mode)])
}

fn get_actor_data(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (port, mode) = port_and_mode(p)?;
    Ok(vec![actor(port, mode)])
}

fn set_led(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let color = p.i64_or("color", 0)?;
    let mode = p.i64_or("mode", 0)?;
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::UI_WRITE_LED)
        .byte(params::byte("color", color + mode)?)
        .serialize();
    Ok(vec![frame])
}

fn drive_ports(state: &Ev3State, p: &Params) -> Result<(u8, u8)> {
    let left = p.byte_or("motorLeft", state.motor_left.into())?;
    let right = p.byte_or("motorRight", state.motor_right.into())?;
    Ok((left, right))
}

fn cmd_move_power(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (left, right) = drive_ports(state, p)?;
    let power = p.byte_or("power", 0)?;
    Ok(vec![move_power(left | right, power, p.bool_or("brake", false)?)])
}

fn cmd_rotate_power(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (left, right) = drive_ports(state, p)?;
    let power_left = p.i64_or("powerLeft", 0)?;
    let power_right = match p.i64("powerRight")? {
        Some(v) if v != 0 => v,
        _ => power_left,
    };
    Ok(vec![rotate_power(
        left,
        right,
        params::byte("powerLeft", power_left)?,
        negate("powerRight", power_right)?,
        p.bool_or("brake", false)?,
    )])
}

fn cmd_stop(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let port = p.byte_or("port", output_port::ALL.into())?;
    Ok(vec![stop_motors(port, p.bool_or("brake", false)?)])
}

fn clear(_: &mut Ev3State, _: &Params) -> Result<Vec<Frame>> {
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::INPUT_CLEAR_ALL)
        .null_byte()
        .serialize();
    Ok(vec![frame])
}

fn draw_clean(_: &mut Ev3State, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::UI_DRAW_CLEAN)
        .serialize()])
}

fn draw_update(_: &mut Ev3State, _: &Params) -> Result<Vec<Frame>> {
    Ok(vec![Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::UI_DRAW_UPDATE)
        .serialize()])
}

fn screen_x(p: &Params, key: &'static str) -> Result<u32> {
    params::int(key, p.clamped_or(key, 0, 0, SCREEN_MAX_X)?)
}

fn screen_y(p: &Params, key: &'static str) -> Result<u32> {
    params::int(key, p.clamped_or(key, 0, 0, SCREEN_MAX_Y)?)
}

fn draw_image(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let filename = p.require_str("filename")?;
    let path = format!("{}{}", IMAGE_ROOT, filename.replacen(".rgf", "", 1));
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::UI_DRAW_BMPFILE)
        .byte(p.byte_or("color", 1)?)
        .int(screen_x(p, "x")?)
        .int(screen_y(p, "y")?)
        .string(&path)
        .serialize();
    Ok(vec![frame])
}

fn draw_line(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::UI_DRAW_LINE)
        .byte(p.byte_or("color", 1)?)
        .int(screen_x(p, "x1")?)
        .int(screen_y(p, "y1")?)
        .int(screen_x(p, "x2")?)
        .int(screen_y(p, "y2")?)
        .serialize();
    Ok(vec![frame])
}

fn volume(p: &Params) -> Result<u8> {
    let volume = match p.i64("volume")? {
        Some(v) if v != 0 => v,
        _ => 100,
    };
    params::byte("volume", volume.clamp(0, 100))
}

fn play_tone(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let duration = match p.i64("duration")? {
        Some(d) if d != 0 => d.max(50),
        _ => 50,
    };
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::SOUND_TONE)
        .byte(volume(p)?)
        .short(p.short_or("frequency", 0)?)
        .short(params::short("duration", duration)?)
        .serialize();
    Ok(vec![frame])
}

fn play_sound(_: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let frame = Ev3Buffer::new()
        .header(callback::NONE)
        .command(op::SOUND_PLAY)
        .byte(volume(p)?)
        .string(p.require_str("filename")?)
        .serialize();
    Ok(vec![frame])
}

/// `speed` default 50; zero also means the default
fn speed_or_default(p: &Params, key: &'static str) -> Result<i64> {
    Ok(match p.i64(key)? {
        Some(v) if v != 0 => v,
        _ => 50,
    })
}

fn steps_from(p: &Params, speed: i64, default_brake: bool) -> Result<Steps> {
    Ok(Steps {
        steps: params::int("steps", p.require_i64("steps")?)?,
        speed: params::byte("speed", speed)?,
        ramp_up: p.int_or("rampUp", 0)?,
        ramp_down: p.int_or("rampDown", 0)?,
        brake: p.bool_or("brake", default_brake)?,
    })
}

fn cmd_move_steps(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (left, right) = drive_ports(state, p)?;
    let steps = steps_from(p, speed_or_default(p, "speed")?, false)?;
    Ok(vec![move_steps(left | right, &steps)])
}

fn cmd_rotate_steps(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let (left, right) = drive_ports(state, p)?;
    let speed_left = speed_or_default(p, "speedLeft")?;
    let speed_right = speed_or_default(p, "speedRight")?;
    let steps = steps_from(p, speed_left, false)?;
    Ok(vec![rotate_steps(
        left,
        right,
        negate("speedRight", speed_right)?,
        &steps,
    )])
}

fn move_servo(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let ports = p.byte_or("port", state.medium_motor.into())?;
    let mut steps = steps_from(p, speed_or_default(p, "speed")?, true)?;
    steps.ramp_up = 0;
    steps.ramp_down = 0;
    Ok(vec![move_steps(ports, &steps)])
}

fn custom_move_steps(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let ports = p.byte_or("ports", state.motor_left.into())?;
    let mut steps = steps_from(p, speed_or_default(p, "speed")?, true)?;
    steps.ramp_up = 0;
    steps.ramp_down = 0;
    Ok(vec![move_steps(ports, &steps)])
}

fn cmd_custom_rotate_steps(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    let ports = p.byte_or("ports", state.motor_right.into())?;
    let mut steps = steps_from(p, speed_or_default(p, "speed")?, true)?;
    steps.ramp_up = 0;
    steps.ramp_down = 0;
    Ok(vec![custom_rotate_steps(ports, &steps)])
}

fn set_motors(state: &mut Ev3State, p: &Params) -> Result<Vec<Frame>> {
    state.motor_left = p.byte_or("motorLeft", state.motor_left.into())?;
    state.motor_right = p.byte_or("motorRight", state.motor_right.into())?;
    state.medium_motor = p.byte_or("mediumMotor", state.medium_motor.into())?;
    Ok(Vec::new())
}

pub static COMMANDS: CommandTable<Ev3State> = CommandTable {
    family: "ev3",
    entries: &[
        ("getBattery", get_battery),
        ("getFirmware", get_firmware),
        ("getDeviceType", get_device_type),
        ("getDeviceTypes", get_device_types),
        ("getSensorData", get_sensor_data),
        ("getSensorDataPct", get_sensor_data_pct),
        ("getSensorDataSi", get_sensor_data_si),
        ("getActorData", get_actor_data),
        ("setLed", set_led),
        ("movePower", cmd_move_power),
        ("rotatePower", cmd_rotate_power),
        ("stop", cmd_stop),
        ("clear", clear),
        ("drawClean", draw_clean),
        ("drawUpdate", draw_update),
        ("drawImage", draw_image),
        ("drawLine", draw_line),
        ("playTone", play_tone),
        ("playSound", play_sound),
        ("moveSteps", cmd_move_steps),
        ("rotateSteps", cmd_rotate_steps),
        ("moveServo", move_servo),
        ("customMoveSteps", custom_move_steps),
        ("customRotateSteps", cmd_custom_rotate_steps),
        ("setMotors", set_motors),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(name: &str, params: Params) -> Vec<Frame> {
        COMMANDS
            .encode(&mut Ev3State::default(), name, &params)
            .unwrap()
    }

    #[test]
    fn test_battery_frame() {
        let frames = encode("getBattery", Params::new());
        assert_eq!(
            frames[0].bytes(),
            &[0x09, 0x00, 0x21, 0x00, 0x00, 0x04, 0x00, 0x81, 0x12, 0xE1, 0x00]
        );
    }

    #[test]
    fn test_device_types_defaults_to_all_ports() {
        let frames = encode("getDeviceTypes", Params::new());
        assert_eq!(frames.len(), 8);
        // callback target carries the port
        assert_eq!(frames[4].bytes()[3], input_port::A);
    }

    #[test]
    fn test_play_tone_clamps() {
        let frames = encode(
            "playTone",
            Params::new().with("frequency", 440).with("duration", 10).with("volume", 300),
        );
        assert_eq!(
            &frames[0].bytes()[7..],
            &[0x94, 0x01, 0x81, 100, 0x82, 0xB8, 0x01, 0x82, 50, 0x00]
        );
    }

    #[test]
    fn test_rotate_power_negates_right() {
        let frames = encode("rotatePower", Params::new().with("powerLeft", 30));
        let bytes = frames[0].bytes();
        // POWER on port C carries -30, then START on B|C
        assert!(bytes.ends_with(&[
            0xA4, 0x81, 0x00, 0x81, 0x04, 0x81, 0xE2, 0xA6, 0x81, 0x00, 0x81, 0x06
        ]));
    }

    #[test]
    fn test_set_motors_updates_state() {
        let mut state = Ev3State::default();
        let frames = COMMANDS
            .encode(
                &mut state,
                "setMotors",
                &Params::new().with("motorLeft", 1).with("motorRight", 8),
            )
            .unwrap();
        assert!(frames.is_empty());
        assert_eq!(state.motor_left, output_port::A);
        assert_eq!(state.motor_right, output_port::D);
        assert_eq!(state.medium_motor, output_port::A);
    }

    #[test]
    fn test_draw_image_path() {
        let frames = encode("drawImage", Params::new().with("filename", "Test/Smile.rgf"));
        let bytes = frames[0].bytes();
        let path = b"/home/root/lms2012/prjs/Test/Smile\0";
        assert!(bytes.ends_with(path));
    }

    #[test]
    fn test_missing_steps_rejected() {
        let err = COMMANDS
            .encode(&mut Ev3State::default(), "moveSteps", &Params::new())
            .unwrap_err();
        assert!(err.to_string().contains("steps"));
    }
}
