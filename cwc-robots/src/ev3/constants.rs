//! EV3 direct command constants

/// Reply routing byte stored in front of every frame
pub mod callback {
    pub const NONE: u8 = 0x00;
    pub const DEVICE_NAME: u8 = 0x01;
    pub const ACTOR_VALUE: u8 = 0x05;
    pub const DEVICE_PCT_VALUE: u8 = 0x10;
    pub const DEVICE_RAW_VALUE: u8 = 0x11;
    pub const DEVICE_SI_VALUE: u8 = 0x12;
    pub const FIRMWARE: u8 = 0x20;
    pub const BATTERY: u8 = 0x21;
}

/// Direct command types
pub mod command_type {
    pub const DIRECT_REPLY: u8 = 0x00;
    pub const DIRECT_NO_REPLY: u8 = 0x80;
}

/// Parameter encoding prefixes
pub mod parameter {
    pub const BYTE: u8 = 0x81;
    pub const SHORT: u8 = 0x82;
    pub const INT: u8 = 0x83;
    pub const STRING: u8 = 0x84;
    pub const INDEX: u8 = 0xE1;
}

/// Opcodes (with sub-command where the opcode takes one)
pub mod op {
    pub const UI_READ_BATTERY: &[u8] = &[0x81, 0x12];
    pub const UI_READ_FIRMWARE: &[u8] = &[0x81, 0x0A];
    pub const UI_WRITE_LED: &[u8] = &[0x82, 0x1B];
    pub const UI_DRAW_UPDATE: &[u8] = &[0x84, 0x00];
    pub const UI_DRAW_CLEAN: &[u8] = &[0x84, 0x01];
    pub const UI_DRAW_LINE: &[u8] = &[0x84, 0x03];
    pub const UI_DRAW_BMPFILE: &[u8] = &[0x84, 0x1C];

    pub const SOUND_TONE: &[u8] = &[0x94, 0x01];
    pub const SOUND_PLAY: &[u8] = &[0x94, 0x02];

    pub const INPUT_GET_DEVICE_NAME: &[u8] = &[0x99, 0x15];
    pub const INPUT_CLEAR_ALL: &[u8] = &[0x99, 0x0A];
    pub const INPUT_READ_PCT: &[u8] = &[0x99, 0x1B];
    pub const INPUT_READ_RAW: &[u8] = &[0x99, 0x1C];
    pub const INPUT_READ_SI: &[u8] = &[0x99, 0x1D];

    pub const OUTPUT_STOP: &[u8] = &[0xA3];
    pub const OUTPUT_POWER: &[u8] = &[0xA4];
    pub const OUTPUT_START: &[u8] = &[0xA6];
    pub const OUTPUT_STEP_SPEED: &[u8] = &[0xAE];
}

/// Sensor ports (motor ports read as 0x10..=0x13)
pub mod input_port {
    pub const ONE: u8 = 0x00;
    pub const TWO: u8 = 0x01;
    pub const THREE: u8 = 0x02;
    pub const FOUR: u8 = 0x03;
    pub const A: u8 = 0x10;
    pub const B: u8 = 0x11;
    pub const C: u8 = 0x12;
    pub const D: u8 = 0x13;

    pub const ALL: [u8; 8] = [ONE, TWO, THREE, FOUR, A, B, C, D];
}

/// Motor port bit mask
pub mod output_port {
    pub const A: u8 = 0x01;
    pub const B: u8 = 0x02;
    pub const C: u8 = 0x04;
    pub const D: u8 = 0x08;
    pub const ALL: u8 = 0x0F;
}

pub mod led_mode {
    pub const NORMAL: u8 = 0;
    pub const FLASH: u8 = 3;
    pub const PULSE: u8 = 6;
}

/// Projects directory images are loaded from
pub const IMAGE_ROOT: &str = "/home/root/lms2012/prjs/";

pub const SCREEN_MAX_X: i64 = 177;
pub const SCREEN_MAX_Y: i64 = 127;

/// Reply status byte
pub mod reply {
    pub const OK: u8 = 0x02;
    pub const ERROR: u8 = 0x04;
}
