//! Sphero API constants

/// Device id and command id pairs
pub mod command {
    pub const PING: [u8; 2] = [0x00, 0x01];
    pub const VERSION: [u8; 2] = [0x00, 0x02];
    pub const SLEEP: [u8; 2] = [0x00, 0x22];

    pub const HEADING: [u8; 2] = [0x02, 0x01];
    pub const COLLISION_DETECTION: [u8; 2] = [0x02, 0x12];
    pub const LOCATION_GET: [u8; 2] = [0x02, 0x15];
    pub const RGB_LED_SET: [u8; 2] = [0x02, 0x20];
    pub const BACK_LED: [u8; 2] = [0x02, 0x21];
    pub const RGB_LED_GET: [u8; 2] = [0x02, 0x22];
    pub const ROLL: [u8; 2] = [0x02, 0x30];
    pub const BOOST: [u8; 2] = [0x02, 0x31];
    pub const MOTION_TIMEOUT: [u8; 2] = [0x02, 0x34];
}

/// Sequence byte used to route acknowledgements
pub mod callback {
    pub const NONE: u8 = 0x00;
    pub const RGB: u8 = 0x01;
    pub const LOCATION: u8 = 0x02;
    pub const VERSION: u8 = 0x03;
}

pub const SOP1: u8 = 0xFF;
/// Second start byte: answer requested
pub const SOP2_ANSWER: u8 = 0xFF;
/// Second start byte: no answer, and the marker of async messages
pub const SOP2_ASYNC: u8 = 0xFE;

/// Async message ids
pub mod message {
    pub const PRE_SLEEP: u8 = 0x05;
    pub const COLLISION_DETECTED: u8 = 0x07;
}

/// BLE profile of BB-8 and SPRK+ robots
pub mod ble {
    use uuid::{uuid, Uuid};

    pub const RADIO_SERVICE: Uuid = uuid!("22bb746f-2bb0-7554-2d6f-726568705327");
    pub const ROBOT_CONTROL_SERVICE: Uuid = uuid!("22bb746f-2ba0-7554-2d6f-726568705327");

    pub const ANTI_DOS: Uuid = uuid!("22bb746f-2bbd-7554-2d6f-726568705327");
    pub const TX_POWER: Uuid = uuid!("22bb746f-2bb2-7554-2d6f-726568705327");
    pub const WAKE: Uuid = uuid!("22bb746f-2bbf-7554-2d6f-726568705327");
    pub const COMMAND: Uuid = uuid!("22bb746f-2ba1-7554-2d6f-726568705327");
    pub const RESPONSE: Uuid = uuid!("22bb746f-2ba6-7554-2d6f-726568705327");

    pub const ANTI_DOS_KEY: &[u8] = b"011i3";
}
