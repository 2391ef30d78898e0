//! Sphero robots
//!
//! Classic Spheros talk over Bluetooth classic; BB-8 and SPRK+ (v1) carry the
//! same packets over a GATT characteristic pair after an unlock handshake.

pub mod buffer;
pub mod commands;
pub mod constants;
pub mod decoder;

use std::time::Duration;

use cwc_transport::{BleProfile, BleService, FrameConfig, TransportType};

use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::events::RobotEvent;
use crate::handler::CommandTable;
use crate::monitoring::MonitorEntry;
use crate::protocol::{Family, HandshakeStep, RobotProtocol};
use crate::topology::{PortDevice, SensorKind, Topology};

pub use buffer::SpheroBuffer;
pub use commands::{SpheroState, COMMANDS};
pub use decoder::SpheroDecoder;

/// Longest response or async packet the decoder handles, with framing
const MAX_PACKET: usize = 128;

pub const FRAMING: FrameConfig = FrameConfig {
    headers: &[&[0xFF, 0xFF], &[0xFF, 0xFE]],
    footer: None,
    min_size: 6,
    checksum: Some(decoder::verify_checksum),
    length: Some(decoder::frame_length),
    max_size: Some(MAX_PACKET),
};

/// Pseudo port the location poller is keyed on
pub const LOCATION_PORT: u8 = 0;

const LOCATION_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Classic,
    V1,
}

/// Sphero family descriptor; both generations share commands and framing
#[derive(Debug, Clone, Copy)]
pub struct SpheroProtocol {
    generation: Generation,
}

impl SpheroProtocol {
    pub fn classic() -> Self {
        Self {
            generation: Generation::Classic,
        }
    }

    pub fn v1() -> Self {
        Self {
            generation: Generation::V1,
        }
    }
}

/// GATT layout of BB-8 / SPRK+ robots
pub fn v1_profile() -> BleProfile {
    use constants::ble;
    BleProfile {
        services: vec![
            BleService {
                uuid: ble::RADIO_SERVICE,
                characteristics: vec![ble::ANTI_DOS, ble::TX_POWER, ble::WAKE],
            },
            BleService {
                uuid: ble::ROBOT_CONTROL_SERVICE,
                characteristics: vec![ble::COMMAND, ble::RESPONSE],
            },
        ],
        write_characteristic: Some(ble::COMMAND),
        notify_characteristic: Some(ble::RESPONSE),
    }
}

impl RobotProtocol for SpheroProtocol {
    type State = SpheroState;
    type Decoder = SpheroDecoder;

    fn family(&self) -> Family {
        match self.generation {
            Generation::Classic => Family::SpheroClassic,
            Generation::V1 => Family::SpheroV1,
        }
    }

    fn commands(&self) -> &'static CommandTable<SpheroState> {
        &COMMANDS
    }

    fn framing(&self) -> FrameConfig {
        FRAMING
    }

    fn auto_connect_name(&self) -> &'static str {
        match self.generation {
            Generation::Classic => "Sphero",
            Generation::V1 => "BB-",
        }
    }

    fn transport(&self) -> TransportType {
        match self.generation {
            Generation::Classic => TransportType::BluetoothClassic,
            Generation::V1 => TransportType::BluetoothLe,
        }
    }

    fn ble_profile(&self) -> Option<BleProfile> {
        (self.generation == Generation::V1).then(v1_profile)
    }

    fn handshake(&self) -> Vec<HandshakeStep> {
        use constants::ble;
        if self.generation != Generation::V1 {
            return Vec::new();
        }
        vec![
            HandshakeStep::Write {
                characteristic: ble::ANTI_DOS,
                data: ble::ANTI_DOS_KEY.to_vec(),
            },
            HandshakeStep::Write {
                characteristic: ble::TX_POWER,
                data: vec![0x07],
            },
            HandshakeStep::Write {
                characteristic: ble::WAKE,
                data: vec![0x01],
            },
            HandshakeStep::Listen {
                characteristic: ble::RESPONSE,
            },
        ]
    }

    /// Color cycle as a visible connect signal, then collision reports
    fn prepare(&self, _state: &mut SpheroState) -> Result<Vec<Frame>, EncodingError> {
        Ok(vec![
            commands::set_rgb(255, 0, 0, false),
            commands::get_rgb(),
            commands::set_rgb(0, 255, 0, false),
            commands::get_rgb(),
            commands::set_rgb(0, 0, 255, false),
            commands::get_rgb(),
            commands::collision_detection(&commands::CollisionSettings::default()),
            commands::get_version(),
        ])
    }

    fn initial_topology(&self) -> Topology {
        Topology::from_ports([(LOCATION_PORT, PortDevice::new(SensorKind::Location, 0))])
    }

    fn monitor_plan(&self, topology: &Topology) -> Vec<MonitorEntry> {
        topology
            .iter()
            .filter(|(_, device)| device.kind == SensorKind::Location)
            .map(|(port, device)| MonitorEntry {
                port,
                kind: device.kind,
                interval: LOCATION_INTERVAL,
                frame: commands::get_location(),
            })
            .collect()
    }

    fn decode(&self, decoder: &mut SpheroDecoder, _topology: &Topology, frame: &[u8]) -> Vec<RobotEvent> {
        decoder::decode(decoder, frame)
    }
}
