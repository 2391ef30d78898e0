//! Robot family descriptors
//!
//! A [`RobotProtocol`] bundles everything family-specific: command table,
//! framing, decoder, monitoring cadence, transport profile and the
//! prepare/stop sequences. [`crate::Connection`] and
//! [`crate::Monitoring`] are generic over it.

use std::fmt;
use std::str::FromStr;

use cwc_transport::{BleProfile, FrameConfig, TransportType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::Frame;
use crate::error::{EncodingError, RobotError};
use crate::ev3::Ev3Protocol;
use crate::events::RobotEvent;
use crate::handler::CommandTable;
use crate::makeblock::{MBotProtocol, RangerProtocol};
use crate::monitoring::MonitorEntry;
use crate::params::Params;
use crate::sphero::SpheroProtocol;
use crate::topology::Topology;

/// One GATT step run after the transport connects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    Write { characteristic: Uuid, data: Vec<u8> },
    Listen { characteristic: Uuid },
}

/// Serial speed shared by every supported robot
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Family descriptor driving the generic connection
pub trait RobotProtocol: Clone + Send + Sync + 'static {
    /// Handler state (last-known values, motor assignment)
    type State: Default + Send + 'static;
    /// Inbound decoder state (last readings for change detection)
    type Decoder: Default + Send + 'static;

    fn family(&self) -> Family;

    fn commands(&self) -> &'static CommandTable<Self::State>;

    fn framing(&self) -> FrameConfig;

    /// Substring of the advertised name used by auto-connect
    fn auto_connect_name(&self) -> &'static str;

    fn transport(&self) -> TransportType;

    /// Serial speed of the robot's UART
    fn baud_rate(&self) -> u32 {
        DEFAULT_BAUD_RATE
    }

    fn ble_profile(&self) -> Option<BleProfile> {
        None
    }

    /// GATT writes and listens run before the prepare frames
    fn handshake(&self) -> Vec<HandshakeStep> {
        Vec::new()
    }

    /// Frames sent once the robot is connected
    fn prepare(&self, state: &mut Self::State) -> Result<Vec<Frame>, EncodingError>;

    /// Best-effort halt sequence
    fn stop(&self, state: &mut Self::State) -> Result<Vec<Frame>, RobotError> {
        self.commands().encode(state, "stop", &Params::new())
    }

    /// Ports monitored before the robot reports anything
    fn initial_topology(&self) -> Topology {
        Topology::new()
    }

    /// Polling plan for a topology
    fn monitor_plan(&self, topology: &Topology) -> Vec<MonitorEntry>;

    /// Decode one de-framed inbound frame
    fn decode(&self, decoder: &mut Self::Decoder, topology: &Topology, frame: &[u8]) -> Vec<RobotEvent>;
}

/// Supported robot families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Ev3,
    SpheroClassic,
    SpheroV1,
    #[serde(rename = "mbot")]
    MBot,
    #[serde(rename = "mbot-ranger")]
    MBotRanger,
}

impl Family {
    pub const ALL: [Family; 5] = [
        Family::Ev3,
        Family::SpheroClassic,
        Family::SpheroV1,
        Family::MBot,
        Family::MBotRanger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Ev3 => "ev3",
            Family::SpheroClassic => "sphero-classic",
            Family::SpheroV1 => "sphero-v1",
            Family::MBot => "mbot",
            Family::MBotRanger => "mbot-ranger",
        }
    }

    /// Encode a command with fresh handler state, no device needed
    pub fn encode(&self, command: &str, params: &Params) -> Result<Vec<Frame>, RobotError> {
        match self {
            Family::Ev3 => encode_with(&Ev3Protocol, command, params),
            Family::SpheroClassic => encode_with(&SpheroProtocol::classic(), command, params),
            Family::SpheroV1 => encode_with(&SpheroProtocol::v1(), command, params),
            Family::MBot => encode_with(&MBotProtocol, command, params),
            Family::MBotRanger => encode_with(&RangerProtocol, command, params),
        }
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        match self {
            Family::Ev3 => Ev3Protocol.commands().names().collect(),
            Family::SpheroClassic | Family::SpheroV1 => {
                SpheroProtocol::classic().commands().names().collect()
            }
            Family::MBot => MBotProtocol.commands().names().collect(),
            Family::MBotRanger => RangerProtocol.commands().names().collect(),
        }
    }
}

fn encode_with<P: RobotProtocol>(
    protocol: &P,
    command: &str,
    params: &Params,
) -> Result<Vec<Frame>, RobotError> {
    let mut state = P::State::default();
    protocol.commands().encode(&mut state, command, params)
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "ev3" => Ok(Family::Ev3),
            "sphero" | "sphero-classic" => Ok(Family::SpheroClassic),
            "sphero-v1" | "bb8" | "bb-8" | "sprk" => Ok(Family::SpheroV1),
            "mbot" => Ok(Family::MBot),
            "mbot-ranger" | "ranger" => Ok(Family::MBotRanger),
            other => Err(format!("Unknown robot family: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse_and_display() {
        for family in Family::ALL {
            assert_eq!(family.as_str().parse::<Family>().unwrap(), family);
        }
        assert_eq!("Ranger".parse::<Family>().unwrap(), Family::MBotRanger);
        assert!("nxt".parse::<Family>().is_err());
    }

    #[test]
    fn test_family_serde_names() {
        let json = serde_json::to_string(&Family::MBotRanger).unwrap();
        assert_eq!(json, "\"mbot-ranger\"");
        let parsed: Family = serde_json::from_str("\"sphero-v1\"").unwrap();
        assert_eq!(parsed, Family::SpheroV1);
    }

    #[test]
    fn test_every_family_has_stop() {
        for family in Family::ALL {
            assert!(family.command_names().contains(&"stop"), "{}", family);
        }
    }
}
