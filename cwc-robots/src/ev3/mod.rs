//! LEGO Mindstorms EV3 direct commands
//!
//! The EV3 brick speaks length-prefixed direct commands over Bluetooth
//! classic (RFCOMM). Every command that expects an answer carries a callback
//! type and target in front of the payload; the brick echoes both, which is
//! how replies are routed back to a port.

pub mod buffer;
pub mod commands;
pub mod constants;
pub mod decoder;

use std::time::Duration;

use cwc_transport::{FrameConfig, TransportType};

use crate::buffer::Frame;
use crate::error::EncodingError;
use crate::events::RobotEvent;
use crate::handler::CommandTable;
use crate::monitoring::MonitorEntry;
use crate::protocol::{Family, RobotProtocol};
use crate::topology::{SensorKind, Topology};

pub use buffer::Ev3Buffer;
pub use commands::{Ev3State, COMMANDS};
pub use decoder::Ev3Decoder;

fn frame_length(buffer: &[u8]) -> Option<usize> {
    let len = buffer.get(..2)?;
    Some(usize::from(u16::from_le_bytes([len[0], len[1]])) + 2)
}

/// Brick message limit plus the length field
const MAX_REPLY: usize = 1026;

/// Replies are `[len lo, len hi, ...]` with no header or checksum
pub const FRAMING: FrameConfig = FrameConfig {
    headers: &[],
    footer: None,
    min_size: 5,
    checksum: None,
    length: Some(frame_length),
    max_size: Some(MAX_REPLY),
};

/// Polling cadence of a sensor kind
pub fn cadence(kind: SensorKind) -> Option<Duration> {
    let ms = match kind {
        SensorKind::Touch => 500,
        SensorKind::GyroAngle | SensorKind::GyroRate => 150,
        SensorKind::UltrasonicCm
        | SensorKind::UltrasonicInch
        | SensorKind::UltrasonicListen
        | SensorKind::ColorAmbient
        | SensorKind::ColorColor
        | SensorKind::ColorReflect
        | SensorKind::IrProximity
        | SensorKind::IrRemote
        | SensorKind::IrSeek => 200,
        k if k.is_motor() => 2000,
        _ => return None,
    };
    Some(Duration::from_millis(ms))
}

/// Read frame matching a sensor kind
pub fn read_frame(port: u8, kind: SensorKind, mode: u8) -> Frame {
    match kind {
        SensorKind::Touch => commands::sensor_pct(port, mode),
        SensorKind::GyroAngle
        | SensorKind::GyroRate
        | SensorKind::UltrasonicCm
        | SensorKind::UltrasonicInch
        | SensorKind::UltrasonicListen => commands::sensor_si(port, mode),
        k if k.is_motor() => commands::actor(port, mode),
        _ => commands::sensor_raw(port, mode),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ev3Protocol;

impl RobotProtocol for Ev3Protocol {
    type State = Ev3State;
    type Decoder = Ev3Decoder;

    fn family(&self) -> Family {
        Family::Ev3
    }

    fn commands(&self) -> &'static CommandTable<Ev3State> {
        &COMMANDS
    }

    fn framing(&self) -> FrameConfig {
        FRAMING
    }

    fn auto_connect_name(&self) -> &'static str {
        "EV3"
    }

    fn transport(&self) -> TransportType {
        TransportType::BluetoothClassic
    }

    fn prepare(&self, _state: &mut Ev3State) -> Result<Vec<Frame>, EncodingError> {
        let mut frames = vec![commands::firmware(), commands::battery()];
        frames.extend(constants::input_port::ALL.into_iter().map(commands::device_type));
        Ok(frames)
    }

    fn monitor_plan(&self, topology: &Topology) -> Vec<MonitorEntry> {
        topology
            .iter()
            .filter_map(|(port, device)| {
                let interval = cadence(device.kind)?;
                Some(MonitorEntry {
                    port,
                    kind: device.kind,
                    interval,
                    frame: read_frame(port, device.kind, device.mode),
                })
            })
            .collect()
    }

    fn decode(&self, decoder: &mut Ev3Decoder, topology: &Topology, frame: &[u8]) -> Vec<RobotEvent> {
        decoder::decode(decoder, topology, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::topology::PortDevice;
    use cwc_transport::StreamReader;

    #[test]
    fn test_move_steps_wire_format() {
        let frames = Family::Ev3
            .encode("moveSteps", &Params::new().with("steps", 50).with("speed", 20))
            .unwrap();
        assert_eq!(
            frames[0].to_hex(),
            "24 00 00 00 80 04 00 A3 81 00 81 06 81 00 AE 81 00 81 06 81 14 \
             83 00 00 00 00 83 32 00 00 00 83 00 00 00 00 81 00"
        );
    }

    #[test]
    fn test_monitor_plan_uses_kind_cadence() {
        let topology = Topology::from_ports([
            (0x00, PortDevice::new(SensorKind::Touch, 0)),
            (0x01, PortDevice::new(SensorKind::GyroAngle, 0)),
            (0x12, PortDevice::new(SensorKind::LargeMotorDegree, 0)),
        ]);
        let plan = Ev3Protocol.monitor_plan(&topology);
        let cadences: Vec<_> = plan.iter().map(|e| (e.port, e.interval.as_millis())).collect();
        assert_eq!(cadences, vec![(0x00, 500), (0x01, 150), (0x12, 2000)]);

        // touch reads percent, the motor reads its actor value
        assert_eq!(plan[0].frame.bytes()[2], constants::callback::DEVICE_PCT_VALUE);
        assert_eq!(plan[2].frame.bytes()[2], constants::callback::ACTOR_VALUE);
    }

    #[test]
    fn test_prepare_reads_all_ports() {
        let frames = Ev3Protocol.prepare(&mut Ev3State::default()).unwrap();
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[0].bytes()[2], constants::callback::FIRMWARE);
    }

    #[test]
    fn test_reply_framing() {
        let mut reader = StreamReader::new(FRAMING);
        let frames = reader.push(&[0x04, 0x00, 0x21, 0x00, 0x02, 0x5A, 0x05]);
        assert_eq!(frames, vec![vec![0x04, 0x00, 0x21, 0x00, 0x02, 0x5A]]);
        assert_eq!(reader.buffered_len(), 1);
    }
}
