//! Immutable port topology snapshots
//!
//! A [`Topology`] maps port numbers to the device found there. Updates never
//! mutate a snapshot in place: [`Topology::with_port`] returns a new one and
//! [`Topology::diff`] reports what changed between two snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Kind of sensor or actor attached to a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorKind {
    // EV3
    ColorAmbient,
    ColorColor,
    ColorReflect,
    GyroAngle,
    GyroRate,
    IrProximity,
    IrRemote,
    IrSeek,
    LargeMotorDegree,
    LargeMotorRotation,
    MediumMotorDegree,
    MediumMotorRotation,
    Touch,
    UltrasonicCm,
    UltrasonicInch,
    UltrasonicListen,

    // Makeblock
    Ultrasonic,
    LineFollower,
    Light,
    Light2,
    Temperature,
    InnerButton,

    // Sphero
    Location,
}

impl SensorKind {
    /// Map an EV3 device name (`US-DIST-CM`, `touch`, ...) to its kind and
    /// read mode
    pub fn from_ev3_name(name: &str) -> Option<(Self, u8)> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let kind = match normalized.as_str() {
            "col-reflect" => (Self::ColorReflect, 0),
            "col-ambient" => (Self::ColorAmbient, 1),
            "col-color" => (Self::ColorColor, 2),
            "gyro-ang" => (Self::GyroAngle, 0),
            "gyro-rate" => (Self::GyroRate, 1),
            "ir-prox" => (Self::IrProximity, 0),
            "ir-seek" => (Self::IrSeek, 1),
            "ir-remote" => (Self::IrRemote, 2),
            "l-motor-deg" => (Self::LargeMotorDegree, 0),
            "l-motor-rot" => (Self::LargeMotorRotation, 1),
            "m-motor-deg" => (Self::MediumMotorDegree, 0),
            "m-motor-rot" => (Self::MediumMotorRotation, 1),
            "touch" => (Self::Touch, 0),
            "us-dist-cm" => (Self::UltrasonicCm, 0),
            "us-dist-in" => (Self::UltrasonicInch, 1),
            "us-listen" => (Self::UltrasonicListen, 2),
            _ => return None,
        };
        Some(kind)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ColorAmbient => "col-ambient",
            Self::ColorColor => "col-color",
            Self::ColorReflect => "col-reflect",
            Self::GyroAngle => "gyro-ang",
            Self::GyroRate => "gyro-rate",
            Self::IrProximity => "ir-prox",
            Self::IrRemote => "ir-remote",
            Self::IrSeek => "ir-seek",
            Self::LargeMotorDegree => "l-motor-deg",
            Self::LargeMotorRotation => "l-motor-rot",
            Self::MediumMotorDegree => "m-motor-deg",
            Self::MediumMotorRotation => "m-motor-rot",
            Self::Touch => "touch",
            Self::UltrasonicCm => "us-dist-cm",
            Self::UltrasonicInch => "us-dist-in",
            Self::UltrasonicListen => "us-listen",
            Self::Ultrasonic => "ultrasonic",
            Self::LineFollower => "line-follower",
            Self::Light => "light",
            Self::Light2 => "light-2",
            Self::Temperature => "temperature",
            Self::InnerButton => "inner-button",
            Self::Location => "location",
        }
    }

    pub fn is_motor(&self) -> bool {
        matches!(
            self,
            Self::LargeMotorDegree
                | Self::LargeMotorRotation
                | Self::MediumMotorDegree
                | Self::MediumMotorRotation
        )
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Device found on one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDevice {
    pub kind: SensorKind,
    pub mode: u8,
}

impl PortDevice {
    pub fn new(kind: SensorKind, mode: u8) -> Self {
        Self { kind, mode }
    }
}

/// One port-level difference between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyChange {
    Added(u8, PortDevice),
    Removed(u8, PortDevice),
    Changed {
        port: u8,
        from: PortDevice,
        to: PortDevice,
    },
}

/// Immutable port → device snapshot, cheap to clone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology(Arc<BTreeMap<u8, PortDevice>>);

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ports(ports: impl IntoIterator<Item = (u8, PortDevice)>) -> Self {
        Self(Arc::new(ports.into_iter().collect()))
    }

    pub fn get(&self, port: u8) -> Option<&PortDevice> {
        self.0.get(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &PortDevice)> {
        self.0.iter().map(|(p, d)| (*p, d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New snapshot with `port` set, or removed when `device` is `None`
    pub fn with_port(&self, port: u8, device: Option<PortDevice>) -> Self {
        let mut ports = (*self.0).clone();
        match device {
            Some(d) => ports.insert(port, d),
            None => ports.remove(&port),
        };
        Self(Arc::new(ports))
    }

    /// Port-level changes needed to go from `self` to `other`
    pub fn diff(&self, other: &Topology) -> Vec<TopologyChange> {
        let mut changes = Vec::new();
        for (port, old) in self.iter() {
            match other.get(port) {
                None => changes.push(TopologyChange::Removed(port, *old)),
                Some(new) if new != old => changes.push(TopologyChange::Changed {
                    port,
                    from: *old,
                    to: *new,
                }),
                Some(_) => {}
            }
        }
        for (port, new) in other.iter() {
            if self.get(port).is_none() {
                changes.push(TopologyChange::Added(port, *new));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ev3_names() {
        assert_eq!(
            SensorKind::from_ev3_name("US-DIST-CM"),
            Some((SensorKind::UltrasonicCm, 0))
        );
        assert_eq!(
            SensorKind::from_ev3_name("col-color"),
            Some((SensorKind::ColorColor, 2))
        );
        assert_eq!(SensorKind::from_ev3_name("NONE"), None);
        assert_eq!(SensorKind::from_ev3_name("PORT ERROR"), None);
    }

    #[test]
    fn test_with_port_leaves_original_untouched() {
        let empty = Topology::new();
        let one = empty.with_port(0, Some(PortDevice::new(SensorKind::Touch, 0)));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(one.with_port(0, None).is_empty());
    }

    #[test]
    fn test_diff() {
        let touch = PortDevice::new(SensorKind::Touch, 0);
        let gyro = PortDevice::new(SensorKind::GyroAngle, 0);
        let rate = PortDevice::new(SensorKind::GyroRate, 1);

        let a = Topology::from_ports([(0, touch), (1, gyro)]);
        let b = Topology::from_ports([(1, rate), (2, touch)]);

        let changes = a.diff(&b);
        assert_eq!(
            changes,
            vec![
                TopologyChange::Removed(0, touch),
                TopologyChange::Changed {
                    port: 1,
                    from: gyro,
                    to: rate
                },
                TopologyChange::Added(2, touch),
            ]
        );
        assert!(a.diff(&a.clone()).is_empty());
    }
}
