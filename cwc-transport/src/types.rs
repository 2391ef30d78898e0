//! Common types for transport layer

use serde::Serialize;
use uuid::Uuid;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportType {
    /// USB or on-board serial port
    Serial,
    /// Bluetooth classic RFCOMM channel exposed as a tty
    BluetoothClassic,
    /// Bluetooth Low Energy GATT
    BluetoothLe,
    /// In-memory device (tests, dry runs)
    Mock,
}

impl TransportType {
    /// Check if this transport is wireless
    pub fn is_wireless(&self) -> bool {
        matches!(self, Self::BluetoothClassic | Self::BluetoothLe)
    }

    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::BluetoothClassic => "bt-classic",
            Self::BluetoothLe => "ble",
            Self::Mock => "mock",
        }
    }
}

/// Device identification information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Transport type
    pub transport_type: TransportType,
    /// Device path (`/dev/ttyUSB0`, `/dev/rfcomm0`) or BLE address
    pub path: String,
    /// Advertised or product name if available
    pub name: Option<String>,
    /// USB Vendor ID (serial adapters only)
    pub vid: Option<u16>,
    /// USB Product ID (serial adapters only)
    pub pid: Option<u16>,
    /// Signal strength at discovery time (BLE only)
    pub rssi: Option<i16>,
}

impl DeviceInfo {
    /// Minimal info for a device known only by its path
    pub fn new(transport_type: TransportType, path: impl Into<String>) -> Self {
        Self {
            transport_type,
            path: path.into(),
            name: None,
            vid: None,
            pid: None,
            rssi: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name shown to users, falling back to the path
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }

    /// Case-insensitive match against the display name or path
    pub fn matches_name(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.display_name().to_lowercase().contains(&needle)
            || self.path.to_lowercase().contains(&needle)
    }
}

/// Transport-level connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A GATT service and the characteristics used under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Service/characteristic topology a BLE device must resolve before use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BleProfile {
    /// Services resolved in order during connect
    pub services: Vec<BleService>,
    /// Characteristic used by plain `send()` calls
    pub write_characteristic: Option<Uuid>,
    /// Characteristic that carries device responses
    pub notify_characteristic: Option<Uuid>,
}

impl BleProfile {
    /// All declared characteristics in resolution order
    pub fn characteristics(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.services
            .iter()
            .flat_map(|s| s.characteristics.iter().map(move |c| (s.uuid, *c)))
    }
}

/// Discovered device that can be opened
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device information
    pub info: DeviceInfo,
}

/// Discovery events for hot-plug support
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A device was added
    DeviceAdded(DiscoveredDevice),
    /// A device was removed
    DeviceRemoved(DeviceInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_path() {
        let info = DeviceInfo::new(TransportType::Serial, "/dev/ttyUSB0");
        assert_eq!(info.display_name(), "/dev/ttyUSB0");
        let named = info.with_name("Makeblock");
        assert_eq!(named.display_name(), "Makeblock");
    }

    #[test]
    fn test_matches_name_is_case_insensitive() {
        let info = DeviceInfo::new(TransportType::BluetoothLe, "AA:BB").with_name("BB-8 1A2B");
        assert!(info.matches_name("bb-"));
        assert!(info.matches_name("aa:bb"));
        assert!(!info.matches_name("EV3"));
    }

    #[test]
    fn test_profile_characteristics_order() {
        let svc_a = Uuid::from_u128(1);
        let svc_b = Uuid::from_u128(2);
        let profile = BleProfile {
            services: vec![
                BleService {
                    uuid: svc_a,
                    characteristics: vec![Uuid::from_u128(10), Uuid::from_u128(11)],
                },
                BleService {
                    uuid: svc_b,
                    characteristics: vec![Uuid::from_u128(20)],
                },
            ],
            ..Default::default()
        };
        let order: Vec<_> = profile.characteristics().map(|(_, c)| c.as_u128()).collect();
        assert_eq!(order, vec![10, 11, 20]);
    }
}
