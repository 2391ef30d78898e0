//! Choosing the device a connection talks to
//!
//! Precedence: `--dry-run` (in-memory mock), `--port`, `--ble` scanning,
//! then the configured serial port, then serial auto-discovery by the
//! robot's advertised name. Flags always beat the config file.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use cwc_robots::{AutoDiscover, DeviceResolver, FixedDevice, RobotProtocol};
use cwc_transport::{
    BleDiscovery, BoxedDevice, DeviceInfo, MockDevice, PrinterConfig, PrinterDevice,
    SerialDevice, SerialDiscovery, TransportError, TransportType,
};
use tracing::debug;

use crate::config::Config;

/// Where the CLI should look for the robot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    DryRun,
    Port(String),
    Ble,
    Auto,
}

impl DeviceTarget {
    pub fn from_flags(dry_run: bool, port: Option<String>, ble: bool, config: &Config) -> Self {
        if dry_run {
            return Self::DryRun;
        }
        match (port, ble) {
            (Some(port), _) => Self::Port(port),
            (None, true) => Self::Ble,
            (None, false) => match &config.serial_port {
                Some(port) => Self::Port(port.clone()),
                None => Self::Auto,
            },
        }
    }
}

/// Transport recorded for a tty: RFCOMM nodes and robots that only pair over
/// Bluetooth classic are wireless, anything else is a plain serial line
fn port_transport(path: &str, robot: TransportType) -> TransportType {
    if path.contains("rfcomm") || robot == TransportType::BluetoothClassic {
        TransportType::BluetoothClassic
    } else {
        TransportType::Serial
    }
}

/// Wraps whatever another resolver yields in the traffic printer
struct Printed {
    inner: Arc<dyn DeviceResolver>,
    config: PrinterConfig,
}

#[async_trait]
impl DeviceResolver for Printed {
    async fn resolve(&self) -> Result<BoxedDevice, TransportError> {
        let device = self.inner.resolve().await?;
        Ok(PrinterDevice::wrap(device, self.config.clone()))
    }
}

pub async fn resolver<P: RobotProtocol>(
    protocol: &P,
    target: &DeviceTarget,
    config: &Config,
    printer: Option<PrinterConfig>,
) -> anyhow::Result<Arc<dyn DeviceResolver>> {
    let name = protocol.auto_connect_name();
    let baud_rate = config.baud_rate_for(protocol.baud_rate());
    let resolver: Arc<dyn DeviceResolver> = match target {
        DeviceTarget::DryRun => {
            let device = if protocol.transport() == TransportType::BluetoothLe {
                MockDevice::new_ble(name)
            } else {
                MockDevice::new(name)
            };
            Arc::new(FixedDevice::new(Arc::new(device)))
        }
        DeviceTarget::Port(path) => {
            let info = DeviceInfo::new(port_transport(path, protocol.transport()), path.clone());
            Arc::new(FixedDevice::new(Arc::new(SerialDevice::new(info, baud_rate))))
        }
        DeviceTarget::Ble => {
            let Some(profile) = protocol.ble_profile() else {
                bail!("{} robots are not reachable over Bluetooth LE", protocol.family());
            };
            let discovery = BleDiscovery::new(profile, config.ble_scan()).await?;
            Arc::new(AutoDiscover::new(Arc::new(discovery), name))
        }
        DeviceTarget::Auto => {
            let discovery = SerialDiscovery::new(baud_rate);
            Arc::new(AutoDiscover::new(Arc::new(discovery), name))
        }
    };
    debug!("Resolving {} via {:?}", protocol.family(), target);

    Ok(match printer {
        Some(config) => Arc::new(Printed {
            inner: resolver,
            config,
        }),
        None => resolver,
    })
}
