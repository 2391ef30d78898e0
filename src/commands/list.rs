//! Device and command listing.

use cwc_robots::{Family, DEFAULT_BAUD_RATE};
use cwc_transport::{BleDiscovery, BleProfile, DeviceDiscovery, SerialDiscovery};
use crossterm::style::Stylize;

use super::CommandResult;
use cwc_driver::config::Config;

/// List serial ports, then BLE peripherals when a scan is possible
pub async fn list(config: &Config) -> CommandResult {
    println!("Serial ports:");
    let serial = SerialDiscovery::new(config.baud_rate_for(DEFAULT_BAUD_RATE));
    let ports = serial.list_devices().await?;
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!(
            "  {:<24} {:<10} {}",
            port.info.path,
            port.info.transport_type.label(),
            port.info.name.as_deref().unwrap_or("")
        );
    }

    println!("\nBluetooth LE ({} ms scan):", config.ble_scan_ms);
    let ble = match BleDiscovery::new(BleProfile::default(), config.ble_scan()).await {
        Ok(ble) => ble,
        Err(e) => {
            println!("  {}", format!("unavailable: {e}").yellow());
            return Ok(());
        }
    };
    let peripherals = ble.list_devices().await?;
    if peripherals.is_empty() {
        println!("  (none)");
    }
    for peripheral in peripherals {
        let rssi = peripheral
            .info
            .rssi
            .map(|r| format!("{r} dBm"))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<24} {}",
            peripheral.info.path,
            peripheral.info.display_name(),
            rssi
        );
    }
    Ok(())
}

/// Print the handler table of a family
pub fn commands(robot: Family) -> CommandResult {
    println!("{} commands:", robot.to_string().bold());
    for name in robot.command_names() {
        println!("  {name}");
    }
    Ok(())
}
