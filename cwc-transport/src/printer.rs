//! PrinterDevice middleware for watching robot traffic
//!
//! Wraps any [`Device`] and prints every outbound write and inbound chunk
//! passing through it.
//!
//! # Example
//!
//! ```ignore
//! use cwc_transport::{MockDevice, PrinterConfig, PrinterDevice};
//!
//! let device = Arc::new(MockDevice::new("EV3"));
//! let monitored = PrinterDevice::wrap(device, PrinterConfig::default().with_hex(true));
//! // Now all traffic will be printed
//! ```

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::style::Stylize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{BoxedDevice, DataSink, Device, DeviceInfo, TransportError};

/// Direction filter for selective display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrafficFilter {
    #[default]
    All,
    Outbound,
    Inbound,
}

impl FromStr for TrafficFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "out" | "outbound" | "tx" => Ok(Self::Outbound),
            "in" | "inbound" | "rx" => Ok(Self::Inbound),
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// Configuration for the PrinterDevice
#[derive(Debug, Clone, Default)]
pub struct PrinterConfig {
    /// Show raw hex dump instead of a byte count
    pub show_hex: bool,
    /// Filter for selective display
    pub filter: TrafficFilter,
}

impl PrinterConfig {
    pub fn with_hex(mut self, show: bool) -> Self {
        self.show_hex = show;
        self
    }

    pub fn with_filter(mut self, filter: TrafficFilter) -> Self {
        self.filter = filter;
        self
    }

    fn shows_outbound(&self) -> bool {
        matches!(self.filter, TrafficFilter::All | TrafficFilter::Outbound)
    }

    fn shows_inbound(&self) -> bool {
        matches!(self.filter, TrafficFilter::All | TrafficFilter::Inbound)
    }

    /// Render one line of traffic
    pub fn format_line(&self, outbound: bool, label: Option<&str>, data: &[u8]) -> String {
        let arrow = if outbound {
            ">>>".green().to_string()
        } else {
            "<<<".cyan().to_string()
        };
        let label = label.map(|l| format!(" [{}]", l)).unwrap_or_default();
        let body = if self.show_hex {
            hex_dump(data)
        } else {
            format!("{} bytes", data.len())
        };
        format!("{}{} {}", arrow, label, body)
    }
}

/// Space-separated uppercase hex
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Device middleware that prints all traffic
pub struct PrinterDevice {
    inner: BoxedDevice,
    config: Arc<PrinterConfig>,
}

impl PrinterDevice {
    /// Wrap a device with printing middleware
    pub fn wrap(device: BoxedDevice, config: PrinterConfig) -> BoxedDevice {
        Arc::new(Self {
            inner: device,
            config: Arc::new(config),
        })
    }

    fn print_outbound(&self, label: Option<&str>, data: &[u8]) {
        if self.config.shows_outbound() {
            println!("{}", self.config.format_line(true, label, data));
        }
    }
}

#[async_trait]
impl Device for PrinterDevice {
    fn info(&self) -> &DeviceInfo {
        self.inner.info()
    }

    async fn connect(&self) -> Result<(), TransportError> {
        println!(
            "{} {}",
            "connect".yellow(),
            self.inner.info().display_name()
        );
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        println!(
            "{} {}",
            "disconnect".yellow(),
            self.inner.info().display_name()
        );
        self.inner.disconnect().await
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.print_outbound(None, data);
        self.inner.send(data).await
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn reset(&self) -> Result<(), TransportError> {
        self.inner.reset().await
    }

    fn set_data_handler(&self, sink: Option<DataSink>) {
        let Some(outer) = sink else {
            self.inner.set_data_handler(None);
            return;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if config.shows_inbound() {
                    println!("{}", config.format_line(false, None, &chunk));
                }
                if outer.send(chunk).is_err() {
                    break;
                }
            }
        });
        self.inner.set_data_handler(Some(tx));
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), TransportError> {
        self.print_outbound(Some(&uuid.to_string()), data);
        self.inner.write_characteristic(uuid, data).await
    }

    async fn listen(&self, uuid: Uuid) -> Result<(), TransportError> {
        println!("{} {}", "listen".yellow(), uuid);
        self.inner.listen(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockDevice;

    #[test]
    fn test_filter_parse() {
        assert_eq!("rx".parse::<TrafficFilter>().unwrap(), TrafficFilter::Inbound);
        assert_eq!("".parse::<TrafficFilter>().unwrap(), TrafficFilter::All);
        assert!("sideways".parse::<TrafficFilter>().is_err());
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0xFF, 0x55, 0x0A]), "FF 55 0A");
        let line = PrinterConfig::default().with_hex(true).format_line(true, None, &[0x01]);
        assert!(line.ends_with(" 01"));
    }

    #[tokio::test]
    async fn test_forwards_inbound_and_outbound() {
        let mock = Arc::new(MockDevice::new("EV3"));
        let printer = PrinterDevice::wrap(mock.clone(), PrinterConfig::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        printer.set_data_handler(Some(tx));
        printer.connect().await.unwrap();
        printer.send(&[0x01, 0x02]).await.unwrap();
        assert_eq!(mock.sent_frames(), vec![vec![0x01, 0x02]]);

        assert!(mock.inject(&[0xAA]));
        assert_eq!(rx.recv().await, Some(vec![0xAA]));

        mock.simulate_drop();
        assert_eq!(rx.recv().await, None);
    }
}
