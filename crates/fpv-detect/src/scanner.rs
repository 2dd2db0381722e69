//! Serial port scanner
//!
//! Lists serial ports that may carry a SiK or ELRS radio.

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;

/// A serial port that could host a serial radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    /// True for USB serial adapters
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these
    pub skip_patterns: Vec<String>,
    /// Keep only USB adapters
    pub usb_only: bool,
}

/// Serial port scanner
pub struct SerialScanner {
    config: ScannerConfig,
}

impl SerialScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    "Bluetooth".to_string(),
                    "debug".to_string(),
                    // Console and on-board UARTs
                    "ttyS".to_string(),
                    "ttyAMA".to_string(),
                ],
                usb_only: false,
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate candidate serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;
        let result = self.filter(
            ports
                .into_iter()
                .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
                .collect(),
        );
        info!("Found {} candidate serial port(s)", result.len());
        Ok(result)
    }

    fn filter(&self, ports: Vec<SerialPortInfo>) -> Vec<SerialPortInfo> {
        ports
            .into_iter()
            .filter(|p| !self.config.usb_only || p.is_usb())
            .filter(|p| {
                !self
                    .config
                    .skip_patterns
                    .iter()
                    .any(|pattern| p.port.contains(pattern))
            })
            .collect()
    }
}

impl Default for SerialScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6015,
            serial_number: None,
            manufacturer: Some("FTDI".to_string()),
            product: Some("FT231X".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb_info);
        assert!(info.is_usb());
        assert_eq!(info.pid, Some(0x6015));
        assert_eq!(info.product.as_deref(), Some("FT231X"));
    }

    #[test]
    fn test_filter_skips_console() {
        let scanner = SerialScanner::new();
        let ports = vec![
            SerialPortInfo::from_serialport("/dev/ttyS0".into(), &SerialPortType::Unknown),
            SerialPortInfo::from_serialport("/dev/ttyACM0".into(), &SerialPortType::Unknown),
        ];
        let kept = scanner.filter(ports);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].port, "/dev/ttyACM0");
    }

    #[test]
    fn test_usb_only() {
        let scanner = SerialScanner::with_config(ScannerConfig {
            usb_only: true,
            ..Default::default()
        });
        let ports = vec![SerialPortInfo::from_serialport(
            "/dev/ttyACM0".into(),
            &SerialPortType::Unknown,
        )];
        assert!(scanner.filter(ports).is_empty());
    }
}
