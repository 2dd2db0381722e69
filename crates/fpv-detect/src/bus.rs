//! I2C bus probing
//!
//! Presence scanning of the shared I2C buses. The scan itself is delegated to
//! the `i2cdetect` utility; this module owns the address windows, the
//! per-bus presence map and output parsing.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use fpv_protocol::devices::{
    ADDRESS_CSI_CAMERA, ADDRESS_HDMI, ADDRESS_PICO_EXTENDER, ADDRESS_VEYE_CAMERA,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::DetectError;

/// Bus numbers probed for presence
pub const CANDIDATE_BUSES: [u8; 12] = [0, 1, 2, 3, 10, 11, 12, 13, 20, 21, 22, 23];

/// More devices than this on one bus is treated as line noise
pub const MAX_PLAUSIBLE_DEVICES: usize = 50;

/// Inclusive range of bus addresses scanned in one utility call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub first: u8,
    pub last: u8,
}

impl AddressWindow {
    /// Window covering a single address
    pub fn single(address: u8) -> Self {
        Self {
            first: address,
            last: address,
        }
    }

    /// True if the address is inside the window
    pub fn contains(&self, address: u8) -> bool {
        (self.first..=self.last).contains(&address)
    }
}

/// Class of board the scan runs on; some boards get a narrower scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoardClass {
    #[default]
    Generic,
    /// Raspberry Pi 4: bus 0 is the camera bus and only carries a few
    /// well-known devices
    Pi4,
}

/// Address windows to scan on a bus
///
/// The full scan covers 0x03..=0x77 in eight 16-address windows (reserved
/// addresses at both ends are skipped).
pub fn scan_windows(board: BoardClass, bus: u8) -> Vec<AddressWindow> {
    if board == BoardClass::Pi4 && bus == 0 {
        return [
            ADDRESS_HDMI,
            ADDRESS_CSI_CAMERA,
            ADDRESS_VEYE_CAMERA,
            ADDRESS_PICO_EXTENDER,
        ]
        .into_iter()
        .map(AddressWindow::single)
        .collect();
    }

    (0u8..8)
        .map(|k| AddressWindow {
            first: if k == 0 { 0x03 } else { k * 16 },
            last: if k == 7 { 0x77 } else { k * 16 + 15 },
        })
        .collect()
}

/// One probed bus and the devices seen on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusInfo {
    /// Bus number (N in /dev/i2c-N)
    pub number: u8,
    /// Display name
    pub name: String,
    /// Presence bitmap, bit N set when address N answered
    pub present: u128,
    /// Version reported by the Pico extender, if one answered on this bus
    pub pico_extender_version: Option<(u8, u8)>,
}

impl BusInfo {
    /// An empty record for a bus
    pub fn new(number: u8) -> Self {
        Self {
            number,
            name: format!("i2c-{}", number),
            present: 0,
            pico_extender_version: None,
        }
    }

    /// True if a device answered at the address
    pub fn has_device(&self, address: u8) -> bool {
        address < 128 && self.present & (1u128 << address) != 0
    }

    /// Mark an address as present
    pub fn mark_present(&mut self, address: u8) {
        if address < 128 {
            self.present |= 1u128 << address;
        }
    }

    /// Addresses that answered, ascending
    pub fn devices(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..128).filter(move |a| self.has_device(*a))
    }

    /// Number of addresses that answered
    pub fn device_count(&self) -> usize {
        self.present.count_ones() as usize
    }
}

/// Access to the bus scanning primitive
pub trait BusProbe {
    /// Bus numbers worth probing
    fn candidate_buses(&self) -> Vec<u8> {
        CANDIDATE_BUSES.to_vec()
    }

    /// True if the bus exists on this system
    fn bus_present(&self, bus: u8) -> bool;

    /// Addresses in the window that answered
    fn scan(&mut self, bus: u8, window: AddressWindow) -> Result<Vec<u8>, DetectError>;
}

/// Configuration for the shell bus probe
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Scan utility to run
    pub command: String,
    /// Directory holding the bus device nodes
    pub device_dir: String,
    /// Time allowed per utility invocation
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            command: "i2cdetect".to_string(),
            device_dir: "/dev".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Bus probe that runs `i2cdetect`
pub struct ShellBusProbe {
    config: ScanConfig,
}

impl ShellBusProbe {
    /// Create a probe with default configuration
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    /// Create a probe with custom configuration
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }
}

impl Default for ShellBusProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl BusProbe for ShellBusProbe {
    fn bus_present(&self, bus: u8) -> bool {
        Path::new(&self.config.device_dir)
            .join(format!("i2c-{}", bus))
            .exists()
    }

    fn scan(&mut self, bus: u8, window: AddressWindow) -> Result<Vec<u8>, DetectError> {
        let args = vec![
            "-y".to_string(),
            bus.to_string(),
            format!("0x{:02X}", window.first),
            format!("0x{:02X}", window.last),
        ];
        let output = run_with_timeout(&self.config.command, &args, self.config.timeout)?;
        let found = parse_scan_output(&output, window);
        trace!(
            "i2c-{} window 0x{:02X}..0x{:02X}: {:02X?}",
            bus,
            window.first,
            window.last,
            found
        );
        Ok(found)
    }
}

/// Extract answering addresses from `i2cdetect` grid output
///
/// Only rows of the form `NN: cell cell ...` are considered. Cells holding
/// `--` (no answer) or `UU` (claimed by a kernel driver) are skipped, and
/// anything outside the window is dropped.
pub fn parse_scan_output(output: &str, window: AddressWindow) -> Vec<u8> {
    let mut found = Vec::new();
    for line in output.lines() {
        let Some((label, cells)) = line.split_once(':') else {
            continue;
        };
        if u8::from_str_radix(label.trim(), 16).is_err() {
            continue;
        }
        for cell in cells.split_whitespace() {
            if cell.len() != 2 {
                continue;
            }
            if let Ok(address) = u8::from_str_radix(cell, 16) {
                if address < 128 && window.contains(address) && !found.contains(&address) {
                    found.push(address);
                }
            }
        }
    }
    found
}

/// Run an external utility, killing it if it outlives the timeout
pub(crate) fn run_with_timeout(
    command: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String, DetectError> {
    let rendered = format!("{} {}", command, args.join(" "));
    debug!("Running {}", rendered);

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DetectError::CommandFailed {
            command: rendered.clone(),
            reason: e.to_string(),
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            break;
        }
        if Instant::now() >= deadline {
            warn!("{} did not finish in {:?}, killing it", rendered, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(DetectError::Timeout {
                command: rendered,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(DetectError::CommandFailed {
            command: rendered,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
00:                         -- -- -- -- -- -- -- --
10: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
20: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
30: -- -- -- -- -- -- 36 -- -- -- -- -- -- -- -- --
40: 40 -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
50: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
60: -- -- -- -- -- -- -- -- -- -- -- -- -- 6d UU --
70: -- -- -- -- -- -- -- --
";

    #[test]
    fn test_parse_full_grid() {
        let window = AddressWindow {
            first: 0x03,
            last: 0x77,
        };
        assert_eq!(parse_scan_output(SAMPLE, window), vec![0x36, 0x40, 0x6D]);
    }

    #[test]
    fn test_parse_respects_window() {
        let window = AddressWindow {
            first: 0x60,
            last: 0x6F,
        };
        assert_eq!(parse_scan_output(SAMPLE, window), vec![0x6D]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_scan_output("", AddressWindow::single(0x36)).is_empty());
    }

    #[test]
    fn test_scan_windows_full() {
        let windows = scan_windows(BoardClass::Generic, 1);
        assert_eq!(windows.len(), 8);
        assert_eq!(windows[0], AddressWindow { first: 0x03, last: 0x0F });
        assert_eq!(windows[7], AddressWindow { first: 0x70, last: 0x77 });
    }

    #[test]
    fn test_scan_windows_pi4_fast_path() {
        let windows = scan_windows(BoardClass::Pi4, 0);
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| w.first == w.last));
        assert_eq!(scan_windows(BoardClass::Pi4, 1).len(), 8);
    }

    #[test]
    fn test_bus_info_presence() {
        let mut bus = BusInfo::new(1);
        assert_eq!(bus.name, "i2c-1");
        bus.mark_present(0x40);
        bus.mark_present(0x77);
        bus.mark_present(0x90);
        assert!(bus.has_device(0x40));
        assert!(!bus.has_device(0x41));
        assert_eq!(bus.device_count(), 2);
        assert_eq!(bus.devices().collect::<Vec<_>>(), vec![0x40, 0x77]);
    }

    #[test]
    fn test_missing_command_fails() {
        let result = run_with_timeout(
            "definitely-not-a-real-i2c-tool",
            &[],
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(DetectError::CommandFailed { .. })));
    }
}
