//! SiK radio probing
//!
//! SiK telemetry radios are identified over their serial port with the
//! Hayes-style AT command set: `+++` enters command mode, `ATIn` and
//! `ATSn?` read identification and registers, `ATO` leaves command mode.

use std::time::Duration;

use fpv_protocol::radio::MAX_MAC_LENGTH;
use fpv_protocol::{Band, HardwareRadio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// Firmware marker for current SiK releases
const CURRENT_FIRMWARE_MARKER: &str = "SiK 2.2";

/// Identification read from a SiK radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SikRadioInfo {
    /// `ATI` banner
    pub description: String,
    /// Firmware predates the current release line
    pub firmware_old: bool,
    /// Identifier built from the `ATI1..ATI4` answers and the band
    pub identifier: String,
    /// Lowest tunable frequency, kHz (`ATS8?`)
    pub min_frequency_khz: Option<u32>,
    /// Band the radio is built for
    pub band: Band,
}

impl SikRadioInfo {
    /// Hardware description for the radio on `port`
    pub fn into_hardware_radio(self, port: &str) -> HardwareRadio {
        let mut radio = HardwareRadio::sik(port, self.band);
        radio.mac = self.identifier;
        if let Some(freq) = self.min_frequency_khz {
            radio.current_frequency_khz = freq;
        }
        radio
    }
}

/// Band for a SiK minimum frequency register value
pub fn band_for_min_frequency(freq_khz: u32) -> Band {
    if freq_khz < 500_000 {
        Band::B433
    } else if freq_khz < 890_000 {
        Band::B868
    } else {
        Band::B915
    }
}

const SERIAL_BAUD_CODES: [(u32, u32); 18] = [
    (1, 1_200),
    (2, 2_400),
    (4, 4_800),
    (8, 8_000),
    (9, 9_600),
    (16, 16_000),
    (19, 19_200),
    (24, 24_000),
    (32, 32_000),
    (38, 38_400),
    (48, 48_000),
    (57, 57_600),
    (64, 64_000),
    (96, 96_000),
    (111, 111_200),
    (115, 115_200),
    (128, 128_000),
    (250, 250_000),
];

/// Serial baud rate for a SiK `SERIAL_SPEED` register code (57600 if unknown)
pub fn sik_baudrate_for_code(code: u32) -> u32 {
    SERIAL_BAUD_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, baud)| *baud)
        .unwrap_or(57_600)
}

/// Register code for a serial baud rate (the smallest code that covers it)
pub fn sik_code_for_baudrate(baud: u32) -> u32 {
    SERIAL_BAUD_CODES
        .iter()
        .find(|(_, b)| baud <= *b)
        .map(|(code, _)| *code)
        .unwrap_or(57)
}

/// Air data rate in bps for a SiK `AIR_SPEED` register value
pub fn sik_air_rate_bps(code: u32) -> u32 {
    code * 1000
}

/// Configuration for SiK probing
#[derive(Debug, Clone)]
pub struct SikProbeConfig {
    /// Timeout for each command reply
    pub timeout: Duration,
    /// Silence required around `+++`
    pub guard_time: Duration,
}

impl Default for SikProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            guard_time: Duration::from_millis(1100),
        }
    }
}

/// SiK radio prober
pub struct SikProber {
    config: SikProbeConfig,
}

impl SikProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: SikProbeConfig::default(),
        }
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: SikProbeConfig) -> Self {
        Self { config }
    }

    /// Probe a stream for a SiK radio
    pub async fn probe<S>(&self, stream: &mut S) -> Option<SikRadioInfo>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.enter_command_mode(stream).await {
            debug!("No SiK radio answered +++");
            return None;
        }

        let description = self.command(stream, "ATI").await?;
        let firmware_old = !description.contains(CURRENT_FIRMWARE_MARKER);
        if firmware_old {
            warn!("SiK radio firmware is old: [{}]", description);
        }

        let mut parts = Vec::with_capacity(5);
        for cmd in ["ATI1", "ATI2", "ATI3", "ATI4"] {
            let answer = self.command(stream, cmd).await;
            parts.push(answer.unwrap_or_else(|| "X".to_string()));
        }

        let min_frequency_khz = self
            .command(stream, "ATS8?")
            .await
            .and_then(|s| s.trim().parse::<u32>().ok());
        let band = match min_frequency_khz {
            Some(freq) => {
                let band = band_for_min_frequency(freq);
                parts.push(band.label().to_string());
                band
            }
            None => {
                parts.push("NNN".to_string());
                Band::B433
            }
        };

        let identifier: String = parts.join("-").chars().take(MAX_MAC_LENGTH - 1).collect();
        info!("SiK radio [{}] id {}", description, identifier);

        if let Err(e) = stream.write_all(b"ATO\r\n").await {
            warn!("Failed to leave SiK command mode: {}", e);
        }

        Some(SikRadioInfo {
            description,
            firmware_old,
            identifier,
            min_frequency_khz,
            band,
        })
    }

    /// Send `+++` and wait for `OK`
    async fn enter_command_mode<S>(&self, stream: &mut S) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tokio::time::sleep(self.config.guard_time).await;
        trace!("Sending +++");
        if let Err(e) = stream.write_all(b"+++").await {
            warn!("Failed to write +++: {}", e);
            return false;
        }

        let mut collected = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match timeout(self.config.timeout, stream.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => {
                    collected.extend_from_slice(&buf[..n]);
                    if String::from_utf8_lossy(&collected).contains("OK") {
                        return true;
                    }
                }
                Ok(Ok(_)) => return false,
                Ok(Err(e)) => {
                    trace!("+++ read error: {}", e);
                    return false;
                }
                Err(_) => {
                    trace!("+++ timeout");
                    return false;
                }
            }
        }
    }

    /// Send an AT command and return the first non-echo reply line
    async fn command<S>(&self, stream: &mut S, cmd: &str) -> Option<String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        trace!("Sending {}", cmd);
        if let Err(e) = stream.write_all(format!("{}\r\n", cmd).as_bytes()).await {
            warn!("Failed to write {}: {}", cmd, e);
            return None;
        }

        let mut collected = String::new();
        let mut buf = [0u8; 128];
        loop {
            match timeout(self.config.timeout, stream.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => {
                    collected.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if let Some(reply) = first_reply_line(&collected, cmd) {
                        trace!("{} -> {}", cmd, reply);
                        return Some(reply);
                    }
                }
                Ok(Ok(_)) => break,
                Ok(Err(e)) => {
                    trace!("{} read error: {}", cmd, e);
                    break;
                }
                Err(_) => {
                    trace!("{} timeout", cmd);
                    break;
                }
            }
        }
        None
    }
}

impl Default for SikProber {
    fn default() -> Self {
        Self::new()
    }
}

/// First complete line that is not the echoed command
fn first_reply_line(collected: &str, cmd: &str) -> Option<String> {
    let complete = &collected[..collected.rfind('\n')?];
    complete
        .split('\n')
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && *l != cmd)
        .map(str::to_string)
}

/// Probe a serial port for a SiK radio at a given baud rate
pub async fn probe_sik_port(port_name: &str, baud_rate: u32) -> Option<HardwareRadio> {
    use tokio_serial::SerialPortBuilderExt;

    debug!("Probing {} at {} baud for a SiK radio", port_name, baud_rate);

    let mut stream = match tokio_serial::new(port_name, baud_rate)
        .timeout(Duration::from_millis(100))
        .open_native_async()
    {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to open {}: {}", port_name, e);
            return None;
        }
    };

    let prober = SikProber::new();
    prober
        .probe(&mut stream)
        .await
        .map(|info| info.into_hardware_radio(port_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    fn fast_prober() -> SikProber {
        SikProber::with_config(SikProbeConfig {
            timeout: Duration::from_millis(200),
            guard_time: Duration::from_millis(1),
        })
    }

    /// Answer AT commands like a 433 MHz radio
    async fn fake_radio(mut io: DuplexStream, min_freq: &'static str) {
        let mut pending = String::new();
        let mut buf = [0u8; 64];
        loop {
            let n = match io.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            pending.push_str(&String::from_utf8_lossy(&buf[..n]));
            if pending.contains("+++") {
                pending.clear();
                let _ = io.write_all(b"OK\r\n").await;
                continue;
            }
            while let Some(end) = pending.find("\r\n") {
                let cmd = pending[..end].to_string();
                pending.drain(..end + 2);
                let reply = match cmd.as_str() {
                    "ATI" => "SiK 2.2 on HM-TRP".to_string(),
                    "ATI1" => "1".to_string(),
                    "ATI2" => "130".to_string(),
                    "ATI3" => "67".to_string(),
                    "ATI4" => "8".to_string(),
                    "ATS8?" => min_freq.to_string(),
                    "ATO" => return,
                    _ => "ERROR".to_string(),
                };
                let _ = io.write_all(format!("{}\r\n{}\r\n", cmd, reply).as_bytes()).await;
            }
        }
    }

    #[test]
    fn test_baud_code_table() {
        assert_eq!(sik_baudrate_for_code(57), 57_600);
        assert_eq!(sik_baudrate_for_code(115), 115_200);
        assert_eq!(sik_baudrate_for_code(3), 57_600);
        assert_eq!(sik_code_for_baudrate(9_600), 9);
        assert_eq!(sik_code_for_baudrate(10_000), 16);
        assert_eq!(sik_code_for_baudrate(500_000), 57);
        assert_eq!(sik_air_rate_bps(64), 64_000);
    }

    #[test]
    fn test_band_for_min_frequency() {
        assert_eq!(band_for_min_frequency(433_050), Band::B433);
        assert_eq!(band_for_min_frequency(863_000), Band::B868);
        assert_eq!(band_for_min_frequency(902_000), Band::B915);
    }

    #[test]
    fn test_first_reply_line_skips_echo() {
        assert_eq!(first_reply_line("ATI2\r\n", "ATI2"), None);
        assert_eq!(first_reply_line("ATI2\r\n130\r\n", "ATI2"), Some("130".into()));
        assert_eq!(first_reply_line("ATI2\r\n13", "ATI2"), None);
    }

    #[tokio::test]
    async fn test_probe_identifies_radio() {
        let (mut ours, theirs) = duplex(1024);
        tokio::spawn(fake_radio(theirs, "433050"));

        let info = fast_prober().probe(&mut ours).await.unwrap();
        assert!(!info.firmware_old);
        assert_eq!(info.band, Band::B433);
        assert_eq!(info.identifier, "1-130-67-8-433");
        assert_eq!(info.min_frequency_khz, Some(433_050));

        let hw = info.into_hardware_radio("/dev/ttyUSB0");
        assert!(hw.is_sik());
        assert_eq!(hw.supported_bands, Band::B433);
        assert_eq!(hw.current_frequency_khz, 433_050);
    }

    #[tokio::test]
    async fn test_probe_silent_port() {
        let (mut ours, _theirs) = duplex(64);
        assert!(fast_prober().probe(&mut ours).await.is_none());
    }
}
