//! Radio link records and data rate encoding

use std::fmt;

use fpv_protocol::{CapabilityFlags, RadioFrameFlags};
use serde::{Deserialize, Serialize};

/// Default video rate, Mbps
pub const DEFAULT_VIDEO_DATA_RATE: DataRate = DataRate(18);
/// Default data rate for WiFi links, Mbps
pub const DEFAULT_DATA_DATA_RATE: DataRate = DataRate(6);
/// Lowest usable rate, used when a data rate type asks for it
pub const DEFAULT_LOWEST_DATA_RATE: DataRate = DataRate(2_000_000);
/// Air rate of SiK radios, bps
pub const DEFAULT_SIK_AIR_RATE: DataRate = DataRate(64_000);
/// Air rate of generic serial radios, bps
pub const DEFAULT_SERIAL_AIR_RATE: DataRate = DataRate(9_600);

/// Default per-link serial packet size
pub const DEFAULT_SERIAL_PACKET_SIZE: u32 = 100;
/// Smallest accepted serial packet size
pub const MIN_SERIAL_PACKET_SIZE: u32 = 10;
/// Largest accepted serial packet size
pub const MAX_SERIAL_PACKET_SIZE: u32 = 250;

const MCS_RATES_KBPS: [u32; 8] = [6_500, 13_000, 19_500, 26_000, 39_000, 52_000, 58_500, 65_000];

/// Encoded radio data rate
///
/// `0` lets the radio pick, negative values are MCS indexes (`-1` is MCS 0),
/// values in `1..100` are Mbps and anything larger is bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DataRate(pub i32);

impl DataRate {
    pub const AUTO: DataRate = DataRate(0);

    /// MCS rate for an index
    pub fn mcs(index: u8) -> Self {
        DataRate(-(i32::from(index) + 1))
    }

    /// True for MCS encoded rates
    pub fn is_mcs(&self) -> bool {
        self.0 < 0
    }

    /// Effective rate in bits per second (0 for auto)
    pub fn bps(&self) -> u32 {
        match self.0 {
            0 => 0,
            v if v < 0 => {
                let index = ((v.unsigned_abs() - 1) as usize).min(MCS_RATES_KBPS.len() - 1);
                MCS_RATES_KBPS[index] * 1000
            }
            v if v < 100 => v as u32 * 1_000_000,
            v => v as u32,
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "auto"),
            v if v < 0 => write!(f, "MCS-{}", v.unsigned_abs() - 1),
            _ => {
                let bps = self.bps();
                if bps >= 1_000_000 {
                    write!(f, "{:.1} Mbps", bps as f64 / 1_000_000.0)
                } else {
                    write!(f, "{} kbps", bps / 1000)
                }
            }
        }
    }
}

/// How a link picks its data (non-video) rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataRateType {
    #[default]
    Auto = 0,
    Fixed = 1,
    Lowest = 2,
    SameAsVideo = 3,
}

impl DataRateType {
    /// Decode a persisted code; unknown codes map to `Auto`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => DataRateType::Fixed,
            2 => DataRateType::Lowest,
            3 => DataRateType::SameAsVideo,
            _ => DataRateType::Auto,
        }
    }
}

/// A logical radio channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioLink {
    /// kHz, unique among the links of a model
    pub frequency_khz: u32,
    pub capabilities: CapabilityFlags,
    pub frame_flags: RadioFrameFlags,
    pub video_rate: DataRate,
    pub data_rate: DataRate,
    pub uplink_video_rate: DataRate,
    pub uplink_data_rate: DataRate,
    pub uplink_rate_type: DataRateType,
    pub downlink_rate_type: DataRateType,
    pub serial_packet_size: u32,
}

impl Default for RadioLink {
    fn default() -> Self {
        let mut link = Self {
            frequency_khz: 0,
            capabilities: CapabilityFlags::empty(),
            frame_flags: RadioFrameFlags::default(),
            video_rate: DataRate::AUTO,
            data_rate: DataRate::AUTO,
            uplink_video_rate: DataRate::AUTO,
            uplink_data_rate: DataRate::AUTO,
            uplink_rate_type: DataRateType::Auto,
            downlink_rate_type: DataRateType::Auto,
            serial_packet_size: DEFAULT_SERIAL_PACKET_SIZE,
        };
        link.reset();
        link
    }
}

impl RadioLink {
    /// Reset rates and flags to WiFi defaults, keeping the frequency
    pub fn reset(&mut self) {
        self.frame_flags = RadioFrameFlags::default();
        self.capabilities = CapabilityFlags::VIDEO
            | CapabilityFlags::DATA
            | CapabilityFlags::RX
            | CapabilityFlags::TX;
        self.video_rate = DEFAULT_VIDEO_DATA_RATE;
        self.data_rate = DEFAULT_DATA_DATA_RATE;
        self.uplink_video_rate = self.video_rate;
        self.uplink_data_rate = self.data_rate;
        self.uplink_rate_type = DataRateType::Auto;
        self.downlink_rate_type = DataRateType::Auto;
        self.serial_packet_size = DEFAULT_SERIAL_PACKET_SIZE;
    }

    /// Set every rate (downlink and uplink, video and data) to one value
    pub fn set_all_rates(&mut self, rate: DataRate) {
        self.video_rate = rate;
        self.data_rate = rate;
        self.uplink_video_rate = rate;
        self.uplink_data_rate = rate;
    }

    pub fn is_high_capacity(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::HIGH_CAPACITY)
    }

    pub fn is_relay(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::RELAY)
    }
}
