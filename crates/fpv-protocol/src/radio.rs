//! Radio hardware vocabulary
//!
//! Bands, capability flags, radio types and card models shared by the
//! hardware detection layer and the persisted model, plus the frequency
//! helpers used when choosing defaults.

use bitflags::bitflags;

/// Maximum number of radio interfaces a model tracks
pub const MAX_RADIO_INTERFACES: usize = 6;
/// Maximum length of a MAC (or serial port / SPI name) identifier
pub const MAX_MAC_LENGTH: usize = 20;

/// Default raw tx power
pub const DEFAULT_RADIO_TX_POWER: i32 = 40;
/// Highest accepted raw tx power
pub const MAX_RADIO_TX_POWER: i32 = 71;

bitflags! {
    /// Frequency bands a radio can operate in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Band: u32 {
        const B23 = 1;
        const B24 = 1 << 1;
        const B25 = 1 << 2;
        const B58 = 1 << 3;
        const B433 = 1 << 4;
        const B868 = 1 << 5;
        const B915 = 1 << 6;
    }
}

impl Band {
    /// All WiFi bands
    pub const WIFI: Band = Band::B23
        .union(Band::B24)
        .union(Band::B25)
        .union(Band::B58);
    /// All sub-GHz bands
    pub const SUB_GHZ: Band = Band::B433.union(Band::B868).union(Band::B915);

    /// Short display label for a single band
    pub fn label(&self) -> &'static str {
        const LABELS: [(Band, &str); 7] = [
            (Band::B23, "2.3"),
            (Band::B24, "2.4"),
            (Band::B25, "2.5"),
            (Band::B58, "5.8"),
            (Band::B433, "433"),
            (Band::B868, "868"),
            (Band::B915, "915"),
        ];
        LABELS
            .iter()
            .find(|(band, _)| band == self)
            .map(|(_, label)| *label)
            .unwrap_or("mixed")
    }

    /// Labels of every band in the set, e.g. "2.4/5.8"
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }
        self.iter()
            .map(|band| band.label())
            .collect::<Vec<_>>()
            .join("/")
    }
}

bitflags! {
    /// Capability flags shared by radio interfaces and radio links
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CapabilityFlags: u32 {
        const VIDEO = 1;
        const DATA = 1 << 2;
        const RELAY = 1 << 4;
        const RX = 1 << 5;
        const TX = 1 << 6;
        const DISABLED = 1 << 7;
        const HIGH_CAPACITY = 1 << 9;
        const SERIAL_LINK = 1 << 10;
        const SIK = 1 << 11;
        const ELRS = 1 << 12;
        const BOOSTER_2W = 1 << 13;
        const BOOSTER_4W = 1 << 14;
    }
}

impl CapabilityFlags {
    /// Every serial-link related bit
    pub const SERIAL_ANY: CapabilityFlags = CapabilityFlags::SERIAL_LINK
        .union(CapabilityFlags::SIK)
        .union(CapabilityFlags::ELRS);
}

bitflags! {
    /// Radio frame flags carried by links and mirrored on their interfaces
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RadioFrameFlags: u32 {
        const LEGACY_DATARATES = 1 << 6;
        const MCS_DATARATES = 1 << 7;
    }
}

impl Default for RadioFrameFlags {
    fn default() -> Self {
        RadioFrameFlags::LEGACY_DATARATES
    }
}

/// Radio chipset family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioType {
    #[default]
    Other = 0,
    Ralink = 1,
    Atheros = 2,
    Realtek = 3,
    Mediatek = 4,
    Sik = 5,
    Serial = 6,
}

impl RadioType {
    /// Decode a raw type code; unknown codes map to `Other`
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => RadioType::Ralink,
            2 => RadioType::Atheros,
            3 => RadioType::Realtek,
            4 => RadioType::Mediatek,
            5 => RadioType::Sik,
            6 => RadioType::Serial,
            _ => RadioType::Other,
        }
    }

    /// WiFi class chipsets (everything that is not a serial radio)
    pub fn is_wifi(&self) -> bool {
        !matches!(self, RadioType::Sik | RadioType::Serial)
    }
}

/// Kernel driver bound to a radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioDriver {
    #[default]
    Unknown = 0,
    /// ath9k_htc
    Atheros = 1,
    /// rt2800usb
    Ralink = 2,
    /// mt7601u
    Mediatek = 3,
    Rtl88xxau = 4,
    Rtl8812au = 5,
    Realtek8812au = 6,
    Rtl88x2bu = 7,
    SerialSik = 8,
    Serial = 9,
    Realtek8812eu = 10,
    Realtek8733bu = 15,
}

impl RadioDriver {
    /// Decode a raw driver code; unknown codes map to `Unknown`
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => RadioDriver::Atheros,
            2 => RadioDriver::Ralink,
            3 => RadioDriver::Mediatek,
            4 => RadioDriver::Rtl88xxau,
            5 => RadioDriver::Rtl8812au,
            6 => RadioDriver::Realtek8812au,
            7 => RadioDriver::Rtl88x2bu,
            8 => RadioDriver::SerialSik,
            9 => RadioDriver::Serial,
            10 => RadioDriver::Realtek8812eu,
            15 => RadioDriver::Realtek8733bu,
            _ => RadioDriver::Unknown,
        }
    }
}

/// Bit set in the packed type-and-driver word when the card is supported
pub const TYPE_AND_DRIVER_SUPPORTED: u32 = 0xFF_0000;

/// Pack radio type, driver and support state into a single word
pub fn pack_type_and_driver(radio_type: RadioType, driver: RadioDriver, supported: bool) -> u32 {
    let mut value = (radio_type as u32 & 0xFF) | ((driver as u32 & 0xFF) << 8);
    if supported {
        value |= TYPE_AND_DRIVER_SUPPORTED;
    }
    value
}

/// Unpack a type-and-driver word
pub fn unpack_type_and_driver(value: u32) -> (RadioType, RadioDriver, bool) {
    (
        RadioType::from_code(value & 0xFF),
        RadioDriver::from_code((value >> 8) & 0xFF),
        value & TYPE_AND_DRIVER_SUPPORTED != 0,
    )
}

/// Radio card model code
///
/// Positive values are auto-detected, a negative value records that the
/// user picked the model by hand. Zero is a generic card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CardModel(pub i32);

impl CardModel {
    pub const GENERIC: CardModel = CardModel(0);
    pub const TPLINK_722N: CardModel = CardModel(1);
    pub const ALFA_AWUS036NHA: CardModel = CardModel(2);
    pub const ALFA_AWUS036NH: CardModel = CardModel(3);
    pub const ALFA_AWUS036ACH: CardModel = CardModel(4);
    pub const ASUS_AC56: CardModel = CardModel(5);
    pub const BLUE_STICK: CardModel = CardModel(6);
    pub const RTL8812AU_DUAL_ANTENNA: CardModel = CardModel(7);
    pub const NETGEAR_A6100: CardModel = CardModel(8);
    pub const TENDA_U12: CardModel = CardModel(9);
    pub const RTL8812AU_AF1: CardModel = CardModel(10);
    pub const ZIPRAY: CardModel = CardModel(11);
    pub const ARCHER_T2UPLUS: CardModel = CardModel(12);
    pub const RTL8814AU: CardModel = CardModel(13);
    pub const ALFA_AWUS036ACS: CardModel = CardModel(14);
    pub const BLUE_8812EU: CardModel = CardModel(15);
    pub const ATHEROS_GENERIC: CardModel = CardModel(16);
    pub const RTL8812AU_GENERIC: CardModel = CardModel(17);
    pub const RTL8812AU_OIPC_USIGHT: CardModel = CardModel(18);
    pub const RTL8812AU_OIPC_USIGHT2: CardModel = CardModel(19);
    pub const RTL8733BU: CardModel = CardModel(20);
    pub const SIK_RADIO: CardModel = CardModel(100);
    pub const SERIAL_RADIO: CardModel = CardModel(101);
    pub const SERIAL_RADIO_ELRS: CardModel = CardModel(102);

    /// Model with the user-set marker stripped
    pub fn detected(&self) -> CardModel {
        CardModel(self.0.abs())
    }

    /// True if the user picked this model by hand
    pub fn is_user_set(&self) -> bool {
        self.0 < 0
    }

    /// Human readable model name
    pub fn name(&self) -> &'static str {
        match self.detected().0 {
            1 => "TPLink WN722N",
            2 => "Alfa AWUS036NHA",
            3 => "Alfa AWUS036NH",
            4 => "Alfa AWUS036ACH",
            5 => "ASUS AC56",
            6 => "Blue Stick 8812AU",
            7 => "RTL8812AU Dual Antenna",
            8 => "Netgear A6100",
            9 => "Tenda U12",
            10 => "RTL8812AU AF1",
            11 => "Zipray",
            12 => "Archer T2U Plus",
            13 => "RTL8814AU",
            14 => "Alfa AWUS036ACS",
            15 => "Blue Stick 8812EU",
            16 => "Generic Atheros",
            17 => "Generic RTL8812AU",
            18 => "OIPC USight",
            19 => "OIPC USight 2",
            20 => "RTL8733BU",
            100 => "SiK Radio",
            101 => "Serial Radio",
            102 => "ELRS Radio",
            _ => "Generic",
        }
    }
}

// Default frequencies, kHz
pub const DEFAULT_FREQUENCY_24: u32 = 2_472_000;
pub const DEFAULT_FREQUENCY_24_2: u32 = 2_467_000;
pub const DEFAULT_FREQUENCY_24_3: u32 = 2_437_000;
pub const DEFAULT_FREQUENCY_58: u32 = 5_805_000;
pub const DEFAULT_FREQUENCY_58_2: u32 = 5_745_000;
pub const DEFAULT_FREQUENCY_58_3: u32 = 5_680_000;
pub const DEFAULT_FREQUENCY_433: u32 = 430_000;
pub const DEFAULT_FREQUENCY_868: u32 = 867_000;
pub const DEFAULT_FREQUENCY_915: u32 = 914_000;

/// Ordered default frequencies for the 2.4 GHz band
pub const DEFAULTS_24: [u32; 3] = [
    DEFAULT_FREQUENCY_24,
    DEFAULT_FREQUENCY_24_2,
    DEFAULT_FREQUENCY_24_3,
];
/// Ordered default frequencies for the 5.8 GHz band
pub const DEFAULTS_58: [u32; 3] = [
    DEFAULT_FREQUENCY_58,
    DEFAULT_FREQUENCY_58_2,
    DEFAULT_FREQUENCY_58_3,
];

/// Band a frequency belongs to
///
/// Values below 10000 are treated as legacy MHz values.
pub fn band_for_frequency(freq_khz: u32) -> Band {
    if freq_khz < 10_000 {
        return if freq_khz < 2_700 { Band::B24 } else { Band::B58 };
    }
    match freq_khz {
        f if f < 500_000 => Band::B433,
        f if f < 890_000 => Band::B868,
        f if f < 950_000 => Band::B915,
        f if f < 2_412_000 => Band::B23,
        f if f < 2_487_000 => Band::B24,
        f if f < 5_000_000 => Band::B25,
        _ => Band::B58,
    }
}

/// True if the frequency falls in one of the given bands
pub fn is_frequency_in_bands(freq_khz: u32, bands: Band) -> bool {
    bands.intersects(band_for_frequency(freq_khz))
}

/// Default frequency for a set of supported bands
///
/// 5.8 GHz is preferred over 2.4 GHz for WiFi cards. Among sub-GHz bands
/// 915 wins over 868, which wins over 433.
pub fn default_frequency_for_bands(bands: Band) -> u32 {
    if bands.contains(Band::B58) {
        DEFAULT_FREQUENCY_58
    } else if bands.intersects(Band::B23 | Band::B24 | Band::B25) {
        DEFAULT_FREQUENCY_24
    } else if bands.contains(Band::B915) {
        DEFAULT_FREQUENCY_915
    } else if bands.contains(Band::B868) {
        DEFAULT_FREQUENCY_868
    } else if bands.contains(Band::B433) {
        DEFAULT_FREQUENCY_433
    } else {
        DEFAULT_FREQUENCY_58
    }
}

/// Default frequency for a single sub-GHz band, if it is one
pub fn default_sub_ghz_frequency(bands: Band) -> Option<u32> {
    if bands.contains(Band::B915) {
        Some(DEFAULT_FREQUENCY_915)
    } else if bands.contains(Band::B868) {
        Some(DEFAULT_FREQUENCY_868)
    } else if bands.contains(Band::B433) {
        Some(DEFAULT_FREQUENCY_433)
    } else {
        None
    }
}

/// Format a kHz frequency for display
pub fn format_frequency(freq_khz: u32) -> String {
    if freq_khz >= 1_000_000 {
        format!("{:.3} GHz", freq_khz as f64 / 1_000_000.0)
    } else {
        format!("{:.3} MHz", freq_khz as f64 / 1_000.0)
    }
}

/// Description of a physical radio as reported by hardware detection
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HardwareRadio {
    /// Interface or device name (wlan0, /dev/ttyUSB0)
    pub name: String,
    /// MAC address, or serial port name for serial radios
    pub mac: String,
    /// USB port identifier
    pub port: String,
    /// Chipset family
    pub radio_type: RadioType,
    /// Bound driver
    pub driver: RadioDriver,
    /// Detected card model
    pub card_model: CardModel,
    /// Bands the hardware can tune to
    pub supported_bands: Band,
    /// Driver and firmware are usable
    pub supported: bool,
    /// Can carry video-rate traffic
    pub high_capacity: bool,
    /// Frequency the radio currently sits on, kHz
    pub current_frequency_khz: u32,
}

impl HardwareRadio {
    /// A WiFi card
    pub fn wifi(
        name: impl Into<String>,
        mac: impl Into<String>,
        driver: RadioDriver,
        card_model: CardModel,
        bands: Band,
    ) -> Self {
        let radio_type = match driver {
            RadioDriver::Atheros => RadioType::Atheros,
            RadioDriver::Ralink => RadioType::Ralink,
            RadioDriver::Mediatek => RadioType::Mediatek,
            _ => RadioType::Realtek,
        };
        Self {
            name: name.into(),
            mac: mac.into(),
            port: String::new(),
            radio_type,
            driver,
            card_model,
            supported_bands: bands,
            supported: true,
            high_capacity: true,
            current_frequency_khz: default_frequency_for_bands(bands),
        }
    }

    /// A SiK telemetry radio on a serial port
    pub fn sik(port_name: impl Into<String>, bands: Band) -> Self {
        let port_name = port_name.into();
        Self {
            name: port_name.clone(),
            mac: port_name,
            port: String::new(),
            radio_type: RadioType::Sik,
            driver: RadioDriver::SerialSik,
            card_model: CardModel::SIK_RADIO,
            supported_bands: bands,
            supported: true,
            high_capacity: false,
            current_frequency_khz: default_frequency_for_bands(bands),
        }
    }

    /// A generic serial radio (or ELRS module) already tuned to a frequency
    pub fn serial(
        port_name: impl Into<String>,
        card_model: CardModel,
        bands: Band,
        current_frequency_khz: u32,
    ) -> Self {
        let port_name = port_name.into();
        Self {
            name: port_name.clone(),
            mac: port_name,
            port: String::new(),
            radio_type: RadioType::Serial,
            driver: RadioDriver::Serial,
            card_model,
            supported_bands: bands,
            supported: true,
            high_capacity: false,
            current_frequency_khz,
        }
    }

    /// True for SiK radios
    pub fn is_sik(&self) -> bool {
        self.radio_type == RadioType::Sik
    }

    /// True for any serial radio, SiK included
    pub fn is_serial(&self) -> bool {
        matches!(self.radio_type, RadioType::Sik | RadioType::Serial)
    }

    /// True for ELRS modules
    pub fn is_elrs(&self) -> bool {
        self.card_model.detected() == CardModel::SERIAL_RADIO_ELRS
    }

    /// True if the hardware can tune to the frequency
    pub fn supports_frequency(&self, freq_khz: u32) -> bool {
        is_frequency_in_bands(freq_khz, self.supported_bands)
    }

    /// Packed type-and-driver word
    pub fn type_and_driver(&self) -> u32 {
        pack_type_and_driver(self.radio_type, self.driver, self.supported)
    }
}
