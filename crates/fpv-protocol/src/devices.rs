//! Bus device database
//!
//! Well-known I2C addresses, the device classes behind them, and the
//! persisted per-device settings record.

use crate::extender::ExtenderCapabilities;

/// HDMI to CSI bridge
pub const ADDRESS_HDMI: u8 = 0x0F;
/// Pico board decoding RC input
pub const ADDRESS_PICO_RC_IN: u8 = 0x20;
/// CSI camera sensor
pub const ADDRESS_CSI_CAMERA: u8 = 0x36;
/// Veye camera
pub const ADDRESS_VEYE_CAMERA: u8 = 0x3B;
/// INA219 current sensor, primary address
pub const ADDRESS_INA219: u8 = 0x40;
/// INA219 current sensor, secondary address
pub const ADDRESS_INA219_ALT: u8 = 0x41;
/// Pico extender board
pub const ADDRESS_PICO_EXTENDER: u8 = 0x6D;
/// First address reserved for add-on extenders
pub const EXTENDER_RANGE_START: u8 = 0x60;
/// Last address reserved for add-on extenders
pub const EXTENDER_RANGE_END: u8 = 0x6F;

/// Maximum number of tunables stored per device
pub const MAX_DEVICE_PARAMS: usize = 8;
/// Maximum stored device name length
pub const MAX_DEVICE_NAME_LENGTH: usize = 24;

/// Class of device found at a bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceType {
    #[default]
    Unknown = 0,
    CsiCamera = 1,
    HdmiCamera = 2,
    VeyeCamera = 3,
    CurrentSensor = 4,
    RcInput = 5,
    PicoExtender = 6,
    Extender = 7,
}

impl DeviceType {
    /// Decode a stored type code; unknown codes map to `Unknown`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => DeviceType::CsiCamera,
            2 => DeviceType::HdmiCamera,
            3 => DeviceType::VeyeCamera,
            4 => DeviceType::CurrentSensor,
            5 => DeviceType::RcInput,
            6 => DeviceType::PicoExtender,
            7 => DeviceType::Extender,
            _ => DeviceType::Unknown,
        }
    }

    /// Device class for a bus address
    pub fn for_address(address: u8) -> Self {
        match address {
            ADDRESS_HDMI => DeviceType::HdmiCamera,
            ADDRESS_CSI_CAMERA => DeviceType::CsiCamera,
            ADDRESS_VEYE_CAMERA => DeviceType::VeyeCamera,
            ADDRESS_INA219 | ADDRESS_INA219_ALT => DeviceType::CurrentSensor,
            ADDRESS_PICO_RC_IN => DeviceType::RcInput,
            ADDRESS_PICO_EXTENDER => DeviceType::PicoExtender,
            a if is_extender_address(a) => DeviceType::Extender,
            _ => DeviceType::Unknown,
        }
    }

    /// True for the camera classes
    pub fn is_camera(&self) -> bool {
        matches!(
            self,
            DeviceType::CsiCamera | DeviceType::HdmiCamera | DeviceType::VeyeCamera
        )
    }
}

/// True if the address is in the add-on extender range
pub fn is_extender_address(address: u8) -> bool {
    (EXTENDER_RANGE_START..=EXTENDER_RANGE_END).contains(&address)
}

/// True if the address belongs to a device class this system knows about
pub fn is_known_address(address: u8) -> bool {
    DeviceType::for_address(address) != DeviceType::Unknown
}

/// True if devices at the address expose user settings
pub fn is_configurable_address(address: u8) -> bool {
    !DeviceType::for_address(address).is_camera()
}

/// Display name for a bus address
pub fn device_name(address: u8) -> &'static str {
    match DeviceType::for_address(address) {
        DeviceType::HdmiCamera => "HDMI-CSI Adapter",
        DeviceType::CsiCamera => "CSI Camera",
        DeviceType::VeyeCamera => "Veye Camera",
        DeviceType::CurrentSensor => "INA219 Current Sensor",
        DeviceType::RcInput => "RC Input Board",
        DeviceType::PicoExtender => "Pico Extender",
        DeviceType::Extender => "Add-on Extender",
        DeviceType::Unknown => "Unknown",
    }
}

/// Persisted settings for one bus device
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceRecord {
    /// Bus address
    pub address: u8,
    /// Firmware version reported by the device, 0 if unknown
    pub version: i32,
    /// Device class
    pub device_type: DeviceType,
    /// Display name, at most [`MAX_DEVICE_NAME_LENGTH`] characters
    pub name: String,
    /// Exposes user settings
    pub configurable: bool,
    /// Used by the system
    pub enabled: bool,
    /// Capabilities reported over the extender protocol
    pub capabilities: ExtenderCapabilities,
    /// Per-device tunables
    pub params: [i32; MAX_DEVICE_PARAMS],
}

impl DeviceRecord {
    /// Default record for a device first seen at `address`
    pub fn for_address(address: u8) -> Self {
        let device_type = DeviceType::for_address(address);
        let mut record = Self {
            address,
            version: 0,
            device_type,
            name: device_name(address).to_string(),
            configurable: true,
            enabled: true,
            capabilities: ExtenderCapabilities::empty(),
            params: [0; MAX_DEVICE_PARAMS],
        };

        match device_type {
            t if t.is_camera() => record.configurable = false,
            DeviceType::RcInput => {
                record.params[1] = 1;
            }
            DeviceType::PicoExtender => {
                record.params[1] = 1;
                record.params[2] = 1;
                record.params[3] = 1;
            }
            DeviceType::Unknown => record.enabled = false,
            _ => {}
        }
        record
    }

    /// Set the name, truncated to the stored length
    pub fn set_name(&mut self, name: &str) {
        self.name = name.chars().take(MAX_DEVICE_NAME_LENGTH).collect();
    }
}
