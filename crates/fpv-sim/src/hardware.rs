//! Canned hardware sets
//!
//! Radio lists and bus layouts modelled on common builds, used by tests and
//! by the configuration tool's simulation mode.

use fpv_protocol::devices::{ADDRESS_CSI_CAMERA, ADDRESS_INA219, ADDRESS_PICO_RC_IN};
use fpv_protocol::radio::DEFAULT_FREQUENCY_915;
use fpv_protocol::{Band, CardModel, ExtenderCapabilities, HardwareRadio, RadioDriver};
use serde::{Deserialize, Serialize};

use crate::bus::VirtualBus;
use crate::extender::{VirtualExtender, VirtualExtenderConfig};

/// A named hardware build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareProfile {
    /// Two dual-band cards and a 433 MHz SiK radio
    #[default]
    Vehicle,
    /// One dual-band card
    Controller,
    /// Three WiFi cards, enough for a relay link
    Relay,
    /// Atheros card plus an ELRS module
    Long,
}

impl HardwareProfile {
    pub const ALL: [HardwareProfile; 4] = [
        HardwareProfile::Vehicle,
        HardwareProfile::Controller,
        HardwareProfile::Relay,
        HardwareProfile::Long,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HardwareProfile::Vehicle => "vehicle",
            HardwareProfile::Controller => "controller",
            HardwareProfile::Relay => "relay",
            HardwareProfile::Long => "long",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Radios present in this build
    pub fn radios(&self) -> Vec<HardwareRadio> {
        match self {
            HardwareProfile::Vehicle => vehicle_radios(),
            HardwareProfile::Controller => controller_radios(),
            HardwareProfile::Relay => relay_radios(),
            HardwareProfile::Long => long_range_radios(),
        }
    }

    /// Buses present in this build
    pub fn bus(&self) -> VirtualBus {
        match self {
            HardwareProfile::Controller => controller_bus(),
            _ => vehicle_bus(),
        }
    }
}

fn dual_band_card(index: u8) -> HardwareRadio {
    HardwareRadio::wifi(
        format!("wlan{}", index),
        format!("00:c0:ca:a1:b2:{:02x}", index),
        RadioDriver::Rtl88xxau,
        CardModel::ALFA_AWUS036ACH,
        Band::B58 | Band::B24,
    )
}

/// Two dual-band cards and a 433 MHz SiK radio
pub fn vehicle_radios() -> Vec<HardwareRadio> {
    vec![
        dual_band_card(0),
        dual_band_card(1),
        HardwareRadio::sik("/dev/ttyUSB0", Band::B433),
    ]
}

pub fn controller_radios() -> Vec<HardwareRadio> {
    vec![dual_band_card(0)]
}

/// Three dual-band cards
pub fn relay_radios() -> Vec<HardwareRadio> {
    (0..3).map(dual_band_card).collect()
}

/// A 2.4 GHz Atheros card and an ELRS module on 915 MHz
pub fn long_range_radios() -> Vec<HardwareRadio> {
    vec![
        HardwareRadio::wifi(
            "wlan0",
            "00:c0:ca:0b:0c:0d",
            RadioDriver::Atheros,
            CardModel::ATHEROS_GENERIC,
            Band::B24,
        ),
        HardwareRadio::serial(
            "/dev/ttyS1",
            CardModel::SERIAL_RADIO_ELRS,
            Band::B915,
            DEFAULT_FREQUENCY_915,
        ),
    ]
}

/// Camera, current sensor, Pico extender and an RC input board on i2c-1
pub fn vehicle_bus() -> VirtualBus {
    let bus = VirtualBus::new();
    bus.add_device(1, ADDRESS_CSI_CAMERA);
    bus.add_device(1, ADDRESS_INA219);
    bus.add_extender(1, VirtualExtender::from_config(VirtualExtenderConfig::default()));
    bus.add_extender(
        1,
        VirtualExtender::from_config(VirtualExtenderConfig {
            address: ADDRESS_PICO_RC_IN,
            name: "RC In".to_string(),
            version: (1, 2),
            capabilities: ExtenderCapabilities::RC_IN,
        }),
    );
    bus
}

/// Buttons and a rotary knob on i2c-1
pub fn controller_bus() -> VirtualBus {
    let bus = VirtualBus::new();
    bus.add_extender(
        1,
        VirtualExtender::from_config(VirtualExtenderConfig {
            address: 0x62,
            name: "Controller Keys".to_string(),
            version: (1, 1),
            capabilities: ExtenderCapabilities::BUTTONS | ExtenderCapabilities::ROTARY,
        }),
    );
    bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpv_detect::BusProbe;
    use fpv_protocol::devices::ADDRESS_PICO_EXTENDER;

    #[test]
    fn test_profile_names() {
        for profile in HardwareProfile::ALL {
            assert_eq!(HardwareProfile::from_name(profile.name()), Some(profile));
        }
        assert_eq!(HardwareProfile::from_name("boat"), None);
    }

    #[test]
    fn test_vehicle_radios() {
        let radios = vehicle_radios();
        assert_eq!(radios.len(), 3);
        assert!(radios[2].is_sik());
        assert!(radios[..2].iter().all(|r| r.high_capacity));
    }

    #[test]
    fn test_long_range_has_elrs() {
        let radios = long_range_radios();
        assert!(radios[1].is_elrs());
    }

    #[test]
    fn test_vehicle_bus() {
        let bus = vehicle_bus();
        assert!(bus.bus_present(1));
        assert!(bus.with_extender(ADDRESS_PICO_EXTENDER, |_| ()).is_some());
    }
}
