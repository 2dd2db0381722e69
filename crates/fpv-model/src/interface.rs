//! Radio interface records
//!
//! One record per physical radio the model knows about. Records are built
//! from hardware detection and persisted with the model; the link
//! assignment is owned by the topology engine.

use std::fmt;

use fpv_protocol::radio::{
    unpack_type_and_driver, DEFAULT_RADIO_TX_POWER, MAX_RADIO_INTERFACES,
};
use fpv_protocol::{
    Band, CapabilityFlags, CardModel, HardwareRadio, RadioDriver, RadioFrameFlags, RadioType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reference from an interface to a radio link, or unassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LinkId(pub Option<usize>);

impl LinkId {
    /// Not assigned to any link
    pub const UNASSIGNED: LinkId = LinkId(None);

    /// Assigned to the link at `index`
    pub fn new(index: usize) -> Self {
        LinkId(Some(index))
    }

    /// Link index, if assigned
    pub fn index(&self) -> Option<usize> {
        self.0
    }

    /// True if assigned to a link
    pub fn is_assigned(&self) -> bool {
        self.0.is_some()
    }

    /// Decode the persisted form (negative means unassigned)
    pub fn from_raw(raw: i64) -> Self {
        usize::try_from(raw).map(LinkId::new).unwrap_or(LinkId::UNASSIGNED)
    }

    /// Persisted form
    pub fn to_raw(&self) -> i64 {
        self.0.map(|i| i as i64).unwrap_or(-1)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(i) => write!(f, "{}", i + 1),
            None => write!(f, "-"),
        }
    }
}

/// A physical radio as tracked by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioInterface {
    pub card_model: CardModel,
    pub link_id: LinkId,
    /// kHz
    pub current_frequency_khz: u32,
    pub capabilities: CapabilityFlags,
    pub supported_bands: Band,
    /// Packed radio type, driver and supported marker
    pub radio_type_and_driver: u32,
    pub frame_flags: RadioFrameFlags,
    pub raw_tx_power: i32,
    pub mac: String,
    pub port: String,
}

impl Default for RadioInterface {
    fn default() -> Self {
        Self {
            card_model: CardModel::GENERIC,
            link_id: LinkId::UNASSIGNED,
            current_frequency_khz: 0,
            capabilities: CapabilityFlags::RX
                | CapabilityFlags::TX
                | CapabilityFlags::VIDEO
                | CapabilityFlags::DATA,
            supported_bands: Band::empty(),
            radio_type_and_driver: 0,
            frame_flags: RadioFrameFlags::default(),
            raw_tx_power: DEFAULT_RADIO_TX_POWER,
            mac: String::new(),
            port: String::new(),
        }
    }
}

impl RadioInterface {
    /// Build a record from detected hardware
    pub fn from_hardware(hw: &HardwareRadio) -> Self {
        let mut iface = RadioInterface {
            card_model: hw.card_model,
            supported_bands: hw.supported_bands,
            radio_type_and_driver: hw.type_and_driver(),
            mac: single_token(&hw.mac),
            port: single_token(&hw.port),
            ..Default::default()
        };

        if hw.high_capacity {
            iface.capabilities |= CapabilityFlags::HIGH_CAPACITY;
        } else {
            iface.capabilities.remove(CapabilityFlags::VIDEO);
        }
        if !hw.supported {
            iface.capabilities |= CapabilityFlags::DISABLED;
        }

        if hw.is_serial() {
            iface.current_frequency_khz = hw.current_frequency_khz;
            iface
                .capabilities
                .remove(CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO);
            iface.capabilities |= CapabilityFlags::SERIAL_LINK;
            if hw.is_sik() {
                iface.capabilities |= CapabilityFlags::SIK;
            } else if hw.is_elrs() {
                iface.capabilities |= CapabilityFlags::ELRS;
            }
        }
        iface
    }

    /// Chipset family
    pub fn radio_type(&self) -> RadioType {
        unpack_type_and_driver(self.radio_type_and_driver).0
    }

    /// Bound driver
    pub fn driver(&self) -> RadioDriver {
        unpack_type_and_driver(self.radio_type_and_driver).1
    }

    /// Driver and firmware are usable
    pub fn is_supported(&self) -> bool {
        unpack_type_and_driver(self.radio_type_and_driver).2
    }

    pub fn is_wifi(&self) -> bool {
        self.radio_type().is_wifi()
    }

    pub fn is_sik(&self) -> bool {
        self.radio_type() == RadioType::Sik
    }

    /// Any serial radio, SiK included
    pub fn is_serial(&self) -> bool {
        matches!(self.radio_type(), RadioType::Sik | RadioType::Serial)
    }

    pub fn is_elrs(&self) -> bool {
        self.radio_type() == RadioType::Serial && self.capabilities.contains(CapabilityFlags::ELRS)
    }

    pub fn is_high_capacity(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::HIGH_CAPACITY)
    }

    pub fn is_disabled(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::DISABLED)
    }

    /// Enabled and able to carry data
    pub fn is_usable(&self) -> bool {
        !self.is_disabled() && self.capabilities.contains(CapabilityFlags::DATA)
    }
}

/// Hardware names are stored as single whitespace-free tokens
pub(crate) fn single_token(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Build the interface catalog from detected hardware
///
/// Only the first [`MAX_RADIO_INTERFACES`] radios are kept.
pub fn interfaces_from_hardware(radios: &[HardwareRadio]) -> Vec<RadioInterface> {
    if radios.len() > MAX_RADIO_INTERFACES {
        warn!(
            "{} radios detected, only the first {} are used",
            radios.len(),
            MAX_RADIO_INTERFACES
        );
    }
    radios
        .iter()
        .take(MAX_RADIO_INTERFACES)
        .enumerate()
        .map(|(i, hw)| {
            debug!(
                "Radio interface {}: {} ({}), bands {}, high capacity: {}",
                i + 1,
                hw.name,
                hw.card_model.name(),
                hw.supported_bands.describe(),
                hw.high_capacity
            );
            RadioInterface::from_hardware(hw)
        })
        .collect()
}
