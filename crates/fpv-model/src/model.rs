//! The vehicle model
//!
//! Aggregate root persisted by the config store: identity, radio topology,
//! relay election, telemetry and process tunables, plus the hardware
//! inventory detected at the last start.

use bitflags::bitflags;
use fpv_detect::DeviceRegistry;
use fpv_protocol::radio::MAX_RADIO_INTERFACES;
use fpv_protocol::HardwareRadio;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::interface::{interfaces_from_hardware, single_token};
use crate::topology::RadioTopology;

pub const SW_VERSION_MAJOR: u32 = 11;
pub const SW_VERSION_MINOR: u32 = 3;

/// Longest vehicle name kept, in characters
pub const MAX_VEHICLE_NAME_LENGTH: usize = 63;

/// Packed software version the model was last written by
pub const fn sw_version() -> u32 {
    (SW_VERSION_MAJOR << 8) | SW_VERSION_MINOR
}

bitflags! {
    /// Model-wide behaviour switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModelFlags: u32 {
        const LOGGER_SERVICE = 1;
        const PRIORITIZE_UPLINK = 1 << 1;
        const USE_LOGGER_SERVICE_FOR_TELEMETRY = 1 << 2;
    }
}

impl Default for ModelFlags {
    fn default() -> Self {
        ModelFlags::LOGGER_SERVICE | ModelFlags::PRIORITIZE_UPLINK
    }
}

bitflags! {
    /// Telemetry forwarding switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TelemetryFlags: u32 {
        const RXTX = 1;
        const REQUEST_DATA_STREAMS = 1 << 1;
        const SPECTATOR_ENABLE = 1 << 2;
    }
}

impl Default for TelemetryFlags {
    fn default() -> Self {
        TelemetryFlags::RXTX | TelemetryFlags::REQUEST_DATA_STREAMS | TelemetryFlags::SPECTATOR_ENABLE
    }
}

/// Process scheduling and clock tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPriorities {
    pub nice_video: i32,
    pub nice_others: i32,
    pub ionice_video: i32,
    pub overvoltage: i32,
    /// MHz
    pub freq_arm: u32,
    /// MHz
    pub freq_gpu: u32,
    pub nice_router: i32,
    pub ionice_router: i32,
    pub nice_rc: i32,
    pub nice_telemetry: i32,
}

impl Default for ProcessPriorities {
    fn default() -> Self {
        Self {
            nice_video: DEFAULT_PRIORITY_VIDEO,
            nice_others: 0,
            ionice_video: 3,
            overvoltage: 3,
            freq_arm: 900,
            freq_gpu: 400,
            nice_router: DEFAULT_PRIORITY_ROUTER,
            ionice_router: 3,
            nice_rc: DEFAULT_PRIORITY_RC,
            nice_telemetry: DEFAULT_PRIORITY_TELEMETRY,
        }
    }
}

pub const DEFAULT_PRIORITY_ROUTER: i32 = -11;
pub const DEFAULT_PRIORITY_VIDEO: i32 = -10;
pub const DEFAULT_PRIORITY_RC: i32 = -9;
pub const DEFAULT_PRIORITY_TELEMETRY: i32 = -8;

/// Settings shared by every radio link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioGlobals {
    pub auto_vehicle_tx_power: bool,
    pub auto_controller_tx_power: bool,
    /// Air packet size used by SiK radios
    pub sik_packet_size: u32,
    pub global_link_flags: u32,
}

pub const DEFAULT_SIK_PACKET_SIZE: u32 = 50;

impl Default for RadioGlobals {
    fn default() -> Self {
        Self {
            auto_vehicle_tx_power: true,
            auto_controller_tx_power: true,
            sik_packet_size: DEFAULT_SIK_PACKET_SIZE,
            global_link_flags: 0,
        }
    }
}

/// Flight controller telemetry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryParams {
    /// 0 none, 1 MAVLink, 2 LTM
    pub fc_telemetry_type: u32,
    pub controller_telemetry_type: u32,
    /// Hz
    pub update_rate: u32,
    pub controller_has_output: bool,
    pub controller_has_input: bool,
    pub graph_sample_interval_ms: u32,
    pub vehicle_mavlink_id: u32,
    pub controller_mavlink_id: u32,
    pub flags: TelemetryFlags,
}

pub const MAX_TELEMETRY_UPDATE_RATE: u32 = 200;
pub const DEFAULT_GRAPH_SAMPLE_INTERVAL_MS: u32 = 200;

impl Default for TelemetryParams {
    fn default() -> Self {
        Self {
            fc_telemetry_type: 1,
            controller_telemetry_type: 1,
            update_rate: 10,
            controller_has_output: false,
            controller_has_input: false,
            graph_sample_interval_ms: DEFAULT_GRAPH_SAMPLE_INTERVAL_MS,
            vehicle_mavlink_id: 1,
            controller_mavlink_id: 255,
            flags: TelemetryFlags::default(),
        }
    }
}

/// Relay election
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayParams {
    /// Link dedicated to relaying, if any
    pub link_id: Option<usize>,
    /// Override frequency for the relayed vehicle, kHz (0 for none)
    pub frequency_khz: u32,
    pub mode: u32,
    pub relayed_vehicle_id: u32,
    pub capabilities: u32,
}

pub const MAX_HARDWARE_BUSES: usize = 6;
pub const MAX_HARDWARE_BUS_DEVICES: usize = 16;
pub const MAX_HARDWARE_SERIAL_PORTS: usize = 6;

/// Usage word bit: the port sits on a USB adapter
pub const SERIAL_PORT_USB: u32 = 1 << 11;
/// Usage word bit: the port can be used
pub const SERIAL_PORT_SUPPORTED: u32 = 1 << 12;
/// Baud rate recorded for serial radios
pub const DEFAULT_SERIAL_SPEED: u32 = 57_600;

/// A serial port in the hardware inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortEntry {
    pub name: String,
    /// Baud rate
    pub speed: u32,
    /// Usage code in the low byte, port index in bits 8..12, then the
    /// [`SERIAL_PORT_USB`] and [`SERIAL_PORT_SUPPORTED`] bits
    pub usage: u32,
}

impl SerialPortEntry {
    /// Entry for a serial radio; the usage code is left unassigned
    pub fn for_radio(radio: &HardwareRadio) -> Self {
        let name = single_token(&radio.name);
        let index = name
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0);
        let mut usage = (index & 0x0F) << 8;
        if radio.supported {
            usage |= SERIAL_PORT_SUPPORTED;
        }
        if name.contains("USB") || radio.port.contains("USB") {
            usage |= SERIAL_PORT_USB;
        }
        Self {
            name,
            speed: DEFAULT_SERIAL_SPEED,
            usage,
        }
    }

    pub fn is_usb(&self) -> bool {
        self.usage & SERIAL_PORT_USB != 0
    }

    pub fn is_supported(&self) -> bool {
        self.usage & SERIAL_PORT_SUPPORTED != 0
    }
}

/// Hardware found at the last start, persisted for change detection
///
/// Each list holds at most its `MAX_HARDWARE_*` bound.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareInventory {
    pub radio_count: usize,
    /// Bus numbers that answered enumeration
    pub bus_numbers: Vec<u8>,
    /// Every (bus, address) pair with a device
    pub bus_devices: Vec<(u8, u8)>,
    pub serial_ports: Vec<SerialPortEntry>,
}

impl HardwareInventory {
    /// Snapshot the registry's bus enumeration
    pub fn from_registry(
        registry: &DeviceRegistry,
        radio_count: usize,
        serial_ports: Vec<SerialPortEntry>,
    ) -> Self {
        let mut inventory = Self {
            radio_count,
            bus_numbers: registry.buses().iter().map(|b| b.number).collect(),
            bus_devices: registry.present_devices(),
            serial_ports,
        };
        inventory.truncate();
        inventory
    }

    /// Serial port entries for the serial radios among `radios`
    pub fn serial_ports_for(radios: &[HardwareRadio]) -> Vec<SerialPortEntry> {
        radios
            .iter()
            .filter(|r| r.is_serial())
            .take(MAX_HARDWARE_SERIAL_PORTS)
            .map(SerialPortEntry::for_radio)
            .collect()
    }

    pub fn serial_count(&self) -> usize {
        self.serial_ports.len()
    }

    fn truncate(&mut self) {
        if self.bus_numbers.len() > MAX_HARDWARE_BUSES {
            warn!("{} buses found, keeping {}", self.bus_numbers.len(), MAX_HARDWARE_BUSES);
            self.bus_numbers.truncate(MAX_HARDWARE_BUSES);
        }
        if self.bus_devices.len() > MAX_HARDWARE_BUS_DEVICES {
            warn!(
                "{} bus devices found, keeping {}",
                self.bus_devices.len(),
                MAX_HARDWARE_BUS_DEVICES
            );
            self.bus_devices.truncate(MAX_HARDWARE_BUS_DEVICES);
        }
        self.serial_ports.truncate(MAX_HARDWARE_SERIAL_PORTS);
    }

    /// True if the bus devices differ from another inventory
    pub fn bus_devices_changed(&self, other: &HardwareInventory) -> bool {
        self.bus_numbers != other.bus_numbers || self.bus_devices != other.bus_devices
    }
}

/// The persisted vehicle model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub sw_version: u32,
    pub vehicle_id: u32,
    pub controller_id: u32,
    pub board_type: u32,
    pub flags: ModelFlags,
    pub vehicle_name: String,
    pub vehicle_type: u32,
    pub is_spectator: bool,
    pub rxtx_sync_type: u32,
    pub camera_rc_channels: u32,
    pub save_count: u32,
    /// Seconds
    pub total_flight_time: u32,
    pub gps_count: u32,
    pub enable_dhcp: bool,
    pub priorities: ProcessPriorities,
    pub radio_globals: RadioGlobals,
    pub telemetry: TelemetryParams,
    pub relay: RelayParams,
    pub radio: RadioTopology,
    pub hardware: HardwareInventory,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            sw_version: sw_version(),
            vehicle_id: 0,
            controller_id: 0,
            board_type: 0,
            flags: ModelFlags::default(),
            vehicle_name: String::new(),
            vehicle_type: 0,
            is_spectator: true,
            rxtx_sync_type: 1,
            camera_rc_channels: 0,
            save_count: 0,
            total_flight_time: 0,
            gps_count: 1,
            enable_dhcp: false,
            priorities: ProcessPriorities::default(),
            radio_globals: RadioGlobals::default(),
            telemetry: TelemetryParams::default(),
            relay: RelayParams::default(),
            radio: RadioTopology::new(),
            hardware: HardwareInventory::default(),
        }
    }
}

impl Model {
    /// Defaults for a freshly identified vehicle
    pub fn new_vehicle(vehicle_id: u32) -> Self {
        Self {
            vehicle_id,
            is_spectator: false,
            ..Default::default()
        }
    }

    /// Return every setting to its default
    ///
    /// Identity, board type, hardware inventory and the radio interface
    /// catalog survive; links are rebuilt from the interfaces.
    pub fn reset_to_defaults(&mut self) {
        info!("Resetting model {} to defaults", self.vehicle_id);
        let mut fresh = Model::new_vehicle(self.vehicle_id);
        fresh.controller_id = self.controller_id;
        fresh.board_type = self.board_type;
        fresh.is_spectator = self.is_spectator;
        fresh.save_count = self.save_count;
        fresh.hardware = std::mem::take(&mut self.hardware);
        fresh.radio = RadioTopology::from_interfaces(self.radio.interfaces().to_vec());
        *self = fresh;

        self.validate_settings();
        self.radio.populate_defaults();
        self.validate_settings();
    }

    /// Rebuild interfaces and links from detected hardware
    pub fn populate_radio_from_hardware(&mut self, radios: &[HardwareRadio]) {
        info!("Populating radio configuration from {} detected radio(s)", radios.len());
        self.radio = RadioTopology::from_interfaces(interfaces_from_hardware(radios));
        self.hardware.radio_count = radios.len().min(MAX_RADIO_INTERFACES);
        self.hardware.serial_ports = HardwareInventory::serial_ports_for(radios);
        self.relay.link_id = None;

        self.validate_settings();
        self.radio.populate_defaults();
        self.validate_settings();
    }

    /// Repair the radio topology, then revalidate
    pub fn reconcile_radio(&mut self) -> bool {
        let changed = self.radio.reconcile();
        self.validate_settings() || changed
    }

    /// Elect the relay link, or disable relaying with `None`
    ///
    /// Returns false without changes for a link that does not exist.
    pub fn set_relay_link(&mut self, link: Option<usize>) -> bool {
        if let Some(index) = link {
            if index >= self.radio.links().len() {
                warn!(
                    "Can't relay on radio link {}: only {} link(s)",
                    index + 1,
                    self.radio.links().len()
                );
                return false;
            }
        }
        if self.relay.link_id == link {
            return false;
        }
        match link {
            Some(index) => info!("Relay enabled on radio link {}", index + 1),
            None => info!("Relay disabled"),
        }
        self.relay.link_id = link;
        self.validate_settings();
        true
    }

    /// Swap the two high capacity interfaces, then revalidate
    pub fn swap_radio_interfaces(&mut self, hardware: Option<&[HardwareRadio]>) -> bool {
        if !self.radio.swap_high_capacity(hardware) {
            return false;
        }
        self.validate_settings();
        true
    }

    /// Rotate the links, keeping the relay on the same link definition
    pub fn rotate_radio_links(&mut self) -> bool {
        let count = self.radio.links().len();
        if !self.radio.rotate_links() {
            return false;
        }
        if let Some(index) = self.relay.link_id {
            self.relay.link_id = Some((index + 1) % count);
            debug!("Relay link follows rotation to link {}", (index + 1) % count + 1);
        }
        self.validate_settings();
        true
    }

    /// Set the vehicle name, cut to [`MAX_VEHICLE_NAME_LENGTH`] characters
    pub fn set_vehicle_name(&mut self, name: &str) {
        self.vehicle_name = name.chars().take(MAX_VEHICLE_NAME_LENGTH).collect();
    }

    /// Name for display, with a fallback for unnamed vehicles
    pub fn display_name(&self) -> String {
        if self.vehicle_name.trim().is_empty() {
            format!("Vehicle {}", self.vehicle_id)
        } else {
            self.vehicle_name.clone()
        }
    }
}
