//! Device registry
//!
//! Owns the discovered I2C buses and the persisted settings record of every
//! device seen on them. Extenders are interrogated over the extender
//! protocol; their answers refresh the cached records.
//!
//! # Settings File
//! ```text
//! V.6.7
//! I2C_Device_Settings: 2
//! 54 0 1 CSI~Camera 0 1 0 0
//! 0 0 0 0 0 0 0 0
//! 98 0 7 Rotary~Knob 1 1 0 12
//! 0 0 0 0 0 0 0 0
//! ```
//!
//! One header line per record (`address version type name configurable
//! enabled reserved capabilities`, spaces in the name written as `~`)
//! followed by a line with the tunables.

use std::fs;
use std::path::{Path, PathBuf};

use fpv_protocol::devices::{
    device_name, is_extender_address, ADDRESS_PICO_EXTENDER, MAX_DEVICE_PARAMS,
};
use fpv_protocol::{
    DeviceRecord, DeviceType, ExtenderCapabilities, ExtenderRequest, ExtenderResponse,
    ParseError, ProtocolError,
};
use tracing::{debug, info, warn};

use crate::bus::{scan_windows, BoardClass, BusInfo, BusProbe, MAX_PLAUSIBLE_DEVICES};
use crate::cache::DetectionCache;
use crate::error::{DetectError, SettingsError};
use crate::transport::{query_extender, ExtenderTransport};

/// Stamp on the first line of the settings file
pub const SETTINGS_STAMP: &str = "V.6.7";

const COUNT_LABEL: &str = "I2C_Device_Settings:";
/// One record per 7-bit bus address at most
const MAX_RECORDS: usize = 128;

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Device settings file
    pub settings_path: PathBuf,
    /// Attempts made for a name query before giving up
    pub name_query_attempts: usize,
    /// Bus noise cap
    pub max_plausible_devices: usize,
}

impl RegistryConfig {
    /// Defaults with the given settings file
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            name_query_attempts: 10,
            max_plausible_devices: MAX_PLAUSIBLE_DEVICES,
        }
    }
}

/// How a settings load went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// File read, with this many records
    Loaded(usize),
    /// File missing or unreadable; rewritten from defaults
    Reset,
}

/// Discovered buses plus persisted device settings
#[derive(Debug)]
pub struct DeviceRegistry {
    config: RegistryConfig,
    buses: Vec<BusInfo>,
    records: Vec<DeviceRecord>,
    dirty: bool,
}

impl DeviceRegistry {
    /// Create a registry backed by a settings file
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self::with_config(RegistryConfig::new(settings_path))
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            buses: Vec::new(),
            records: Vec::new(),
            dirty: false,
        }
    }

    /// Settings file location
    pub fn settings_path(&self) -> &Path {
        &self.config.settings_path
    }

    // ------------------------------------------------------------------
    // Bus enumeration
    // ------------------------------------------------------------------

    /// Enumerate buses and the devices on them
    ///
    /// The scan runs once per detection cache; later calls reuse the cached
    /// result.
    pub fn enumerate(
        &mut self,
        cache: &mut DetectionCache,
        probe: &mut dyn BusProbe,
        transport: &mut dyn ExtenderTransport,
        board: BoardClass,
    ) -> &[BusInfo] {
        let max_devices = self.config.max_plausible_devices;
        let buses = cache.buses_or_enumerate(|| {
            scan_all_buses(probe, transport, board, max_devices)
        });
        self.buses = buses.to_vec();
        &self.buses
    }

    /// Buses found by the last enumeration
    pub fn buses(&self) -> &[BusInfo] {
        &self.buses
    }

    /// True if any bus has a device at the address
    pub fn has_device(&self, address: u8) -> bool {
        self.buses.iter().any(|b| b.has_device(address))
    }

    /// Bus number a device was found on
    pub fn bus_for(&self, address: u8) -> Option<u8> {
        self.buses
            .iter()
            .find(|b| b.has_device(address))
            .map(|b| b.number)
    }

    /// Every (bus, address) pair that answered
    pub fn present_devices(&self) -> Vec<(u8, u8)> {
        self.buses
            .iter()
            .flat_map(|b| b.devices().map(move |a| (b.number, a)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// All records
    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Record for an address
    pub fn get(&self, address: u8) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.address == address)
    }

    /// Record for an address, appending a default one if missing
    pub fn get_or_create(&mut self, address: u8) -> &mut DeviceRecord {
        let index = match self.records.iter().position(|r| r.address == address) {
            Some(index) => index,
            None => {
                info!(
                    "Adding settings for device 0x{:02X} ({})",
                    address,
                    device_name(address)
                );
                self.records.push(DeviceRecord::for_address(address));
                self.dirty = true;
                self.records.len() - 1
            }
        };
        &mut self.records[index]
    }

    /// Replace (or add) a record
    pub fn update(&mut self, record: DeviceRecord) {
        match self.records.iter_mut().find(|r| r.address == record.address) {
            Some(existing) if *existing == record => {}
            Some(existing) => {
                *existing = record;
                self.dirty = true;
            }
            None => {
                self.records.push(record);
                self.dirty = true;
            }
        }
    }

    /// Reset an address to its well-known default record
    pub fn reset_device_info(&mut self, address: u8) {
        self.update(DeviceRecord::for_address(address));
    }

    /// True if records changed since the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Load records from the settings file
    ///
    /// A missing file, a stamp mismatch or a malformed record clears the
    /// records and rewrites the file.
    pub fn load(&mut self) -> Result<LoadStatus, DetectError> {
        let path = self.config.settings_path.clone();
        let parsed = match fs::read_to_string(&path) {
            Ok(text) => parse_settings(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No device settings at {}, creating it", path.display());
                Err(SettingsError::Missing)
            }
            Err(e) => Err(SettingsError::Io(e)),
        };

        match parsed {
            Ok(records) => {
                info!(
                    "Loaded {} device setting(s) from {}",
                    records.len(),
                    path.display()
                );
                self.records = records;
                self.dirty = false;
                Ok(LoadStatus::Loaded(self.records.len()))
            }
            Err(reason) => {
                warn!("Device settings {} reset: {}", path.display(), reason);
                self.records.clear();
                self.save()?;
                Ok(LoadStatus::Reset)
            }
        }
    }

    /// Write records to the settings file
    pub fn save(&mut self) -> Result<(), DetectError> {
        let path = &self.config.settings_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serialize_settings(&self.records)).map_err(|e| {
            DetectError::SettingsFile {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!("Saved {} device setting(s)", self.records.len());
        self.dirty = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Check pass
    // ------------------------------------------------------------------

    /// Bring records in line with what is on the buses
    ///
    /// Creates missing records, upgrades unknown ones, stores the Pico
    /// extender version and asks every extender for its capabilities and
    /// name. The settings file is written once at the end if anything
    /// changed. Returns whether anything changed.
    pub fn check_devices(
        &mut self,
        transport: &mut dyn ExtenderTransport,
    ) -> Result<bool, DetectError> {
        let was_dirty = self.dirty;
        let present: Vec<(u8, u8, Option<(u8, u8)>)> = self
            .buses
            .iter()
            .flat_map(|b| {
                b.devices()
                    .map(move |a| (b.number, a, b.pico_extender_version))
            })
            .collect();

        for (bus, address, pico_version) in present {
            debug!(
                "Checking device 0x{:02X} on i2c-{} ({})",
                address,
                bus,
                device_name(address)
            );

            let expected_type = DeviceType::for_address(address);
            let record = self.get_or_create(address);
            if record.device_type == DeviceType::Unknown && expected_type != DeviceType::Unknown {
                *record = DeviceRecord::for_address(address);
                self.dirty = true;
            }

            if address == ADDRESS_PICO_EXTENDER {
                if let Some((major, minor)) = pico_version {
                    let version = i32::from((major << 4) | (minor & 0x0F));
                    let record = self.get_or_create(address);
                    if record.version != version {
                        record.version = version;
                        self.dirty = true;
                    }
                }
            }

            if is_extender_address(address) {
                self.refresh_extender(transport, bus, address);
            }
        }

        let changed = self.dirty || was_dirty;
        if self.dirty {
            info!("Device settings changed, saving");
            self.save()?;
        }
        Ok(changed)
    }

    /// Query an extender for flags and name, updating its record
    fn refresh_extender(&mut self, transport: &mut dyn ExtenderTransport, bus: u8, address: u8) {
        {
            let record = self.get_or_create(address);
            if record.device_type == DeviceType::Unknown {
                record.device_type = DeviceType::Extender;
                self.dirty = true;
            }
        }

        // Capability flags are asked for once; a bad reply keeps the cache
        match query_extender(transport, bus, address, &ExtenderRequest::GetFlags) {
            Ok(ExtenderResponse::Flags(flags)) => self.apply_flags(address, flags),
            Ok(other) => warn!("0x{:02X} answered GET_FLAGS with {:?}", address, other),
            Err(e) => log_query_failure(address, "GET_FLAGS", &e),
        }

        let attempts = self.config.name_query_attempts.max(1);
        for attempt in 1..=attempts {
            match query_extender(transport, bus, address, &ExtenderRequest::GetName) {
                Ok(ExtenderResponse::Name(name)) => {
                    self.apply_name(address, &name);
                    return;
                }
                Ok(other) => {
                    warn!("0x{:02X} answered GET_NAME with {:?}", address, other);
                }
                Err(e) => {
                    debug!("GET_NAME attempt {}/{} on 0x{:02X}", attempt, attempts, address);
                    log_query_failure(address, "GET_NAME", &e);
                }
            }
        }
        warn!(
            "No valid name from 0x{:02X} after {} attempts, keeping cached value",
            address, attempts
        );
    }

    fn apply_flags(&mut self, address: u8, flags: ExtenderCapabilities) {
        let record = self.get_or_create(address);
        if record.capabilities != flags {
            info!(
                "Device 0x{:02X} capabilities {:?} -> {:?}",
                address, record.capabilities, flags
            );
            record.capabilities = flags;
            self.dirty = true;
        }
    }

    fn apply_name(&mut self, address: u8, name: &str) {
        if name.is_empty() {
            return;
        }
        let record = self.get_or_create(address);
        if record.name != name {
            info!("Device 0x{:02X} name [{}] -> [{}]", address, record.name, name);
            record.set_name(name);
            self.dirty = true;
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// True if a current sensor is registered
    pub fn has_current_sensor(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.device_type == DeviceType::CurrentSensor)
    }

    /// True if any add-on extender is registered
    pub fn has_external_extenders(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.device_type == DeviceType::Extender)
    }

    /// Enabled extenders reporting all of the given capabilities
    pub fn extenders_with(&self, capabilities: ExtenderCapabilities) -> Vec<&DeviceRecord> {
        self.records
            .iter()
            .filter(|r| {
                r.enabled
                    && matches!(
                        r.device_type,
                        DeviceType::Extender | DeviceType::PicoExtender
                    )
                    && r.capabilities.contains(capabilities)
            })
            .collect()
    }

    /// Address of the device providing RC input, if any
    pub fn rc_input_address(&self) -> Option<u8> {
        self.records
            .iter()
            .find(|r| r.enabled && r.device_type == DeviceType::RcInput)
            .or_else(|| {
                self.extenders_with(ExtenderCapabilities::RC_IN)
                    .into_iter()
                    .next()
            })
            .map(|r| r.address)
    }
}

fn log_query_failure(address: u8, what: &str, error: &DetectError) {
    match error {
        DetectError::Protocol(ProtocolError::Parse(ParseError::ChecksumMismatch {
            expected,
            actual,
        })) => warn!(
            "{} reply from 0x{:02X} failed CRC (expected 0x{:02X}, got 0x{:02X}), discarded",
            what, address, expected, actual
        ),
        other => warn!("{} to 0x{:02X} failed: {}", what, address, other),
    }
}

/// Scan every present candidate bus
fn scan_all_buses(
    probe: &mut dyn BusProbe,
    transport: &mut dyn ExtenderTransport,
    board: BoardClass,
    max_devices: usize,
) -> Vec<BusInfo> {
    let mut buses = Vec::new();
    for number in probe.candidate_buses() {
        if !probe.bus_present(number) {
            continue;
        }
        info!("Scanning I2C bus i2c-{}", number);
        buses.push(scan_bus(probe, transport, board, number, max_devices));
    }
    info!("Found {} I2C bus(es)", buses.len());
    buses
}

fn scan_bus(
    probe: &mut dyn BusProbe,
    transport: &mut dyn ExtenderTransport,
    board: BoardClass,
    number: u8,
    max_devices: usize,
) -> BusInfo {
    let mut bus = BusInfo::new(number);
    for window in scan_windows(board, number) {
        match probe.scan(number, window) {
            Ok(found) => {
                for address in found {
                    info!(
                        "Found device on i2c-{} at 0x{:02X} ({})",
                        number,
                        address,
                        device_name(address)
                    );
                    bus.mark_present(address);
                }
            }
            Err(e) => warn!(
                "Scan of i2c-{} 0x{:02X}..0x{:02X} failed: {}",
                number, window.first, window.last, e
            ),
        }
    }

    if bus.device_count() > max_devices {
        warn!(
            "i2c-{} reported {} devices, treating it as noise",
            number,
            bus.device_count()
        );
        bus.present = 0;
        return bus;
    }

    if bus.has_device(ADDRESS_PICO_EXTENDER) {
        match query_extender(
            transport,
            number,
            ADDRESS_PICO_EXTENDER,
            &ExtenderRequest::GetVersion,
        ) {
            Ok(ExtenderResponse::Version { major, minor }) => {
                info!("Pico extender firmware {}.{}", major, minor);
                bus.pico_extender_version = Some((major, minor));
            }
            Ok(other) => warn!("Pico extender answered GET_VERSION with {:?}", other),
            Err(e) => log_query_failure(ADDRESS_PICO_EXTENDER, "GET_VERSION", &e),
        }
    }
    bus
}

/// Render records in the settings file format
pub fn serialize_settings(records: &[DeviceRecord]) -> String {
    let mut out = format!("{}\n{} {}\n", SETTINGS_STAMP, COUNT_LABEL, records.len());
    for r in records {
        let name = if r.name.is_empty() {
            "~".to_string()
        } else {
            r.name.replace(' ', "~")
        };
        out.push_str(&format!(
            "{} {} {} {} {} {} 0 {}\n",
            r.address,
            r.version,
            r.device_type as i32,
            name,
            u8::from(r.configurable),
            u8::from(r.enabled),
            r.capabilities.bits()
        ));
        let params: Vec<String> = r.params.iter().map(|p| p.to_string()).collect();
        out.push_str(&params.join(" "));
        out.push('\n');
    }
    out
}

/// Parse the settings file format
pub fn parse_settings(text: &str) -> Result<Vec<DeviceRecord>, SettingsError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(SETTINGS_STAMP) => {}
        Some(other) => return Err(SettingsError::StampMismatch(other.to_string())),
        None => return Err(SettingsError::Empty),
    }

    let count_line = lines.next().ok_or(SettingsError::BadCount(String::new()))?;
    let count: usize = count_line
        .strip_prefix(COUNT_LABEL)
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| SettingsError::BadCount(count_line.to_string()))?;
    if count > MAX_RECORDS {
        return Err(SettingsError::TooManyRecords {
            count,
            max: MAX_RECORDS,
        });
    }

    let mut records = Vec::with_capacity(count);
    for index in 0..count {
        let header = lines.next().ok_or(SettingsError::Truncated {
            index,
            what: "header",
        })?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() != 8 {
            return Err(SettingsError::FieldCount {
                index,
                what: "fields",
                expected: 8,
                found: fields.len(),
            });
        }
        let bad = |field: &'static str, token: &str| SettingsError::BadField {
            index,
            field,
            token: token.to_string(),
        };
        let number = |i: usize, field: &'static str| -> Result<i64, SettingsError> {
            fields[i].parse::<i64>().map_err(|_| bad(field, fields[i]))
        };

        let address = u8::try_from(number(0, "address")?)
            .ok()
            .filter(|a| *a < 128)
            .ok_or_else(|| bad("address", fields[0]))?;
        let version =
            i32::try_from(number(1, "version")?).map_err(|_| bad("version", fields[1]))?;
        let name = if fields[3] == "~" {
            String::new()
        } else {
            fields[3].replace('~', " ")
        };
        let caps = u16::try_from(number(7, "capabilities")?)
            .map_err(|_| bad("capabilities", fields[7]))?;

        let param_line = lines.next().ok_or(SettingsError::Truncated {
            index,
            what: "params",
        })?;
        let values: Vec<i32> = param_line
            .split_whitespace()
            .map(|t| t.parse::<i32>().map_err(|_| bad("param", t)))
            .collect::<Result<_, _>>()?;
        if values.len() != MAX_DEVICE_PARAMS {
            return Err(SettingsError::FieldCount {
                index,
                what: "params",
                expected: MAX_DEVICE_PARAMS,
                found: values.len(),
            });
        }
        let mut params = [0i32; MAX_DEVICE_PARAMS];
        params.copy_from_slice(&values);

        let mut record = DeviceRecord {
            address,
            version,
            device_type: DeviceType::from_code(number(2, "type")?),
            name: String::new(),
            configurable: number(4, "configurable")? != 0,
            enabled: number(5, "enabled")? != 0,
            capabilities: ExtenderCapabilities::from_bits_retain(caps),
            params,
        };
        record.set_name(&name);
        records.push(record);
    }
    Ok(records)
}
