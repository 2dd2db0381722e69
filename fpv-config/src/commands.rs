//! Subcommand implementations
//!
//! Every command writes its report to the given output so the binary and
//! the tests share one code path.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use fpv_detect::{
    probe_sik_port, BusProbe, DetectionCache, DeviceRegistry, ExtenderTransport, LoadStatus,
    SerialScanner, ShellBusProbe, ShellExtenderTransport,
};
use fpv_model::{ConfigStore, HardwareInventory, LoadOutcome, LoadSource, Model};
use fpv_protocol::radio::format_frequency;
use fpv_protocol::{CapabilityFlags, HardwareRadio};
use fpv_sim::HardwareProfile;
use tracing::{debug, info};

use crate::cli::{Command, RelayTarget};
use crate::settings::Settings;

/// Everything a command needs besides its own arguments
pub struct Session {
    settings: Settings,
    store: ConfigStore,
    simulate: bool,
    profile: HardwareProfile,
    hardware: Option<Vec<HardwareRadio>>,
}

impl Session {
    pub fn new(
        settings: Settings,
        simulate: bool,
        profile: HardwareProfile,
        hardware_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let hardware = hardware_file.map(load_hardware).transpose()?;
        let store = ConfigStore::new(&settings.model_path);
        Ok(Self {
            settings,
            store,
            simulate,
            profile,
            hardware,
        })
    }

    /// Radios on this system, if known
    ///
    /// An explicit hardware file wins over the simulated profile.
    fn radios(&self) -> Option<Vec<HardwareRadio>> {
        self.hardware
            .clone()
            .or_else(|| self.simulate.then(|| self.profile.radios()))
    }

    pub fn run(&self, command: &Command, out: &mut dyn Write) -> anyhow::Result<()> {
        match command {
            Command::Show { json } => self.show(*json, out),
            Command::Populate => self.populate(out),
            Command::Reconcile => self.reconcile(out),
            Command::Validate => self.validate(out),
            Command::Swap => self.swap(out),
            Command::Rotate => self.rotate(out),
            Command::Relay { link } => self.relay(*link, out),
            Command::ScanBus => self.scan_bus(out),
            Command::Devices => self.devices(out),
            Command::Ports => self.ports(out),
            Command::ProbeSik { port, baud } => self.probe_sik(port, *baud, out),
        }
    }

    fn load(&self) -> LoadOutcome {
        let outcome = self.store.load();
        debug!(
            "Model from {:?} ({} warning(s))",
            outcome.source,
            outcome.warnings.len()
        );
        outcome
    }

    /// Validate and write both copies
    fn commit(&self, model: &mut Model) -> anyhow::Result<()> {
        model.validate_settings();
        self.store.save(model).with_context(|| {
            format!("Failed to save model to {}", self.store.primary_path().display())
        })
    }

    // ------------------------------------------------------------------
    // Model commands
    // ------------------------------------------------------------------

    fn show(&self, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
        let outcome = self.load();
        if json {
            let text =
                serde_json::to_string_pretty(&outcome.model).context("Failed to encode model")?;
            writeln!(out, "{}", text)?;
            return Ok(());
        }
        print_model(&outcome, out)?;
        Ok(())
    }

    fn populate(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let radios = self
            .radios()
            .context("No hardware description, pass --hardware <json> or --simulate")?;
        let mut model = self.load().model;
        model.populate_radio_from_hardware(&radios);
        self.commit(&mut model)?;
        writeln!(
            out,
            "Populated {} radio link(s) for {} radio interface(s)",
            model.radio.links().len(),
            model.radio.interfaces().len()
        )?;
        Ok(())
    }

    fn reconcile(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut model = self.load().model;
        let changed = model.reconcile_radio();
        self.commit(&mut model)?;
        if changed {
            writeln!(out, "Radio links repaired, {} link(s)", model.radio.links().len())?;
        } else {
            writeln!(out, "Radio links already consistent")?;
        }
        Ok(())
    }

    fn validate(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut model = self.load().model;
        let repaired = model.validate_settings();
        self.commit(&mut model)?;
        if repaired {
            writeln!(out, "Model repaired and saved")?;
        } else {
            writeln!(out, "Model is valid")?;
        }
        Ok(())
    }

    fn swap(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let radios = self.radios();
        let mut model = self.load().model;
        if !model.swap_radio_interfaces(radios.as_deref()) {
            bail!("No pair of high capacity radio interfaces can trade links");
        }
        self.commit(&mut model)?;
        if let Some((a, b)) = model.radio.last_swapped() {
            writeln!(out, "Swapped radio interfaces {} and {}", a + 1, b + 1)?;
        }
        Ok(())
    }

    fn rotate(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut model = self.load().model;
        if !model.rotate_radio_links() {
            bail!("Need at least two radio links to rotate");
        }
        self.commit(&mut model)?;
        writeln!(out, "Rotated {} radio links", model.radio.links().len())?;
        Ok(())
    }

    fn relay(&self, target: RelayTarget, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut model = self.load().model;
        let link = match target {
            RelayTarget::Off => None,
            RelayTarget::Link(index) => {
                let count = model.radio.links().len();
                if index >= count {
                    bail!("Radio link {} does not exist, the model has {}", index + 1, count);
                }
                Some(index)
            }
        };
        let changed = model.set_relay_link(link);
        self.commit(&mut model)?;
        match (changed, link) {
            (false, _) => writeln!(out, "Relay unchanged")?,
            (true, Some(index)) => writeln!(out, "Relaying on radio link {}", index + 1)?,
            (true, None) => writeln!(out, "Relaying off")?,
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hardware commands
    // ------------------------------------------------------------------

    fn scan_bus(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut registry = DeviceRegistry::new(&self.settings.device_settings_path);
        registry
            .load()
            .context("Failed to read the device settings file")?;

        if self.simulate {
            let bus = self.profile.bus();
            self.enumerate(&mut registry, &mut bus.clone(), &mut bus.clone())?;
        } else {
            let mut probe = ShellBusProbe::with_config(self.settings.scan_config());
            let mut transport = ShellExtenderTransport::with_config(self.settings.transfer_config());
            self.enumerate(&mut registry, &mut probe, &mut transport)?;
        }

        for bus in registry.buses() {
            write!(out, "{}:", bus.name)?;
            if bus.device_count() == 0 {
                write!(out, " no devices")?;
            }
            for address in bus.devices() {
                write!(out, " 0x{:02X}", address)?;
            }
            if let Some((major, minor)) = bus.pico_extender_version {
                write!(out, " (Pico extender {}.{})", major, minor)?;
            }
            writeln!(out)?;
        }
        if registry.buses().is_empty() {
            writeln!(out, "No I2C buses found")?;
        }

        self.update_inventory(&registry, out)
    }

    fn enumerate(
        &self,
        registry: &mut DeviceRegistry,
        probe: &mut dyn BusProbe,
        transport: &mut dyn ExtenderTransport,
    ) -> anyhow::Result<()> {
        let mut cache = DetectionCache::new();
        registry.enumerate(&mut cache, probe, transport, self.settings.board);
        registry
            .check_devices(transport)
            .context("Failed to update the device settings file")?;
        Ok(())
    }

    /// Record what the scan found in the model
    fn update_inventory(&self, registry: &DeviceRegistry, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut model = self.load().model;
        let (radio_count, serial_ports) = match self.radios() {
            Some(radios) => (radios.len(), HardwareInventory::serial_ports_for(&radios)),
            None => (
                model.hardware.radio_count,
                model.hardware.serial_ports.clone(),
            ),
        };
        let inventory = HardwareInventory::from_registry(registry, radio_count, serial_ports);
        if inventory == model.hardware {
            return Ok(());
        }
        if inventory.bus_devices_changed(&model.hardware) {
            info!("Bus devices changed since the last scan");
            writeln!(out, "Bus devices changed since the last scan")?;
        }
        model.hardware = inventory;
        self.commit(&mut model)
    }

    fn devices(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut registry = DeviceRegistry::new(&self.settings.device_settings_path);
        let status = registry
            .load()
            .context("Failed to read the device settings file")?;
        if status == LoadStatus::Reset {
            writeln!(out, "Device settings were missing or damaged and have been reset")?;
        }
        if registry.records().is_empty() {
            writeln!(out, "No devices recorded")?;
        }
        for record in registry.records() {
            writeln!(
                out,
                "0x{:02X} {:<24} {:?}{}{}",
                record.address,
                record.name,
                record.device_type,
                if record.enabled { "" } else { " (disabled)" },
                if record.capabilities.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flag_names(record.capabilities.iter_names()))
                }
            )?;
        }
        Ok(())
    }

    fn ports(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        if self.simulate {
            for radio in self.profile.radios().iter().filter(|r| r.is_serial()) {
                writeln!(out, "{} ({})", radio.name, radio.card_model.name())?;
            }
            return Ok(());
        }
        let ports = SerialScanner::new()
            .enumerate_ports()
            .context("Failed to list serial ports")?;
        if ports.is_empty() {
            writeln!(out, "No serial ports found")?;
        }
        for port in ports {
            match &port.product {
                Some(product) => writeln!(out, "{} ({})", port.port, product)?,
                None => writeln!(out, "{}", port.port)?,
            }
        }
        Ok(())
    }

    fn probe_sik(&self, port: &str, baud: Option<u32>, out: &mut dyn Write) -> anyhow::Result<()> {
        let found = if self.simulate {
            self.profile
                .radios()
                .into_iter()
                .find(|r| r.is_sik() && r.name == port)
        } else {
            let rates = match baud {
                Some(rate) => vec![rate],
                None => self.settings.sik_baud_rates.clone(),
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start the async runtime")?;
            runtime.block_on(async {
                for rate in rates {
                    if let Some(radio) = probe_sik_port(port, rate).await {
                        info!("SiK radio on {} at {} baud", port, rate);
                        return Some(radio);
                    }
                }
                None
            })
        };

        let Some(radio) = found else {
            bail!("No SiK radio answered on {}", port);
        };
        writeln!(
            out,
            "SiK radio on {}: {}, bands {}",
            port,
            radio.mac,
            radio.supported_bands.describe()
        )?;
        let text = serde_json::to_string_pretty(&radio).context("Failed to encode radio")?;
        writeln!(out, "{}", text)?;
        Ok(())
    }
}

fn load_hardware(path: &Path) -> anyhow::Result<Vec<HardwareRadio>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hardware file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Hardware file {} is not a list of radios", path.display()))
}

fn flag_names<B>(names: impl Iterator<Item = (&'static str, B)>) -> String {
    names.map(|(name, _)| name).collect::<Vec<_>>().join("|")
}

fn print_model(outcome: &LoadOutcome, out: &mut dyn Write) -> std::io::Result<()> {
    let model = &outcome.model;
    writeln!(
        out,
        "{} (id {}, software {}.{}, save #{})",
        model.display_name(),
        model.vehicle_id,
        model.sw_version >> 8,
        model.sw_version & 0xFF,
        model.save_count
    )?;
    match (outcome.source, outcome.version) {
        (LoadSource::Defaults, _) | (_, None) => writeln!(out, "Using default settings")?,
        (LoadSource::Primary, Some(v)) => writeln!(out, "Loaded {} model file", v)?,
        (LoadSource::Backup, Some(v)) => writeln!(out, "Recovered from {} backup", v)?,
    }

    let topology = &model.radio;
    writeln!(out, "Radio interfaces:")?;
    if topology.interfaces().is_empty() {
        writeln!(out, "  none")?;
    }
    for (i, iface) in topology.interfaces().iter().enumerate() {
        writeln!(
            out,
            "  {}. {:<24} {:<18} bands {:<10} link {} on {} [{}]",
            i + 1,
            iface.card_model.name(),
            iface.mac,
            iface.supported_bands.describe(),
            iface.link_id,
            format_frequency(iface.current_frequency_khz),
            flag_names(iface.capabilities.iter_names())
        )?;
    }

    writeln!(out, "Radio links:")?;
    if topology.links().is_empty() {
        writeln!(out, "  none")?;
    }
    for (i, link) in topology.links().iter().enumerate() {
        let relay = if link.capabilities.contains(CapabilityFlags::RELAY) {
            " relay"
        } else {
            ""
        };
        writeln!(
            out,
            "  {}. {} video {} data {}{} [{}]",
            i + 1,
            format_frequency(link.frequency_khz),
            link.video_rate,
            topology.downlink_data_rate(i),
            relay,
            flag_names(link.capabilities.iter_names())
        )?;
    }
    Ok(())
}
