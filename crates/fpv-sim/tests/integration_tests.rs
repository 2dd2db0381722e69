//! Integration tests for the simulation layer
//!
//! These tests run real discovery and configuration code against virtual
//! hardware:
//! - Registry enumeration and device checks over a virtual bus
//! - Fault injection (corrupted replies, silent devices, bus noise)
//! - Radio models built from the canned hardware profiles

use fpv_detect::{BoardClass, DetectionCache, DeviceRegistry};
use fpv_model::{HardwareInventory, Model};
use fpv_protocol::{CommandId, DeviceType, ExtenderCapabilities};
use fpv_sim::{HardwareProfile, VirtualBus, VirtualExtender, VirtualExtenderConfig};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn registry(dir: &tempfile::TempDir) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new(dir.path().join("devices.cfg"));
        registry.load().unwrap();
        registry
    }

    pub fn enumerate(registry: &mut DeviceRegistry, bus: &VirtualBus) {
        let mut cache = DetectionCache::new();
        registry.enumerate(
            &mut cache,
            &mut bus.clone(),
            &mut bus.clone(),
            BoardClass::Generic,
        );
    }

    pub fn knob(address: u8) -> VirtualExtender {
        VirtualExtender::from_config(VirtualExtenderConfig {
            address,
            name: "Knob Panel".to_string(),
            version: (1, 3),
            capabilities: ExtenderCapabilities::ROTARY | ExtenderCapabilities::LEDS,
        })
    }

    pub fn requests_of(bus: &VirtualBus, address: u8, command: CommandId) -> usize {
        bus.with_extender(address, |e| {
            e.requests().iter().filter(|c| **c == command).count()
        })
        .unwrap_or(0)
    }
}

// ============================================================================
// Discovery Tests
// ============================================================================

mod discovery_tests {
    use super::*;

    #[test]
    fn vehicle_bus_is_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = HardwareProfile::Vehicle.bus();

        helpers::enumerate(&mut registry, &bus);
        assert!(registry.check_devices(&mut bus.clone()).unwrap());

        assert!(registry.has_device(0x36));
        assert!(registry.has_device(0x40));
        assert!(registry.has_current_sensor());
        assert_eq!(registry.buses()[0].pico_extender_version, Some((2, 4)));

        let pico = registry.get(0x6D).unwrap();
        assert_eq!(pico.device_type, DeviceType::PicoExtender);
        assert_eq!(pico.version, 0x24);
        assert!(pico.capabilities.contains(ExtenderCapabilities::BUTTONS));
    }

    #[test]
    fn extender_identity_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.add_extender(2, helpers::knob(0x62));

        helpers::enumerate(&mut registry, &bus);
        registry.check_devices(&mut bus.clone()).unwrap();

        let record = registry.get(0x62).unwrap();
        assert_eq!(record.name, "Knob Panel");
        assert_eq!(
            record.capabilities,
            ExtenderCapabilities::ROTARY | ExtenderCapabilities::LEDS
        );
        assert_eq!(registry.bus_for(0x62), Some(2));
    }

    #[test]
    fn renamed_extender_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.add_extender(1, helpers::knob(0x62));
        helpers::enumerate(&mut registry, &bus);
        registry.check_devices(&mut bus.clone()).unwrap();

        bus.with_extender(0x62, |e| e.set_name("Knob Panel 2"));
        assert!(registry.check_devices(&mut bus.clone()).unwrap());
        assert_eq!(registry.get(0x62).unwrap().name, "Knob Panel 2");

        let mut reloaded = DeviceRegistry::new(registry.settings_path());
        reloaded.load().unwrap();
        assert_eq!(reloaded.get(0x62).unwrap().name, "Knob Panel 2");
    }

    #[test]
    fn inventory_tracks_bus_changes() {
        let dir = tempfile::tempdir().unwrap();
        let bus = VirtualBus::new();
        bus.add_device(1, 0x40);

        let mut registry = helpers::registry(&dir);
        helpers::enumerate(&mut registry, &bus);
        let before = HardwareInventory::from_registry(&registry, 2, Vec::new());

        bus.add_device(1, 0x36);
        let mut registry = helpers::registry(&dir);
        helpers::enumerate(&mut registry, &bus);
        let after = HardwareInventory::from_registry(&registry, 2, Vec::new());

        assert!(before.bus_devices_changed(&after));
        assert_eq!(after.bus_devices, vec![(1, 0x36), (1, 0x40)]);
    }
}

// ============================================================================
// Fault Injection Tests
// ============================================================================

mod fault_tests {
    use super::*;

    #[test]
    fn corrupted_flags_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.add_extender(1, helpers::knob(0x62));
        helpers::enumerate(&mut registry, &bus);

        bus.with_extender(0x62, |e| e.corrupt_next_replies(1));
        registry.check_devices(&mut bus.clone()).unwrap();

        let record = registry.get(0x62).unwrap();
        assert_eq!(record.capabilities, ExtenderCapabilities::empty());
        assert_eq!(record.name, "Knob Panel");
        assert_eq!(helpers::requests_of(&bus, 0x62, CommandId::GetFlags), 1);
    }

    #[test]
    fn name_survives_transient_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.add_extender(1, helpers::knob(0x63));
        helpers::enumerate(&mut registry, &bus);

        // flags reply plus three name replies
        bus.with_extender(0x63, |e| e.corrupt_next_replies(4));
        registry.check_devices(&mut bus.clone()).unwrap();

        assert_eq!(helpers::requests_of(&bus, 0x63, CommandId::GetName), 4);
        assert_eq!(registry.get(0x63).unwrap().name, "Knob Panel");
    }

    #[test]
    fn silent_extender_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.add_extender(1, helpers::knob(0x64));
        helpers::enumerate(&mut registry, &bus);

        bus.with_extender(0x64, |e| e.set_silent(true));
        registry.check_devices(&mut bus.clone()).unwrap();

        let record = registry.get(0x64).unwrap();
        assert_eq!(record.name, "Add-on Extender");
        assert!(record.capabilities.is_empty());
    }

    #[test]
    fn noisy_bus_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = helpers::registry(&dir);
        let bus = VirtualBus::new();
        bus.set_noisy(3, true);
        bus.add_device(1, 0x40);

        helpers::enumerate(&mut registry, &bus);

        assert!(registry.has_device(0x40));
        assert!(registry.present_devices().iter().all(|(b, _)| *b == 1));
    }

    #[test]
    fn moved_extender_answers_at_new_address() {
        use fpv_detect::query_extender;
        use fpv_protocol::{ExtenderRequest, ExtenderResponse};

        let bus = VirtualBus::new();
        bus.add_extender(1, helpers::knob(0x62));
        let mut transport = bus.clone();

        let frame = fpv_protocol::EncodeCommand::encode(&ExtenderRequest::SetAddress {
            address: 0x65,
        });
        bus.with_extender(0x62, |e| e.handle(&frame));

        assert!(query_extender(&mut transport, 1, 0x62, &ExtenderRequest::GetName).is_err());
        assert_eq!(
            query_extender(&mut transport, 1, 0x65, &ExtenderRequest::GetName).unwrap(),
            ExtenderResponse::Name("Knob Panel".to_string())
        );
    }
}

// ============================================================================
// Profile Tests
// ============================================================================

mod profile_tests {
    use super::*;

    fn model_for(profile: HardwareProfile) -> Model {
        let mut model = Model::new_vehicle(42);
        model.populate_radio_from_hardware(&profile.radios());
        model.validate_settings();
        model
    }

    #[test]
    fn vehicle_profile_gets_a_link_per_radio() {
        let model = model_for(HardwareProfile::Vehicle);
        assert_eq!(model.radio.links().len(), 3);
        assert!(model.radio.link_is_sik(2));
    }

    #[test]
    fn long_range_profile_has_elrs_link() {
        let model = model_for(HardwareProfile::Long);
        assert_eq!(model.radio.links().len(), 2);
        assert!(model.radio.link_is_elrs(1));
    }

    #[test]
    fn relay_profile_supports_relay_link() {
        let mut model = model_for(HardwareProfile::Relay);
        assert!(model.set_relay_link(Some(2)));
        assert_eq!(model.relay.link_id, Some(2));
        assert!(!model.set_relay_link(Some(7)));
    }

    #[test]
    fn vehicle_profile_can_swap() {
        let radios = HardwareProfile::Vehicle.radios();
        let mut model = model_for(HardwareProfile::Vehicle);

        assert!(model.swap_radio_interfaces(Some(&radios[..])));
        assert_eq!(model.radio.interface(0).unwrap().link_id.index(), Some(1));
        assert_eq!(model.radio.interface(1).unwrap().link_id.index(), Some(0));
        assert_eq!(model.radio.last_swapped(), Some((0, 1)));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// A reply with a bad CRC never updates the registry
        #[test]
        fn corrupted_replies_never_stored(corrupt in 0usize..16) {
            let dir = tempfile::tempdir().unwrap();
            let mut registry = helpers::registry(&dir);
            let bus = VirtualBus::new();
            bus.add_extender(1, helpers::knob(0x66));
            helpers::enumerate(&mut registry, &bus);

            bus.with_extender(0x66, |e| e.corrupt_next_replies(corrupt));
            registry.check_devices(&mut bus.clone()).unwrap();

            let record = registry.get(0x66).unwrap();
            // one flags query, then up to ten name queries
            let flags_ok = corrupt == 0;
            let name_ok = corrupt <= 10;
            prop_assert_eq!(
                record.capabilities.contains(ExtenderCapabilities::ROTARY),
                flags_ok
            );
            prop_assert_eq!(record.name == "Knob Panel", name_ok);
        }
    }
}
