//! Integration tests for the vehicle model
//!
//! These tests exercise the model end to end:
//! - Default link population and reconciliation scenarios
//! - Swap, rotate and relay election through the model
//! - Reading v8, v9 and v10 files and the dual-copy store
//! - Property tests for the topology invariants and round-tripping

use std::fs;

use fpv_model::{
    interfaces_from_hardware, ConfigCodec, ConfigStore, FormatVersion, LinkId, LoadSource, Model,
    ModelError, ParseError, RadioLink, RadioTopology,
};
use fpv_protocol::radio::{DEFAULT_FREQUENCY_433, DEFAULT_FREQUENCY_58, DEFAULT_FREQUENCY_58_2};
use fpv_protocol::{Band, CapabilityFlags, CardModel, HardwareRadio, RadioDriver};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn wifi(mac: &str, bands: Band) -> HardwareRadio {
        HardwareRadio::wifi(
            "wlan",
            mac,
            RadioDriver::Rtl88xxau,
            CardModel::ALFA_AWUS036ACH,
            bands,
        )
    }

    pub fn sik(bands: Band) -> HardwareRadio {
        HardwareRadio::sik("/dev/ttyUSB0", bands)
    }

    /// Two 5.8 GHz WiFi cards and a 433 MHz SiK radio
    pub fn vehicle_radios() -> Vec<HardwareRadio> {
        vec![
            wifi("00:c0:ca:00:00:01", Band::B58 | Band::B24),
            wifi("00:c0:ca:00:00:02", Band::B58 | Band::B24),
            sik(Band::B433),
        ]
    }

    pub fn vehicle_model() -> Model {
        let mut model = Model::new_vehicle(77);
        model.populate_radio_from_hardware(&vehicle_radios());
        model
    }

    pub fn parse_valid(text: &str) -> Model {
        let mut model = ConfigCodec::parse(text).unwrap().model;
        model.validate_settings();
        model
    }

    /// The same vehicle written by each format version
    pub const SAMPLE_V10: &str = "ver: 10
vVIII.3stamp
savecounter: 12
id: 2819 77 1234 5
3
Sky_Hawk
1 0 -8
0 2 3600 1
cpu: -10 0 3
3 900 400
-11 3 -9
radio_interfaces: 2
  4 0 5805000
  613 10 16712707 64 40 0 00:c0:ca:00:00:01- 1.2-
  100 1 430000
  3172 16 16713733 64 20 0 /dev/ttyUSB0- X-
0 1 1 0 0 0 0 0 0
0
radio_links: 2
  5805000 613 64 18 6 100 0 18 6
  0 0
  430000 3172 64 64000 64000 100 0 64000 64000
  0 0
50 0
0 0 0 0 0 0 0
relay: -1 0 0 0 0
telem: 1 1 10 0 0
200 0 0 0
1 255 7
0 0
0
hw_info: 2 1 2 1
1
1 64
1 65
 57600 6144 /dev/ttyUSB0
";

    pub const SAMPLE_V9: &str = "ver: 9
vVIII.3stamp
savecounter: 12
id: 2819 77 1234 5
3
Sky_Hawk
1 0 -8
0 2 3600 1
cpu: -10 0 3
3 900 400
-11 3 -9
radio_interfaces: 2
  4 0 5805000
  613 10 16712707 64 40 0 00:c0:ca:00:00:01- 1.2-
  100 1 430000
  3172 16 16713733 64 20 0 /dev/ttyUSB0- X-
0 1 1 0 0 0 0 0 0
0
radio_links: 2
  5805000 613 64 18 6 100 0 18 6
  430000 3172 64 64000 64000 100 0 64000 64000
0 0 0 0 0 0 0 0 0 0 0 0
relay: -1 0 0 0 0
telem: 1 1 10 0 0
200 0 0 0
1 255 7
0 0
0
hw_info: 2 1 2 1
1
1 64
1 65
 57600 6144 /dev/ttyUSB0
";

    pub const SAMPLE_V8: &str = "ver: 8
vVIII.3stamp
savecounter: 12
id: 2819 77 1234 5
Sky_Hawk
1 0 -8
0 2 3600 1
cpu: -10 0 3
3 900 400
-11 3 -9
radio_interfaces: 2
  4 0 5805
  613 10 16712707 64 40 0 00:c0:ca:00:00:01- 1.2-
  100 1 430
  3172 16 16713733 64 20 0 /dev/ttyUSB0- X-
0 1 1 0 0 0 0 0 0
radio_links: 2
  5805 613 64 18 6 100 0 18 6
  430 3172 64 64000 64000 100 0 64000 64000
  0 0 0 0 0 0 0 0 0
  0 0 0 0 0 0 0 0 0
  0 0 0 0 0 0 0 0 0
  0 0 0 0 0 0 0 0 0
0 0 0 0 0 0 0 0 0 0 0 0
relay: -1 0 0 0
telem: 1 1 10 0 0
200 0 0 0
1 255 7
0 0
0
hw_info: 2 1 2 1
1
1 64
1 65
 6144 /dev/ttyUSB0
";
}

// ============================================================================
// Topology Tests
// ============================================================================

mod topology_tests {
    use super::*;

    #[test]
    fn test_populate_two_wifi_and_sik() {
        let mut topo = RadioTopology::from_interfaces(interfaces_from_hardware(
            &helpers::vehicle_radios(),
        ));
        topo.populate_defaults();

        let links = topo.links();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].frequency_khz, DEFAULT_FREQUENCY_58);
        assert_eq!(links[1].frequency_khz, DEFAULT_FREQUENCY_58_2);
        assert_eq!(links[2].frequency_khz, DEFAULT_FREQUENCY_433);

        for (i, iface) in topo.interfaces().iter().enumerate() {
            assert_eq!(iface.link_id, LinkId::new(i));
        }
        assert!(links[0].is_high_capacity());
        assert!(links[1].is_high_capacity());
        assert!(!links[2].is_high_capacity());
        assert!(links[2].capabilities.contains(CapabilityFlags::SIK));
        assert!(topo.link_is_sik(2));
        assert!(topo.link_is_wifi(0));
    }

    #[test]
    fn test_reconcile_collapses_identical_frequencies() {
        let mut interfaces = interfaces_from_hardware(&[
            helpers::wifi("aa:01", Band::B58),
            helpers::wifi("aa:02", Band::B58),
        ]);
        interfaces[0].link_id = LinkId::new(0);
        interfaces[1].link_id = LinkId::new(1);
        let mut links = vec![RadioLink::default(), RadioLink::default()];
        for link in &mut links {
            link.frequency_khz = 5_785_000;
        }
        let mut topo = RadioTopology::from_parts(interfaces, links);

        assert!(topo.reconcile());
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.links()[0].frequency_khz, 5_785_000);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(0));
        assert_eq!(topo.interfaces()[1].link_id, LinkId::new(0));
    }

    #[test]
    fn test_reconcile_after_card_removed() {
        let model = helpers::vehicle_model();
        let mut interfaces = model.radio.interfaces().to_vec();
        interfaces.remove(1);
        // interface 2 still points at link 3
        let mut topo = RadioTopology::from_parts(interfaces, model.radio.links().to_vec());

        assert!(topo.reconcile());
        assert_eq!(topo.links().len(), 2);
        assert_eq!(topo.links()[0].frequency_khz, DEFAULT_FREQUENCY_58);
        assert_eq!(topo.links()[1].frequency_khz, DEFAULT_FREQUENCY_433);
        assert_eq!(topo.interfaces()[1].link_id, LinkId::new(1));
    }

    #[test]
    fn test_reconcile_adopts_new_card() {
        let mut model = helpers::vehicle_model();
        let mut interfaces = model.radio.interfaces().to_vec();
        interfaces.extend(interfaces_from_hardware(&[helpers::wifi("aa:09", Band::B24)]));
        model.radio = RadioTopology::from_parts(interfaces, model.radio.links().to_vec());

        assert!(model.reconcile_radio());
        assert_eq!(model.radio.links().len(), 4);
        assert_eq!(model.radio.interfaces()[3].link_id, LinkId::new(3));
        assert_eq!(model.radio.links()[3].frequency_khz, 2_472_000);
        assert!(!model.reconcile_radio());
    }

    #[test]
    fn test_swap_exchanges_relay() {
        let mut model = helpers::vehicle_model();
        assert!(model.set_relay_link(Some(1)));
        assert!(model.radio.interfaces()[1]
            .capabilities
            .contains(CapabilityFlags::RELAY));

        let radios = helpers::vehicle_radios();
        assert!(model.swap_radio_interfaces(Some(&radios[..])));
        assert_eq!(model.radio.last_swapped(), Some((0, 1)));
        assert_eq!(model.radio.interfaces()[0].link_id, LinkId::new(1));
        assert!(model.radio.interfaces()[0]
            .capabilities
            .contains(CapabilityFlags::RELAY));
        assert!(!model.radio.interfaces()[1]
            .capabilities
            .contains(CapabilityFlags::RELAY));
        assert!(model.radio.links()[1].is_relay());
    }

    #[test]
    fn test_swap_refused_without_pair() {
        let mut model = Model::new_vehicle(1);
        model.populate_radio_from_hardware(&[
            helpers::wifi("aa:01", Band::B58),
            helpers::sik(Band::B915),
        ]);
        let before = model.clone();
        assert!(!model.swap_radio_interfaces(None));
        assert_eq!(model, before);
    }
}

// ============================================================================
// Codec Tests
// ============================================================================

mod codec_tests {
    use super::*;

    #[test]
    fn test_versions_load_equivalently() {
        let v10 = helpers::parse_valid(helpers::SAMPLE_V10);
        let v9 = helpers::parse_valid(helpers::SAMPLE_V9);
        let v8 = helpers::parse_valid(helpers::SAMPLE_V8);

        assert_eq!(v10.vehicle_name, "Sky Hawk");
        assert_eq!(v10.radio.links().len(), 2);
        assert_eq!(v10.radio.links()[1].frequency_khz, 430_000);
        assert_eq!(v10.hardware.bus_devices, vec![(1, 64), (1, 65)]);
        assert_eq!(v10.hardware.serial_ports[0].name, "/dev/ttyUSB0");
        assert!(v10.hardware.serial_ports[0].is_usb());
        assert_eq!(v9, v10);
        assert_eq!(v8, v10);
    }

    #[test]
    fn test_versions_reported() {
        for (text, version) in [
            (helpers::SAMPLE_V8, FormatVersion::V8),
            (helpers::SAMPLE_V9, FormatVersion::V9),
            (helpers::SAMPLE_V10, FormatVersion::V10),
        ] {
            let parsed = ConfigCodec::parse(text).unwrap();
            assert_eq!(parsed.version, version);
            assert!(parsed.warnings.is_empty());
        }
    }

    #[test]
    fn test_sample_rewritten_as_v10() {
        let model = helpers::parse_valid(helpers::SAMPLE_V8);
        assert_eq!(ConfigCodec::serialize(&model), helpers::SAMPLE_V10);
    }

    #[test]
    fn test_wrong_arity_fails_load() {
        let text = helpers::SAMPLE_V10.replace("cpu: -10 0 3", "cpu: -10 0");
        assert_eq!(
            ConfigCodec::parse(&text).unwrap_err(),
            ParseError::Arity {
                group: "cpu",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_v10_requires_rate_types() {
        // a v9 body under a v10 header loses its positional alignment
        let text = helpers::SAMPLE_V9.replace("ver: 9", "ver: 10");
        assert!(ConfigCodec::parse(&text).is_err());
    }

    #[test]
    fn test_out_of_range_is_soft() {
        let text = helpers::SAMPLE_V10
            .replace("0 2 3600 1", "0 2 3600 -4")
            .replace("-11 3 -9", "-11 3 40");
        let parsed = ConfigCodec::parse(&text).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].is_soft());
        assert_eq!(parsed.model.gps_count, 1);

        let mut model = parsed.model;
        assert!(model.validate_settings());
        assert_eq!(model.priorities.nice_rc, -9);
    }

    #[test]
    fn test_negative_count_is_hard() {
        let text = helpers::SAMPLE_V10.replace("radio_links: 2", "radio_links: -2");
        assert!(matches!(
            ConfigCodec::parse(&text),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_v9_without_hardware_group() {
        let end = helpers::SAMPLE_V9.find("hw_info:").unwrap();
        let model = helpers::parse_valid(&helpers::SAMPLE_V9[..end]);
        assert_eq!(model.hardware, Default::default());
        assert_eq!(model.radio.links().len(), 2);
    }

    #[test]
    fn test_v10_without_hardware_group_fails() {
        let end = helpers::SAMPLE_V10.find("hw_info:").unwrap();
        assert!(matches!(
            ConfigCodec::parse(&helpers::SAMPLE_V10[..end]),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_v10_skips_video_groups_before_hardware() {
        let groups = "video: 0 1 40 2000000
3000
0
 0 0 0 0 0 0 0 0
video_link_profiles: 1
0 0 6000000 -4 -1 0   1280 720
   12 4 1250 30 5000   2 2 0 0 0
cameras: 1 0
camera_0: 0 0 0
cname: *
audio: 0
0 50 2 0
alarms: 0
";
        let text = helpers::SAMPLE_V10.replace("hw_info:", &format!("{}hw_info:", groups))
            + "osd: 0 1 3.200000 1 1\n";
        let model = ConfigCodec::parse(&text).unwrap().model;
        assert_eq!(model, ConfigCodec::parse(helpers::SAMPLE_V10).unwrap().model);
        assert_eq!(model.hardware.bus_numbers, vec![1]);
    }

    #[test]
    fn test_hardware_counts_over_limit_fail() {
        for head in ["hw_info: 2 7 2 1", "hw_info: 2 1 17 1", "hw_info: 2 1 2 7"] {
            let text = helpers::SAMPLE_V10.replace("hw_info: 2 1 2 1", head);
            assert!(
                matches!(ConfigCodec::parse(&text), Err(ParseError::TooMany { .. })),
                "{}",
                head
            );
        }
    }

    #[test]
    fn test_serial_port_lines() {
        let model = ConfigCodec::parse(helpers::SAMPLE_V10).unwrap().model;
        let port = &model.hardware.serial_ports[0];
        assert_eq!(port.speed, 57600);
        assert_eq!(port.usage, 6144);

        let text = helpers::SAMPLE_V10.replace(" 57600 6144 /dev/ttyUSB0\n", "");
        assert!(matches!(
            ConfigCodec::parse(&text),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_v8_keeps_first_links_only() {
        let text = helpers::SAMPLE_V8.replace("radio_links: 2", "radio_links: 1");
        let model = ConfigCodec::parse(&text).unwrap().model;
        assert_eq!(model.radio.links().len(), 1);
        assert_eq!(model.radio.links()[0].frequency_khz, 5_805_000);
    }

    #[test]
    fn test_populated_model_round_trip() {
        let model = helpers::vehicle_model();
        let text = ConfigCodec::serialize(&model);
        let parsed = ConfigCodec::parse(&text).unwrap();
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.model, model);
    }
}

// ============================================================================
// Store Tests
// ============================================================================

mod store_tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
        let mut model = helpers::vehicle_model();
        store.save(&mut model).unwrap();
        store.save(&mut model).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.source, LoadSource::Primary);
        assert_eq!(outcome.version, Some(FormatVersion::V10));
        assert_eq!(outcome.model.save_count, 2);
        assert_eq!(outcome.model, model);
    }

    #[test]
    fn test_radio_names_with_spaces_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
        let mut radio = helpers::wifi("USB WiFi 1", Band::B58);
        radio.port = "usb 1-1.2".to_string();
        let mut model = Model::new_vehicle(5);
        model.populate_radio_from_hardware(&[radio]);
        store.save(&mut model).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.source, LoadSource::Primary);
        assert_eq!(outcome.model.radio.interfaces()[0].mac, "USB_WiFi_1");
        assert_eq!(outcome.model.radio.interfaces()[0].port, "usb_1-1.2");
        assert_eq!(outcome.model, model);
    }

    #[test]
    fn test_corrupt_primary_recovers_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
        let mut model = helpers::vehicle_model();
        store.save(&mut model).unwrap();
        fs::write(store.primary_path(), "ver: 10\ngarbage\n").unwrap();

        let outcome = store.load();
        assert_eq!(outcome.source, LoadSource::Backup);
        assert_eq!(outcome.model, model);

        // the primary was healed
        let healed = fs::read_to_string(store.primary_path()).unwrap();
        assert_eq!(healed, ConfigCodec::serialize(&model));
    }

    #[test]
    fn test_missing_primary_recovers_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
        fs::write(store.backup_path(), helpers::SAMPLE_V9).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.source, LoadSource::Backup);
        assert_eq!(outcome.version, Some(FormatVersion::V9));
        assert!(store.primary_path().exists());
        assert_eq!(
            store.try_load().unwrap().version,
            Some(FormatVersion::V10)
        );
    }

    #[test]
    fn test_both_copies_broken() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
        fs::write(store.primary_path(), "ver: 99\n").unwrap();
        fs::write(store.backup_path(), helpers::SAMPLE_V10.replace("vVIII", "vVII")).unwrap();

        match store.try_load() {
            Err(ModelError::BothCopiesFailed { primary, backup }) => {
                assert!(primary.contains("99"));
                assert!(backup.contains("stamp"));
            }
            other => panic!("unexpected outcome: {:?}", other.map(|o| o.source)),
        }

        let outcome = store.load();
        assert_eq!(outcome.source, LoadSource::Defaults);
        assert_eq!(outcome.model, {
            let mut m = Model::default();
            m.validate_settings();
            m
        });
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;

    fn wifi_bands() -> impl Strategy<Value = Band> {
        prop::sample::select(vec![
            Band::B24,
            Band::B58,
            Band::B24 | Band::B58,
            Band::B23 | Band::B24 | Band::B25 | Band::B58,
        ])
    }

    fn sub_ghz_bands() -> impl Strategy<Value = Band> {
        prop::sample::select(vec![
            Band::B433,
            Band::B868,
            Band::B915,
            Band::B433 | Band::B915,
        ])
    }

    fn hardware_radio() -> impl Strategy<Value = HardwareRadio> {
        prop_oneof![
            3 => (wifi_bands(), any::<bool>(), prop::bool::weighted(0.9)).prop_map(
                |(bands, high_capacity, supported)| {
                    let mut radio = helpers::wifi("00:c0:ca:00:00:01", bands);
                    radio.high_capacity = high_capacity;
                    radio.supported = supported;
                    radio
                }
            ),
            1 => sub_ghz_bands().prop_map(helpers::sik),
            1 => prop::sample::select(vec![433_000u32, 868_000, 915_000, 2_440_000]).prop_map(
                |frequency| {
                    HardwareRadio::serial(
                        "/dev/ttyACM0",
                        CardModel::SERIAL_RADIO_ELRS,
                        Band::B915,
                        frequency,
                    )
                }
            ),
        ]
    }

    fn radios() -> impl Strategy<Value = Vec<HardwareRadio>> {
        prop::collection::vec(hardware_radio(), 0..=8)
    }

    fn frequency_pool() -> impl Strategy<Value = u32> {
        prop::sample::select(vec![
            5_805_000u32,
            5_745_000,
            5_785_000,
            2_472_000,
            430_000,
            914_000,
        ])
    }

    /// P1 to P3
    fn check_topology(topo: &RadioTopology) -> Result<(), TestCaseError> {
        let links = topo.links();
        for (i, a) in links.iter().enumerate() {
            for b in &links[i + 1..] {
                prop_assert_ne!(a.frequency_khz, b.frequency_khz);
            }
        }
        for iface in topo.interfaces() {
            if let Some(link) = iface.link_id.index() {
                prop_assert!(link < links.len());
            }
        }
        for (i, link) in links.iter().enumerate() {
            let expected = topo
                .interfaces_on_link(i)
                .any(|(_, iface)| iface.is_high_capacity());
            prop_assert_eq!(link.is_high_capacity(), expected);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn populate_upholds_invariants(radios in radios()) {
            let mut topo = RadioTopology::from_interfaces(interfaces_from_hardware(&radios));
            topo.populate_defaults();
            check_topology(&topo)?;
            prop_assert!(topo.links().len() <= topo.interfaces().len());
        }

        #[test]
        fn reconcile_upholds_invariants(
            radios in radios(),
            frequencies in prop::collection::vec(frequency_pool(), 6),
        ) {
            let mut topo = RadioTopology::from_interfaces(interfaces_from_hardware(&radios));
            topo.populate_defaults();
            let mut links = topo.links().to_vec();
            for (link, frequency) in links.iter_mut().zip(&frequencies) {
                link.frequency_khz = *frequency;
            }
            let mut topo = RadioTopology::from_parts(topo.interfaces().to_vec(), links);

            topo.reconcile();
            check_topology(&topo)?;
            prop_assert!(!topo.reconcile());
        }

        #[test]
        fn relay_flag_is_singleton(radios in radios(), relay in prop::option::of(0usize..8)) {
            let mut model = Model::new_vehicle(1);
            model.populate_radio_from_hardware(&radios);
            model.relay.link_id = relay;
            model.validate_settings();

            let relays: Vec<usize> = model
                .radio
                .links()
                .iter()
                .enumerate()
                .filter(|(_, l)| l.is_relay())
                .map(|(i, _)| i)
                .collect();
            prop_assert!(relays.len() <= 1);
            if let Some(&index) = relays.first() {
                prop_assert_eq!(Some(index), relay);
                prop_assert!(model.radio.links().len() > 1);
            }
            for iface in model.radio.interfaces() {
                let flagged = iface.capabilities.contains(CapabilityFlags::RELAY);
                prop_assert_eq!(flagged, iface.link_id.index().is_some() && iface.link_id.index() == relays.first().copied());
            }
        }

        #[test]
        fn swap_is_all_or_nothing(radios in radios(), with_hardware in any::<bool>()) {
            let mut topo = RadioTopology::from_interfaces(interfaces_from_hardware(&radios));
            topo.populate_defaults();
            let before = topo.clone();
            let hardware = with_hardware.then_some(&radios[..]);

            if topo.swap_high_capacity(hardware) {
                let (a, b) = topo.last_swapped().unwrap();
                let (old, new) = (before.interfaces(), topo.interfaces());
                prop_assert_eq!(new[a].link_id, old[b].link_id);
                prop_assert_eq!(new[b].link_id, old[a].link_id);
                prop_assert_eq!(new[a].current_frequency_khz, old[b].current_frequency_khz);
                prop_assert_eq!(new[b].current_frequency_khz, old[a].current_frequency_khz);
                for i in (0..new.len()).filter(|i| *i != a && *i != b) {
                    prop_assert_eq!(&new[i], &old[i]);
                }
                prop_assert_eq!(topo.links(), before.links());
            } else {
                prop_assert_eq!(&topo, &before);
                prop_assert_eq!(topo.last_swapped(), None);
            }
        }

        #[test]
        fn rotate_keeps_interfaces_on_their_frequency(radios in radios()) {
            let mut topo = RadioTopology::from_interfaces(interfaces_from_hardware(&radios));
            topo.populate_defaults();
            let before = topo.clone();

            let rotated = topo.rotate_links();
            prop_assert_eq!(rotated, before.links().len() >= 2);
            for (old, new) in before.interfaces().iter().zip(topo.interfaces()) {
                let old_freq = old.link_id.index().map(|l| before.links()[l].frequency_khz);
                let new_freq = new.link_id.index().map(|l| topo.links()[l].frequency_khz);
                prop_assert_eq!(old_freq, new_freq);
            }
        }

        #[test]
        fn saved_model_loads_identically(
            radios in radios(),
            vehicle_id in any::<u32>(),
            name in "[A-Za-z0-9 ]{0,24}",
            nice_video in -20i32..10,
            update_rate in 0u32..400,
            relay in prop::option::of(0usize..4),
            flight_time in any::<u32>(),
            addresses in prop::collection::vec(("\\PC{0,16}", "\\PC{0,16}"), 8),
        ) {
            let mut radios = radios;
            for (radio, (mac, port)) in radios.iter_mut().zip(addresses) {
                radio.mac = mac;
                radio.port = port;
            }
            let mut model = Model::new_vehicle(vehicle_id);
            model.populate_radio_from_hardware(&radios);
            model.set_vehicle_name(&name);
            model.priorities.nice_video = nice_video;
            model.telemetry.update_rate = update_rate;
            model.total_flight_time = flight_time;
            model.relay.link_id = relay;
            model.validate_settings();

            let dir = tempfile::tempdir().unwrap();
            let store = ConfigStore::new(dir.path().join("vehicle.mdl"));
            store.save(&mut model).unwrap();
            let outcome = store.try_load().unwrap();
            prop_assert_eq!(outcome.source, LoadSource::Primary);
            prop_assert!(outcome.warnings.is_empty());
            prop_assert_eq!(outcome.model, model);
        }

        #[test]
        fn validation_is_idempotent(
            radios in radios(),
            nice_rc in -40i32..40,
            graph in 0u32..2000,
            packet in 0u32..400,
        ) {
            let mut model = Model::new_vehicle(1);
            model.populate_radio_from_hardware(&radios);
            model.priorities.nice_rc = nice_rc;
            model.telemetry.graph_sample_interval_ms = graph;
            model.radio_globals.sik_packet_size = packet;

            model.validate_settings();
            prop_assert!(!model.validate_settings());
        }
    }
}
