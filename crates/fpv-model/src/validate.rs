//! Model validation pass
//!
//! Run after every load and every topology mutation. Repairs rather than
//! rejects: out-of-range values are clamped or replaced with defaults, and
//! derived flags (capacity, relay, frame flags) are recomputed from their
//! sources. Running the pass twice changes nothing the second time.

use fpv_protocol::radio::{
    default_frequency_for_bands, DEFAULT_FREQUENCY_24, DEFAULT_RADIO_TX_POWER,
    MAX_RADIO_TX_POWER,
};
use fpv_protocol::{CapabilityFlags, RadioFrameFlags};
use tracing::debug;

use crate::link::{
    DEFAULT_DATA_DATA_RATE, DEFAULT_SERIAL_PACKET_SIZE, DEFAULT_SIK_AIR_RATE,
    DEFAULT_VIDEO_DATA_RATE, MAX_SERIAL_PACKET_SIZE, MIN_SERIAL_PACKET_SIZE,
};
use crate::model::{
    Model, TelemetryFlags, DEFAULT_GRAPH_SAMPLE_INTERVAL_MS, DEFAULT_PRIORITY_RC,
    DEFAULT_PRIORITY_ROUTER, DEFAULT_PRIORITY_TELEMETRY, DEFAULT_PRIORITY_VIDEO,
    DEFAULT_SIK_PACKET_SIZE, MAX_TELEMETRY_UPDATE_RATE, MAX_VEHICLE_NAME_LENGTH,
};

/// Lowest video rate accepted on a non-SiK link, bps
const MIN_VIDEO_RATE_BPS: u32 = 500_000;
/// Lowest data rate accepted on any link, bps
const MIN_DATA_RATE_BPS: u32 = 500;

/// Replace a value outside `range` with `default`
fn clamp_or<T: PartialOrd + Copy + std::fmt::Display>(
    value: &mut T,
    range: std::ops::RangeInclusive<T>,
    default: T,
    field: &str,
) {
    if !range.contains(value) {
        debug!("{} out of range ({}), reset to {}", field, value, default);
        *value = default;
    }
}

impl Model {
    /// Repair the model in place, returning whether anything changed
    pub fn validate_settings(&mut self) -> bool {
        let before = self.clone();

        self.validate_radio_interfaces();
        self.radio.back_propagate_capabilities();
        self.validate_radio_links();
        self.radio.back_propagate_capabilities();
        self.radio.apply_relay_flags(self.relay.link_id);
        self.validate_priorities();
        self.validate_telemetry();

        if self.vehicle_name.chars().count() > MAX_VEHICLE_NAME_LENGTH {
            self.vehicle_name = self.vehicle_name.chars().take(MAX_VEHICLE_NAME_LENGTH).collect();
        }
        clamp_or(&mut self.rxtx_sync_type, 0..=2, 1, "rxtx sync type");

        let changed = *self != before;
        if changed {
            debug!("Model {} adjusted by validation", self.vehicle_id);
        }
        changed
    }

    fn validate_radio_interfaces(&mut self) {
        self.radio.drop_dangling_assignments();
        for iface in self.radio.interfaces_mut() {
            clamp_or(
                &mut iface.raw_tx_power,
                1..=MAX_RADIO_TX_POWER,
                DEFAULT_RADIO_TX_POWER,
                "radio tx power",
            );
            if iface.mac.is_empty() {
                iface.mac = "N/A".to_string();
            }
            if iface.port.is_empty() {
                iface.port = "X".to_string();
            }
        }
    }

    fn validate_radio_links(&mut self) {
        for index in 0..self.radio.links().len() {
            let owner_bands = self
                .radio
                .interface_for_link(index)
                .map(|i| self.radio.interfaces()[i].supported_bands);
            let sik = self.radio.links()[index]
                .capabilities
                .contains(CapabilityFlags::SIK);

            let link = &mut self.radio.links_mut()[index];
            if link.frequency_khz == 0 {
                link.frequency_khz = owner_bands
                    .map(default_frequency_for_bands)
                    .unwrap_or(DEFAULT_FREQUENCY_24);
                debug!("Radio link {} had no frequency, set to {}", index + 1, link.frequency_khz);
            }

            if link.capabilities.contains(CapabilityFlags::VIDEO)
                && !sik
                && link.video_rate.bps() < MIN_VIDEO_RATE_BPS
            {
                debug!("Radio link {} video rate {} too low", index + 1, link.video_rate);
                link.video_rate = DEFAULT_VIDEO_DATA_RATE;
            }
            if link.capabilities.contains(CapabilityFlags::DATA)
                && link.data_rate.bps() < MIN_DATA_RATE_BPS
            {
                debug!("Radio link {} data rate {} too low", index + 1, link.data_rate);
                link.data_rate = if sik {
                    DEFAULT_SIK_AIR_RATE
                } else {
                    DEFAULT_DATA_DATA_RATE
                };
            }

            clamp_or(
                &mut link.serial_packet_size,
                MIN_SERIAL_PACKET_SIZE..=MAX_SERIAL_PACKET_SIZE,
                DEFAULT_SERIAL_PACKET_SIZE,
                "serial packet size",
            );

            link.frame_flags
                .remove(RadioFrameFlags::LEGACY_DATARATES | RadioFrameFlags::MCS_DATARATES);
            if link.video_rate.is_mcs() {
                link.frame_flags |= RadioFrameFlags::MCS_DATARATES;
            } else {
                link.frame_flags |= RadioFrameFlags::LEGACY_DATARATES;
            }
        }

        for iface in self.radio.interfaces_mut() {
            if iface.current_frequency_khz == 0 {
                iface.current_frequency_khz = default_frequency_for_bands(iface.supported_bands);
            }
        }

        clamp_or(
            &mut self.radio_globals.sik_packet_size,
            MIN_SERIAL_PACKET_SIZE..=MAX_SERIAL_PACKET_SIZE,
            DEFAULT_SIK_PACKET_SIZE,
            "SiK packet size",
        );
    }

    fn validate_priorities(&mut self) {
        let p = &mut self.priorities;
        clamp_or(&mut p.nice_router, -18..=5, DEFAULT_PRIORITY_ROUTER, "router priority");
        clamp_or(&mut p.nice_video, -18..=5, DEFAULT_PRIORITY_VIDEO, "video priority");
        clamp_or(&mut p.nice_rc, -16..=0, DEFAULT_PRIORITY_RC, "rc priority");
        clamp_or(
            &mut p.nice_telemetry,
            -16..=5,
            DEFAULT_PRIORITY_TELEMETRY,
            "telemetry priority",
        );
    }

    fn validate_telemetry(&mut self) {
        let t = &mut self.telemetry;
        if t.update_rate > MAX_TELEMETRY_UPDATE_RATE {
            debug!("Telemetry update rate {} capped", t.update_rate);
            t.update_rate = MAX_TELEMETRY_UPDATE_RATE;
        }
        clamp_or(
            &mut t.graph_sample_interval_ms,
            10..=1000,
            DEFAULT_GRAPH_SAMPLE_INTERVAL_MS,
            "graph sample interval",
        );
        clamp_or(&mut t.vehicle_mavlink_id, 1..=255, 1, "vehicle MAVLink id");
        clamp_or(&mut t.controller_mavlink_id, 1..=255, 255, "controller MAVLink id");
        if t.flags.is_empty() {
            t.flags = TelemetryFlags::default();
        }
    }
}
