//! Version 10 writer

use super::{encode_name, FormatVersion, CONFIG_STAMP};
use crate::interface::single_token;
use crate::model::{
    Model, MAX_HARDWARE_BUSES, MAX_HARDWARE_BUS_DEVICES, MAX_HARDWARE_SERIAL_PORTS,
};

fn flag(value: bool) -> u8 {
    u8::from(value)
}

pub(super) fn write(model: &Model) -> String {
    let mut out = String::new();
    out.push_str(&format!("ver: {}\n", FormatVersion::CURRENT.number()));
    out.push_str(CONFIG_STAMP);
    out.push('\n');
    out.push_str(&format!("savecounter: {}\n", model.save_count));
    out.push_str(&format!(
        "id: {} {} {} {}\n",
        model.sw_version, model.vehicle_id, model.controller_id, model.board_type
    ));
    out.push_str(&format!("{}\n", model.flags.bits()));
    out.push_str(&format!("{}\n", encode_name(&model.vehicle_name)));

    let p = &model.priorities;
    out.push_str(&format!(
        "{} {} {}\n",
        model.rxtx_sync_type, model.camera_rc_channels, p.nice_telemetry
    ));
    out.push_str(&format!(
        "{} {} {} {}\n",
        flag(model.is_spectator),
        model.vehicle_type,
        model.total_flight_time,
        model.gps_count
    ));
    out.push_str(&format!(
        "cpu: {} {} {}\n",
        p.nice_video, p.nice_others, p.ionice_video
    ));
    out.push_str(&format!("{} {} {}\n", p.overvoltage, p.freq_arm, p.freq_gpu));
    out.push_str(&format!(
        "{} {} {}\n",
        p.nice_router, p.ionice_router, p.nice_rc
    ));

    let interfaces = model.radio.interfaces();
    out.push_str(&format!("radio_interfaces: {}\n", interfaces.len()));
    for iface in interfaces {
        out.push_str(&format!(
            "  {} {} {}\n",
            iface.card_model.0,
            iface.link_id.to_raw(),
            iface.current_frequency_khz
        ));
        out.push_str(&format!(
            "  {} {} {} {} {} 0 {}- {}-\n",
            iface.capabilities.bits(),
            iface.supported_bands.bits(),
            iface.radio_type_and_driver,
            iface.frame_flags.bits(),
            iface.raw_tx_power,
            single_token(&iface.mac),
            single_token(&iface.port)
        ));
    }

    let g = &model.radio_globals;
    out.push_str(&format!(
        "{} {} {} 0 0 0 0 0 0\n",
        flag(model.enable_dhcp),
        flag(g.auto_vehicle_tx_power),
        flag(g.auto_controller_tx_power)
    ));
    out.push_str("0\n");

    let links = model.radio.links();
    out.push_str(&format!("radio_links: {}\n", links.len()));
    for link in links {
        out.push_str(&format!(
            "  {} {} {} {} {} {} 0 {} {}\n",
            link.frequency_khz,
            link.capabilities.bits(),
            link.frame_flags.bits(),
            link.video_rate.0,
            link.data_rate.0,
            link.serial_packet_size,
            link.uplink_video_rate.0,
            link.uplink_data_rate.0
        ));
        out.push_str(&format!(
            "  {} {}\n",
            link.uplink_rate_type as u8, link.downlink_rate_type as u8
        ));
    }
    out.push_str(&format!("{} {}\n", g.sik_packet_size, g.global_link_flags));
    out.push_str("0 0 0 0 0 0 0\n");

    let relay = &model.relay;
    out.push_str(&format!(
        "relay: {} {} {} {} {}\n",
        relay.link_id.map(|l| l as i64).unwrap_or(-1),
        relay.frequency_khz,
        relay.mode,
        relay.relayed_vehicle_id,
        relay.capabilities
    ));

    let t = &model.telemetry;
    out.push_str(&format!(
        "telem: {} {} {} {} {}\n",
        t.fc_telemetry_type,
        t.controller_telemetry_type,
        t.update_rate,
        flag(t.controller_has_output),
        flag(t.controller_has_input)
    ));
    out.push_str(&format!("{} 0 0 0\n", t.graph_sample_interval_ms));
    out.push_str(&format!(
        "{} {} {}\n",
        t.vehicle_mavlink_id,
        t.controller_mavlink_id,
        t.flags.bits()
    ));
    out.push_str("0 0\n");
    out.push_str("0\n");

    let hw = &model.hardware;
    let buses = &hw.bus_numbers[..hw.bus_numbers.len().min(MAX_HARDWARE_BUSES)];
    let devices = &hw.bus_devices[..hw.bus_devices.len().min(MAX_HARDWARE_BUS_DEVICES)];
    let ports = &hw.serial_ports[..hw.serial_ports.len().min(MAX_HARDWARE_SERIAL_PORTS)];
    out.push_str(&format!(
        "hw_info: {} {} {} {}\n",
        hw.radio_count,
        buses.len(),
        devices.len(),
        ports.len()
    ));
    if !buses.is_empty() {
        let buses: Vec<String> = buses.iter().map(u8::to_string).collect();
        out.push_str(&buses.join(" "));
        out.push('\n');
    }
    for (bus, address) in devices {
        out.push_str(&format!("{} {}\n", bus, address));
    }
    for port in ports {
        let name = if port.name.is_empty() {
            "*".to_string()
        } else {
            single_token(&port.name)
        };
        out.push_str(&format!("{} {} {}\n", port.speed, port.usage, name));
    }
    out
}
