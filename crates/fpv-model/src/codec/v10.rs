//! Version 10 reader
//!
//! Group readers shared with the older layouts live here too; the older
//! readers call them for the groups whose shape never changed.

use fpv_protocol::radio::MAX_RADIO_INTERFACES;
use fpv_protocol::{Band, CapabilityFlags, CardModel, RadioFrameFlags};

use super::reader::{parse_int, GroupReader};
use super::decode_name;
use crate::error::ParseError;
use crate::interface::{LinkId, RadioInterface};
use crate::link::{DataRate, DataRateType, RadioLink};
use crate::model::{
    HardwareInventory, Model, ModelFlags, SerialPortEntry, TelemetryFlags, DEFAULT_SERIAL_SPEED,
    MAX_HARDWARE_BUSES, MAX_HARDWARE_BUS_DEVICES, MAX_HARDWARE_SERIAL_PORTS,
};
use crate::topology::RadioTopology;

/// Shape of the serial port lines in the hardware group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SerialPortLayout {
    /// `usage name`; v8 kept the speeds elsewhere
    UsageName,
    /// `speed usage name`
    SpeedUsageName,
}

pub(super) fn read(r: &mut GroupReader<'_>) -> Result<Model, ParseError> {
    let mut model = Model::default();
    read_header(r, &mut model)?;
    read_model_flags(r, &mut model)?;
    read_general(r, &mut model)?;
    read_cpu(r, &mut model)?;
    let interfaces = read_interfaces(r, 1)?;
    read_radio_options(r, &mut model)?;
    r.ints("radio options", 1)?;

    let count = r.labeled_ints("radio links", "radio_links:", 1)?[0];
    let count = r.count("radio links", count, MAX_RADIO_INTERFACES)?;
    let mut links = Vec::with_capacity(count.min(MAX_RADIO_INTERFACES));
    for _ in 0..count {
        let mut link = read_link_row(r, 1)?;
        read_link_rate_types(r, &mut link)?;
        links.push(link);
    }

    read_radio_globals(r, &mut model)?;
    r.ints("reserved", 7)?;
    read_relay(r, &mut model, true)?;
    read_telemetry(r, &mut model)?;
    model.radio = RadioTopology::from_parts(interfaces, links);
    // Video, camera and audio groups may sit before the hardware group
    r.seek_label("hw_info:");
    model.hardware = read_hardware(r, SerialPortLayout::SpeedUsageName)?;
    Ok(model)
}

pub(super) fn read_header(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let counter = r.labeled_ints("save counter", "savecounter:", 1)?;
    model.save_count = r.u32_field("save counter", "save count", counter[0], 0);

    let id = r.labeled_ints("identity", "id:", 4)?;
    model.sw_version = r.u32_field("identity", "sw version", id[0], 0);
    model.vehicle_id = r.u32_field("identity", "vehicle id", id[1], 0);
    model.controller_id = r.u32_field("identity", "controller id", id[2], 0);
    model.board_type = r.u32_field("identity", "board type", id[3], 0);
    Ok(())
}

pub(super) fn read_model_flags(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let flags = r.ints("model flags", 1)?;
    let bits = r.u32_field("model flags", "flags", flags[0], ModelFlags::default().bits());
    model.flags = ModelFlags::from_bits_retain(bits);
    Ok(())
}

pub(super) fn read_general(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let name = r.tokens("vehicle name", 1)?;
    model.vehicle_name = decode_name(name[0]);

    let sync = r.ints("rc sync", 3)?;
    model.rxtx_sync_type = r.u32_field("rc sync", "rxtx sync type", sync[0], 1);
    model.camera_rc_channels = r.u32_field("rc sync", "camera rc channels", sync[1], 0);
    model.priorities.nice_telemetry = r.i32_field("rc sync", "telemetry priority", sync[2], 0);

    let vehicle = r.ints("vehicle", 4)?;
    model.is_spectator = vehicle[0] != 0;
    model.vehicle_type = r.u32_field("vehicle", "vehicle type", vehicle[1], 0);
    model.total_flight_time = r.u32_field("vehicle", "flight time", vehicle[2], 0);
    model.gps_count = r.u32_field("vehicle", "gps count", vehicle[3], 1);
    Ok(())
}

pub(super) fn read_cpu(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let cpu = r.labeled_ints("cpu", "cpu:", 3)?;
    let p = &mut model.priorities;
    p.nice_video = r.i32_field("cpu", "video priority", cpu[0], 0);
    p.nice_others = r.i32_field("cpu", "other priority", cpu[1], 0);
    p.ionice_video = r.i32_field("cpu", "video io priority", cpu[2], 0);

    let clocks = r.ints("clocks", 3)?;
    p.overvoltage = r.i32_field("clocks", "overvoltage", clocks[0], 0);
    p.freq_arm = r.u32_field("clocks", "arm frequency", clocks[1], 0);
    p.freq_gpu = r.u32_field("clocks", "gpu frequency", clocks[2], 0);

    let prio = r.ints("priorities", 3)?;
    p.nice_router = r.i32_field("priorities", "router priority", prio[0], 0);
    p.ionice_router = r.i32_field("priorities", "router io priority", prio[1], 0);
    p.nice_rc = r.i32_field("priorities", "rc priority", prio[2], 0);
    Ok(())
}

/// Interface list; `frequency_scale` is 1000 for files storing MHz
pub(super) fn read_interfaces(
    r: &mut GroupReader<'_>,
    frequency_scale: i64,
) -> Result<Vec<RadioInterface>, ParseError> {
    let count = r.labeled_ints("radio interfaces", "radio_interfaces:", 1)?[0];
    let count = r.count("radio interfaces", count, MAX_RADIO_INTERFACES)?;

    let mut interfaces = Vec::with_capacity(count.min(MAX_RADIO_INTERFACES));
    for _ in 0..count {
        let head = r.ints("radio interface", 3)?;
        let tokens = r.tokens("radio interface details", 8)?;
        let mut values = [0i64; 6];
        for (value, token) in values.iter_mut().zip(&tokens) {
            *value = parse_int("radio interface details", token)?;
        }

        let group = "radio interface";
        let iface = RadioInterface {
            card_model: CardModel(r.i32_field(group, "card model", head[0], 0)),
            link_id: LinkId::from_raw(head[1]),
            current_frequency_khz: r.u32_field(
                group,
                "frequency",
                head[2].saturating_mul(frequency_scale),
                0,
            ),
            capabilities: CapabilityFlags::from_bits_retain(r.u32_field(
                group,
                "capabilities",
                values[0],
                0,
            )),
            supported_bands: Band::from_bits_retain(r.u32_field(group, "bands", values[1], 0)),
            radio_type_and_driver: r.u32_field(group, "type and driver", values[2], 0),
            frame_flags: RadioFrameFlags::from_bits_retain(r.u32_field(
                group,
                "frame flags",
                values[3],
                0,
            )),
            raw_tx_power: r.i32_field(group, "tx power", values[4], 0),
            mac: strip_marker(tokens[6]),
            port: strip_marker(tokens[7]),
        };
        interfaces.push(iface);
    }
    interfaces.truncate(MAX_RADIO_INTERFACES);
    Ok(interfaces)
}

/// MAC and port tokens carry a trailing `-` so they are never empty
fn strip_marker(token: &str) -> String {
    token.strip_suffix('-').unwrap_or(token).to_string()
}

pub(super) fn read_radio_options(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let options = r.ints("radio options", 9)?;
    model.enable_dhcp = options[0] != 0;
    model.radio_globals.auto_vehicle_tx_power = options[1] != 0;
    model.radio_globals.auto_controller_tx_power = options[2] != 0;
    Ok(())
}

/// One link row: frequency, flags, rates and packet size
pub(super) fn read_link_row(
    r: &mut GroupReader<'_>,
    frequency_scale: i64,
) -> Result<RadioLink, ParseError> {
    let group = "radio link";
    let row = r.ints(group, 9)?;
    let mut link = RadioLink::default();
    link.frequency_khz = r.u32_field(group, "frequency", row[0].saturating_mul(frequency_scale), 0);
    link.capabilities = CapabilityFlags::from_bits_retain(r.u32_field(group, "capabilities", row[1], 0));
    link.frame_flags = RadioFrameFlags::from_bits_retain(r.u32_field(group, "frame flags", row[2], 0));
    link.video_rate = DataRate(r.i32_field(group, "video rate", row[3], 0));
    link.data_rate = DataRate(r.i32_field(group, "data rate", row[4], 0));
    link.serial_packet_size = r.u32_field(group, "packet size", row[5], 0);
    link.uplink_video_rate = DataRate(r.i32_field(group, "uplink video rate", row[7], 0));
    link.uplink_data_rate = DataRate(r.i32_field(group, "uplink data rate", row[8], 0));
    Ok(link)
}

pub(super) fn read_link_rate_types(r: &mut GroupReader<'_>, link: &mut RadioLink) -> Result<(), ParseError> {
    let types = r.ints("radio link rate types", 2)?;
    link.uplink_rate_type = DataRateType::from_code(types[0]);
    link.downlink_rate_type = DataRateType::from_code(types[1]);
    Ok(())
}

pub(super) fn read_radio_globals(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let globals = r.ints("radio globals", 2)?;
    model.radio_globals.sik_packet_size = r.u32_field("radio globals", "SiK packet size", globals[0], 0);
    model.radio_globals.global_link_flags = r.u32_field("radio globals", "link flags", globals[1], 0);
    Ok(())
}

/// Relay group; older files have no frequency field
pub(super) fn read_relay(
    r: &mut GroupReader<'_>,
    model: &mut Model,
    with_frequency: bool,
) -> Result<(), ParseError> {
    let group = "relay";
    let values = r.labeled_ints(group, "relay:", if with_frequency { 5 } else { 4 })?;
    let (frequency, rest) = if with_frequency {
        (values[1], &values[2..])
    } else {
        (0, &values[1..])
    };

    let relay = &mut model.relay;
    relay.link_id = usize::try_from(values[0]).ok();
    relay.frequency_khz = r.u32_field(group, "frequency", frequency, 0);
    relay.mode = r.u32_field(group, "mode", rest[0], 0);
    relay.relayed_vehicle_id = r.u32_field(group, "relayed vehicle", rest[1], 0);
    relay.capabilities = r.u32_field(group, "capabilities", rest[2], 0);
    Ok(())
}

pub(super) fn read_telemetry(r: &mut GroupReader<'_>, model: &mut Model) -> Result<(), ParseError> {
    let group = "telemetry";
    let telem = r.labeled_ints(group, "telem:", 5)?;
    let t = &mut model.telemetry;
    t.fc_telemetry_type = r.u32_field(group, "fc telemetry type", telem[0], 1);
    t.controller_telemetry_type = r.u32_field(group, "controller telemetry type", telem[1], 1);
    t.update_rate = r.u32_field(group, "update rate", telem[2], 10);
    t.controller_has_output = telem[3] != 0;
    t.controller_has_input = telem[4] != 0;

    let graph = r.ints("telemetry graph", 4)?;
    t.graph_sample_interval_ms = r.u32_field("telemetry graph", "graph interval", graph[0], 0);

    let mavlink = r.ints("mavlink", 3)?;
    t.vehicle_mavlink_id = r.u32_field("mavlink", "vehicle id", mavlink[0], 0);
    t.controller_mavlink_id = r.u32_field("mavlink", "controller id", mavlink[1], 0);
    t.flags = TelemetryFlags::from_bits_retain(r.u32_field("mavlink", "flags", mavlink[2], 0));

    r.ints("telemetry reserved", 2)?;
    r.ints("telemetry reserved", 1)?;
    Ok(())
}

pub(super) fn read_hardware(
    r: &mut GroupReader<'_>,
    layout: SerialPortLayout,
) -> Result<HardwareInventory, ParseError> {
    let group = "hardware";
    let head = r.labeled_ints(group, "hw_info:", 4)?;
    let bus_count = r.bounded_count(group, "bus count", head[1], MAX_HARDWARE_BUSES)?;
    let device_count = r.bounded_count(group, "device count", head[2], MAX_HARDWARE_BUS_DEVICES)?;
    let serial_count =
        r.bounded_count(group, "serial port count", head[3], MAX_HARDWARE_SERIAL_PORTS)?;

    let mut hardware = HardwareInventory {
        radio_count: r.u32_field(group, "radio count", head[0], 0) as usize,
        ..Default::default()
    };

    for bus in r.ints("hardware buses", bus_count)? {
        if let Some(bus) = r.u8_field(group, "bus number", bus) {
            hardware.bus_numbers.push(bus);
        }
    }
    for _ in 0..device_count {
        let device = r.ints("hardware device", 2)?;
        let bus = r.u8_field(group, "bus number", device[0]);
        let address = r.u8_field(group, "device address", device[1]);
        if let (Some(bus), Some(address)) = (bus, address) {
            hardware.bus_devices.push((bus, address));
        }
    }
    for _ in 0..serial_count {
        hardware.serial_ports.push(read_serial_port(r, layout)?);
    }
    Ok(hardware)
}

fn read_serial_port(
    r: &mut GroupReader<'_>,
    layout: SerialPortLayout,
) -> Result<SerialPortEntry, ParseError> {
    let group = "hardware serial port";
    let (speed, usage, name) = match layout {
        SerialPortLayout::SpeedUsageName => {
            let tokens = r.tokens(group, 3)?;
            let speed = parse_int(group, tokens[0])?;
            let speed = r.u32_field(group, "speed", speed, DEFAULT_SERIAL_SPEED);
            (speed, parse_int(group, tokens[1])?, tokens[2])
        }
        SerialPortLayout::UsageName => {
            let tokens = r.tokens(group, 2)?;
            (DEFAULT_SERIAL_SPEED, parse_int(group, tokens[0])?, tokens[1])
        }
    };
    Ok(SerialPortEntry {
        name: if name == "*" { String::new() } else { name.to_string() },
        speed,
        usage: r.u32_field(group, "usage", usage, 0),
    })
}
