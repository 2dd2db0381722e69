//! Version 9 reader
//!
//! Links carry no rate types and the SiK/global group does not exist yet;
//! both take their defaults. The hardware group is found by its label and
//! may be missing.

use fpv_protocol::radio::MAX_RADIO_INTERFACES;
use tracing::debug;

use super::reader::GroupReader;
use super::v10;
use crate::error::ParseError;
use crate::model::Model;
use crate::topology::RadioTopology;

pub(super) fn read(r: &mut GroupReader<'_>) -> Result<Model, ParseError> {
    let mut model = Model::default();
    v10::read_header(r, &mut model)?;
    v10::read_model_flags(r, &mut model)?;
    v10::read_general(r, &mut model)?;
    v10::read_cpu(r, &mut model)?;
    let interfaces = v10::read_interfaces(r, 1)?;
    v10::read_radio_options(r, &mut model)?;
    r.ints("radio options", 1)?;

    let count = r.labeled_ints("radio links", "radio_links:", 1)?[0];
    let count = r.count("radio links", count, MAX_RADIO_INTERFACES)?;
    let mut links = Vec::with_capacity(count.min(MAX_RADIO_INTERFACES));
    for _ in 0..count {
        links.push(v10::read_link_row(r, 1)?);
    }

    r.ints("reserved", 12)?;
    v10::read_relay(r, &mut model, true)?;
    v10::read_telemetry(r, &mut model)?;
    model.radio = RadioTopology::from_parts(interfaces, links);

    if r.seek_label("hw_info:") {
        model.hardware = v10::read_hardware(r, v10::SerialPortLayout::SpeedUsageName)?;
    } else {
        debug!("No hardware group in v9 model file");
    }
    Ok(model)
}
