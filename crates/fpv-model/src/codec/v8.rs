//! Version 8 reader
//!
//! Frequencies are stored in MHz and the link table always has six rows,
//! of which only the first `count` are meaningful. There is no model flags
//! group, no extra radio options line and the relay group has no frequency.

use fpv_protocol::radio::MAX_RADIO_INTERFACES;
use tracing::debug;

use super::reader::GroupReader;
use super::v10;
use crate::error::ParseError;
use crate::model::Model;
use crate::topology::RadioTopology;

const FREQUENCY_SCALE: i64 = 1000;
const LINK_ROWS: usize = 6;

pub(super) fn read(r: &mut GroupReader<'_>) -> Result<Model, ParseError> {
    let mut model = Model::default();
    v10::read_header(r, &mut model)?;
    v10::read_general(r, &mut model)?;
    v10::read_cpu(r, &mut model)?;
    let interfaces = v10::read_interfaces(r, FREQUENCY_SCALE)?;
    v10::read_radio_options(r, &mut model)?;

    let count = r.labeled_ints("radio links", "radio_links:", 1)?[0];
    let count = r.count("radio links", count, MAX_RADIO_INTERFACES)?;
    let mut links = Vec::with_capacity(LINK_ROWS);
    for _ in 0..LINK_ROWS {
        links.push(v10::read_link_row(r, FREQUENCY_SCALE)?);
    }
    links.truncate(count);

    r.ints("reserved", 12)?;
    v10::read_relay(r, &mut model, false)?;
    v10::read_telemetry(r, &mut model)?;
    model.radio = RadioTopology::from_parts(interfaces, links);

    if r.seek_label("hw_info:") {
        model.hardware = v10::read_hardware(r, v10::SerialPortLayout::UsageName)?;
    } else {
        debug!("No hardware group in v8 model file");
    }
    Ok(model)
}
