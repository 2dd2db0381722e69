//! FPV Vehicle Model Library
//!
//! The persisted description of a vehicle's radio setup: the radio
//! interfaces found on the hardware, the logical radio links they are
//! assigned to, and the settings stored next to them. Includes the
//! topology engine that builds and repairs link assignments, the
//! validation pass, and the versioned file format with its dual-copy store.
//!
//! # Example
//!
//! ```rust,no_run
//! use fpv_model::{ConfigStore, LoadSource};
//! use fpv_protocol::{Band, CardModel, HardwareRadio, RadioDriver};
//!
//! let store = ConfigStore::new("/etc/fpv/vehicle.mdl");
//! let mut outcome = store.load();
//! if outcome.source == LoadSource::Defaults {
//!     let radios = [HardwareRadio::wifi(
//!         "wlan0",
//!         "00:c0:ca:00:00:01",
//!         RadioDriver::Rtl88xxau,
//!         CardModel::ALFA_AWUS036ACH,
//!         Band::B58 | Band::B24,
//!     )];
//!     outcome.model.populate_radio_from_hardware(&radios);
//! }
//!
//! for (i, link) in outcome.model.radio.links().iter().enumerate() {
//!     println!("link {}: {} kHz", i + 1, link.frequency_khz);
//! }
//! store.save(&mut outcome.model).unwrap();
//! ```

pub mod codec;
pub mod error;
pub mod interface;
pub mod link;
pub mod model;
pub mod store;
pub mod topology;
mod validate;

pub use codec::{ConfigCodec, FormatVersion, ParsedModel, CONFIG_STAMP};
pub use error::{ModelError, ParseError};
pub use interface::{interfaces_from_hardware, LinkId, RadioInterface};
pub use link::{DataRate, DataRateType, RadioLink};
pub use model::{
    HardwareInventory, Model, ModelFlags, ProcessPriorities, RadioGlobals, RelayParams,
    SerialPortEntry, TelemetryFlags, TelemetryParams,
};
pub use store::{ConfigStore, LoadOutcome, LoadSource};
pub use topology::RadioTopology;
