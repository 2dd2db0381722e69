//! FPV Link Protocol Library
//!
//! Shared vocabulary for the radio configuration layer of an FPV
//! video and telemetry link:
//!
//! - **Radio vocabulary**: bands, capability flags, radio types, card
//!   models and frequency defaults
//! - **Device database**: well-known bus addresses and the persisted
//!   per-device settings record
//! - **Extender protocol**: request/response frames with a CRC-8 trailer,
//!   spoken by add-on boards on the I2C bus
//!
//! # Example
//!
//! ```rust
//! use fpv_protocol::{CommandId, EncodeCommand, ExtenderCodec, ExtenderRequest, ExtenderResponse};
//!
//! let request = ExtenderRequest::GetVersion.encode();
//! assert_eq!(&request[..2], &[0xFF, 0x02]);
//!
//! // A device answers with one version byte plus CRC
//! let reply = ExtenderResponse::Version { major: 1, minor: 3 }.encode();
//! let decoded = ExtenderCodec::decode(CommandId::GetVersion, &reply).unwrap();
//! assert_eq!(decoded, ExtenderResponse::Version { major: 1, minor: 3 });
//! ```

pub mod crc;
pub mod devices;
pub mod error;
pub mod extender;
pub mod radio;

pub use devices::{DeviceRecord, DeviceType};
pub use error::{ParseError, ProtocolError};
pub use extender::{
    CommandId, ExtenderCapabilities, ExtenderCodec, ExtenderRequest, ExtenderResponse,
};
pub use radio::{
    Band, CapabilityFlags, CardModel, HardwareRadio, RadioDriver, RadioFrameFlags, RadioType,
};

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
