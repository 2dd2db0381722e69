//! Extender device protocol
//!
//! Small request/response protocol spoken by add-on boards (buttons,
//! rotary encoders, RC in/out bridges) that sit on the shared I2C bus.
//!
//! # Frame Format
//! ```text
//! request:  FF [cmd] [payload...] [crc]
//! response: [payload...] [crc]
//! ```
//!
//! - `FF`: Start flag
//! - `cmd`: Command id
//! - `crc`: CRC-8 over every preceding byte of the frame
//!
//! Responses have a fixed length that depends on the command that was sent,
//! so decoding always needs the originating [`CommandId`].

use bitflags::bitflags;

use crate::crc::{append_crc, verify_trailer};
use crate::error::ParseError;
use crate::EncodeCommand;

/// Request start flag
pub const START_FLAG: u8 = 0xFF;

/// Fixed length of the name field returned by GET_NAME
pub const NAME_LENGTH: usize = 24;

/// Extender command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandId {
    /// Query capability flags (0x01)
    GetFlags = 0x01,
    /// Query firmware version (0x02)
    GetVersion = 0x02,
    /// Query device name (0x03)
    GetName = 0x03,
    /// Move the device to a new bus address (0x04)
    SetAddress = 0x04,
    /// Read pending button events
    GetButtonEvents = 0x10,
    /// Read pending rotary encoder events
    GetRotaryEvents = 0x11,
    /// Read pending events from the second rotary encoder
    GetRotary2Events = 0x12,
    /// Read RC input channels
    RcGetChannels = 0x20,
    /// Configure RC input
    RcSetConfig = 0x21,
    /// Write RC output channels
    RcOutSetChannels = 0x30,
    /// Read RC output configuration
    RcOutGetConfig = 0x31,
    /// Push flight control data
    FlightSet = 0x40,
    /// Read flight control data
    FlightGet = 0x41,
    /// Push camera control settings
    CameraSet = 0x50,
    /// Read camera control settings
    CameraGet = 0x51,
    /// Video switch control
    Video = 0x55,
    /// Play a sound
    Sound = 0x60,
}

impl TryFrom<u8> for CommandId {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::GetFlags),
            0x02 => Ok(Self::GetVersion),
            0x03 => Ok(Self::GetName),
            0x04 => Ok(Self::SetAddress),
            0x10 => Ok(Self::GetButtonEvents),
            0x11 => Ok(Self::GetRotaryEvents),
            0x12 => Ok(Self::GetRotary2Events),
            0x20 => Ok(Self::RcGetChannels),
            0x21 => Ok(Self::RcSetConfig),
            0x30 => Ok(Self::RcOutSetChannels),
            0x31 => Ok(Self::RcOutGetConfig),
            0x40 => Ok(Self::FlightSet),
            0x41 => Ok(Self::FlightGet),
            0x50 => Ok(Self::CameraSet),
            0x51 => Ok(Self::CameraGet),
            0x55 => Ok(Self::Video),
            0x60 => Ok(Self::Sound),
            _ => Err(ParseError::UnknownCommand(format!(
                "extender cmd 0x{:02X}",
                value
            ))),
        }
    }
}

impl CommandId {
    /// Length of the response frame for this command, CRC included
    ///
    /// Returns `None` for commands that are write-only from the point of
    /// view of this crate.
    pub fn response_len(&self) -> Option<usize> {
        match self {
            CommandId::GetFlags => Some(2 + 1),
            CommandId::GetVersion => Some(1 + 1),
            CommandId::GetName => Some(NAME_LENGTH + 1),
            _ => None,
        }
    }
}

bitflags! {
    /// Capabilities reported by an extender in response to GET_FLAGS
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ExtenderCapabilities: u16 {
        const SPI = 1 << 1;
        const BUTTONS = 1 << 2;
        const ROTARY = 1 << 3;
        const ROTARY2 = 1 << 4;
        const LEDS = 1 << 5;
        const RC_IN = 1 << 6;
        const RC_OUT = 1 << 7;
        const FLIGHT_CONTROL = 1 << 8;
        const CAMERA_CONTROL = 1 << 9;
        const SOUNDS = 1 << 10;
    }
}

/// Requests sent to an extender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtenderRequest {
    /// Ask for the capability bitset
    GetFlags,
    /// Ask for the firmware version
    GetVersion,
    /// Ask for the padded device name
    GetName,
    /// Move the device to another bus address
    SetAddress { address: u8 },
    /// Any other command with an opaque payload
    Command { id: CommandId, payload: Vec<u8> },
}

impl ExtenderRequest {
    /// Command id carried by this request
    pub fn command_id(&self) -> CommandId {
        match self {
            ExtenderRequest::GetFlags => CommandId::GetFlags,
            ExtenderRequest::GetVersion => CommandId::GetVersion,
            ExtenderRequest::GetName => CommandId::GetName,
            ExtenderRequest::SetAddress { .. } => CommandId::SetAddress,
            ExtenderRequest::Command { id, .. } => *id,
        }
    }

    /// Expected response length, CRC included
    pub fn response_len(&self) -> Option<usize> {
        self.command_id().response_len()
    }
}

impl EncodeCommand for ExtenderRequest {
    fn encode(&self) -> Vec<u8> {
        let mut frame = vec![START_FLAG, self.command_id() as u8];
        match self {
            ExtenderRequest::SetAddress { address } => frame.push(*address),
            ExtenderRequest::Command { payload, .. } => frame.extend_from_slice(payload),
            _ => {}
        }
        append_crc(&mut frame);
        frame
    }
}

/// Decoded extender responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtenderResponse {
    /// Capability bitset
    Flags(ExtenderCapabilities),
    /// Firmware version
    Version { major: u8, minor: u8 },
    /// Device name with padding removed
    Name(String),
}

impl ExtenderResponse {
    /// Encode as a device would put it on the wire
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = match self {
            ExtenderResponse::Flags(flags) => flags.bits().to_le_bytes().to_vec(),
            ExtenderResponse::Version { major, minor } => vec![(major << 4) | (minor & 0x0F)],
            ExtenderResponse::Name(name) => {
                let mut bytes = vec![0u8; NAME_LENGTH];
                for (slot, b) in bytes.iter_mut().zip(name.bytes().take(NAME_LENGTH - 1)) {
                    *slot = b;
                }
                bytes
            }
        };
        append_crc(&mut frame);
        frame
    }
}

/// Decoder for extender responses
pub struct ExtenderCodec;

impl ExtenderCodec {
    /// Decode the response to `command`
    ///
    /// The frame must be exactly the response length for the command. A
    /// corrupted trailer yields [`ParseError::ChecksumMismatch`].
    pub fn decode(command: CommandId, frame: &[u8]) -> Result<ExtenderResponse, ParseError> {
        let expected_len = command.response_len().ok_or_else(|| {
            ParseError::InvalidFrame(format!("{:?} has no response", command))
        })?;
        if frame.len() < expected_len {
            return Err(ParseError::Incomplete {
                needed: expected_len - frame.len(),
            });
        }
        if frame.len() > expected_len {
            return Err(ParseError::InvalidFrame(format!(
                "{} bytes for {:?}, expected {}",
                frame.len(),
                command,
                expected_len
            )));
        }

        let payload = verify_trailer(frame)?;
        match command {
            CommandId::GetFlags => {
                let bits = u16::from_le_bytes([payload[0], payload[1]]);
                Ok(ExtenderResponse::Flags(
                    ExtenderCapabilities::from_bits_retain(bits),
                ))
            }
            CommandId::GetVersion => Ok(ExtenderResponse::Version {
                major: payload[0] >> 4,
                minor: payload[0] & 0x0F,
            }),
            CommandId::GetName => decode_name(payload).map(ExtenderResponse::Name),
            _ => Err(ParseError::InvalidFrame(format!(
                "unsupported response for {:?}",
                command
            ))),
        }
    }
}

fn decode_name(payload: &[u8]) -> Result<String, ParseError> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let raw = &payload[..end];
    if raw.iter().any(|b| !(0x20..0x7F).contains(b)) {
        return Err(ParseError::InvalidName);
    }
    Ok(String::from_utf8_lossy(raw).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8;

    #[test]
    fn test_encode_get_flags() {
        let frame = ExtenderRequest::GetFlags.encode();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame[0], START_FLAG);
        assert_eq!(frame[1], 0x01);
        assert_eq!(frame[2], crc8(&[0xFF, 0x01]));
    }

    #[test]
    fn test_encode_set_address() {
        let frame = ExtenderRequest::SetAddress { address: 0x62 }.encode();
        assert_eq!(&frame[..3], &[0xFF, 0x04, 0x62]);
        assert_eq!(frame[3], crc8(&[0xFF, 0x04, 0x62]));
    }

    #[test]
    fn test_command_id_roundtrip() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x10, 0x21, 0x31, 0x55, 0x60] {
            let id = CommandId::try_from(code).unwrap();
            assert_eq!(id as u8, code);
        }
        assert!(CommandId::try_from(0x99).is_err());
    }

    #[test]
    fn test_decode_flags() {
        let caps = ExtenderCapabilities::BUTTONS | ExtenderCapabilities::ROTARY;
        let frame = ExtenderResponse::Flags(caps).encode();
        let decoded = ExtenderCodec::decode(CommandId::GetFlags, &frame).unwrap();
        assert_eq!(decoded, ExtenderResponse::Flags(caps));
    }

    #[test]
    fn test_decode_flags_little_endian() {
        let mut frame = vec![0x04, 0x01];
        frame.push(crc8(&frame));
        let decoded = ExtenderCodec::decode(CommandId::GetFlags, &frame).unwrap();
        assert_eq!(
            decoded,
            ExtenderResponse::Flags(
                ExtenderCapabilities::BUTTONS | ExtenderCapabilities::FLIGHT_CONTROL
            )
        );
    }

    #[test]
    fn test_decode_version() {
        let frame = ExtenderResponse::Version { major: 2, minor: 5 }.encode();
        assert_eq!(frame[0], 0x25);
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetVersion, &frame).unwrap(),
            ExtenderResponse::Version { major: 2, minor: 5 }
        );
    }

    #[test]
    fn test_decode_name_strips_padding() {
        let frame = ExtenderResponse::Name("Rotary Knob".into()).encode();
        assert_eq!(frame.len(), NAME_LENGTH + 1);
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetName, &frame).unwrap(),
            ExtenderResponse::Name("Rotary Knob".into())
        );
    }

    #[test]
    fn test_decode_rejects_corrupted_crc() {
        let mut frame = ExtenderResponse::Flags(ExtenderCapabilities::LEDS).encode();
        frame[2] = frame[2].wrapping_add(1);
        assert!(matches!(
            ExtenderCodec::decode(CommandId::GetFlags, &frame),
            Err(ParseError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_short_frame() {
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetName, &[0x41, 0x42]),
            Err(ParseError::Incomplete {
                needed: NAME_LENGTH + 1 - 2
            })
        );
    }

    #[test]
    fn test_decode_rejects_binary_name() {
        let mut frame = vec![0x01u8; NAME_LENGTH];
        frame.push(crc8(&frame));
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetName, &frame),
            Err(ParseError::InvalidName)
        );
    }

    #[test]
    fn test_write_only_command_has_no_response() {
        assert!(ExtenderRequest::SetAddress { address: 0x61 }
            .response_len()
            .is_none());
        assert!(ExtenderCodec::decode(CommandId::Sound, &[0x00]).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn corrupted_trailer_is_rejected(bits in any::<u16>(), delta in 1u8..=255) {
                let mut frame = ExtenderResponse::Flags(ExtenderCapabilities::from_bits_retain(bits)).encode();
                let last = frame.len() - 1;
                frame[last] = frame[last].wrapping_add(delta);
                let is_checksum_error = matches!(
                    ExtenderCodec::decode(CommandId::GetFlags, &frame),
                    Err(ParseError::ChecksumMismatch { .. })
                );
                prop_assert!(is_checksum_error);
            }

            #[test]
            fn flags_survive_the_wire(bits in any::<u16>()) {
                let caps = ExtenderCapabilities::from_bits_retain(bits);
                let frame = ExtenderResponse::Flags(caps).encode();
                prop_assert_eq!(
                    ExtenderCodec::decode(CommandId::GetFlags, &frame).unwrap(),
                    ExtenderResponse::Flags(caps)
                );
            }
        }
    }
}
