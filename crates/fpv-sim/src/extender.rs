//! Virtual extender device
//!
//! Answers the extender byte protocol the way real firmware does, with
//! hooks to corrupt replies or go silent for fault testing.

use fpv_protocol::crc::verify_trailer;
use fpv_protocol::extender::START_FLAG;
use fpv_protocol::{CommandId, ExtenderCapabilities, ExtenderResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A simulated add-on extender
#[derive(Debug, Clone)]
pub struct VirtualExtender {
    address: u8,
    name: String,
    version: (u8, u8),
    capabilities: ExtenderCapabilities,
    /// Replies left to send with a broken CRC
    corrupt_replies: usize,
    /// Ignore every request
    silent: bool,
    /// Commands received, in order
    requests: Vec<CommandId>,
}

/// Configuration for creating a virtual extender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualExtenderConfig {
    pub address: u8,
    pub name: String,
    pub version: (u8, u8),
    pub capabilities: ExtenderCapabilities,
}

impl Default for VirtualExtenderConfig {
    fn default() -> Self {
        Self {
            address: fpv_protocol::devices::ADDRESS_PICO_EXTENDER,
            name: "Pico Extender".to_string(),
            version: (2, 4),
            capabilities: ExtenderCapabilities::BUTTONS
                | ExtenderCapabilities::ROTARY
                | ExtenderCapabilities::LEDS,
        }
    }
}

impl VirtualExtender {
    /// Create an extender with no capabilities at version 1.0
    pub fn new(address: u8, name: impl Into<String>) -> Self {
        Self::from_config(VirtualExtenderConfig {
            address,
            name: name.into(),
            version: (1, 0),
            capabilities: ExtenderCapabilities::empty(),
        })
    }

    pub fn from_config(config: VirtualExtenderConfig) -> Self {
        Self {
            address: config.address,
            name: config.name,
            version: config.version,
            capabilities: config.capabilities,
            corrupt_replies: 0,
            silent: false,
            requests: Vec::new(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn capabilities(&self) -> ExtenderCapabilities {
        self.capabilities
    }

    pub fn set_capabilities(&mut self, capabilities: ExtenderCapabilities) {
        self.capabilities = capabilities;
    }

    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Send the next `count` replies with a corrupted CRC trailer
    pub fn corrupt_next_replies(&mut self, count: usize) {
        self.corrupt_replies = count;
    }

    /// Stop (or resume) answering requests
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Commands received so far
    pub fn requests(&self) -> &[CommandId] {
        &self.requests
    }

    /// Handle one request frame, returning the reply frame if any
    ///
    /// Frames with a bad start flag or CRC are ignored, as are write-only
    /// commands other than an address change.
    pub fn handle(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if self.silent {
            trace!("0x{:02X} silent, request dropped", self.address);
            return None;
        }
        let body = match verify_trailer(frame) {
            Ok(body) => body,
            Err(e) => {
                debug!("0x{:02X} dropped request: {}", self.address, e);
                return None;
            }
        };
        let (&start, rest) = body.split_first()?;
        let (&code, payload) = rest.split_first()?;
        if start != START_FLAG {
            return None;
        }
        let command = CommandId::try_from(code).ok()?;
        self.requests.push(command);

        let response = match command {
            CommandId::GetFlags => ExtenderResponse::Flags(self.capabilities),
            CommandId::GetVersion => ExtenderResponse::Version {
                major: self.version.0,
                minor: self.version.1,
            },
            CommandId::GetName => ExtenderResponse::Name(self.name.clone()),
            CommandId::SetAddress => {
                if let Some(&address) = payload.first() {
                    debug!("0x{:02X} moved to 0x{:02X}", self.address, address);
                    self.address = address;
                }
                return None;
            }
            _ => return None,
        };

        let mut reply = response.encode();
        if self.corrupt_replies > 0 {
            self.corrupt_replies -= 1;
            if let Some(last) = reply.last_mut() {
                *last ^= 0x5A;
            }
            debug!("0x{:02X} corrupted reply to {:?}", self.address, command);
        }
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpv_protocol::{EncodeCommand, ExtenderCodec, ExtenderRequest};

    #[test]
    fn test_answers_flags() {
        let mut ext = VirtualExtender::from_config(VirtualExtenderConfig::default());
        let reply = ext.handle(&ExtenderRequest::GetFlags.encode()).unwrap();
        let decoded = ExtenderCodec::decode(CommandId::GetFlags, &reply).unwrap();
        assert_eq!(decoded, ExtenderResponse::Flags(ext.capabilities()));
        assert_eq!(ext.requests(), &[CommandId::GetFlags]);
    }

    #[test]
    fn test_answers_name_and_version() {
        let mut ext = VirtualExtender::new(0x62, "Knob");
        let reply = ext.handle(&ExtenderRequest::GetName.encode()).unwrap();
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetName, &reply).unwrap(),
            ExtenderResponse::Name("Knob".to_string())
        );
        let reply = ext.handle(&ExtenderRequest::GetVersion.encode()).unwrap();
        assert_eq!(
            ExtenderCodec::decode(CommandId::GetVersion, &reply).unwrap(),
            ExtenderResponse::Version { major: 1, minor: 0 }
        );
    }

    #[test]
    fn test_corrupts_then_recovers() {
        let mut ext = VirtualExtender::new(0x62, "Knob");
        ext.corrupt_next_replies(1);
        let bad = ext.handle(&ExtenderRequest::GetName.encode()).unwrap();
        assert!(ExtenderCodec::decode(CommandId::GetName, &bad).is_err());
        let good = ext.handle(&ExtenderRequest::GetName.encode()).unwrap();
        assert!(ExtenderCodec::decode(CommandId::GetName, &good).is_ok());
    }

    #[test]
    fn test_ignores_bad_request_crc() {
        let mut ext = VirtualExtender::new(0x62, "Knob");
        let mut frame = ExtenderRequest::GetFlags.encode();
        frame[2] ^= 0xFF;
        assert!(ext.handle(&frame).is_none());
        assert!(ext.requests().is_empty());
    }

    #[test]
    fn test_set_address() {
        let mut ext = VirtualExtender::new(0x62, "Knob");
        let reply = ext.handle(&ExtenderRequest::SetAddress { address: 0x64 }.encode());
        assert!(reply.is_none());
        assert_eq!(ext.address(), 0x64);
    }

    #[test]
    fn test_silent() {
        let mut ext = VirtualExtender::new(0x62, "Knob");
        ext.set_silent(true);
        assert!(ext.handle(&ExtenderRequest::GetFlags.encode()).is_none());
    }
}
