//! Extender transport
//!
//! Moves extender protocol frames over the bus. The shell implementation
//! uses the `i2ctransfer` utility, issuing the request write and the
//! response read as one combined transaction.

use std::time::Duration;

use fpv_protocol::{EncodeCommand, ExtenderCodec, ExtenderRequest, ExtenderResponse, ProtocolError};
use tracing::trace;

use crate::bus::run_with_timeout;
use crate::error::DetectError;

/// Write-then-read access to a device on a bus
pub trait ExtenderTransport {
    /// Write `request` to the device and read back `response_len` bytes
    fn transact(
        &mut self,
        bus: u8,
        address: u8,
        request: &[u8],
        response_len: usize,
    ) -> Result<Vec<u8>, DetectError>;
}

/// Send a request and decode the reply
///
/// A reply with a bad CRC trailer surfaces as
/// `DetectError::Protocol(ProtocolError::Parse(ChecksumMismatch))`.
pub fn query_extender(
    transport: &mut dyn ExtenderTransport,
    bus: u8,
    address: u8,
    request: &ExtenderRequest,
) -> Result<ExtenderResponse, DetectError> {
    let response_len = request.response_len().ok_or_else(|| {
        ProtocolError::InvalidResponse(format!("{:?} expects no reply", request.command_id()))
    })?;
    let frame = request.encode();
    let reply = transport.transact(bus, address, &frame, response_len)?;
    trace!("0x{:02X} {:?} -> {:02X?}", address, request.command_id(), reply);
    if reply.len() < response_len {
        return Err(DetectError::ShortRead {
            address,
            got: reply.len(),
            wanted: response_len,
        });
    }
    ExtenderCodec::decode(request.command_id(), &reply)
        .map_err(|e| DetectError::Protocol(ProtocolError::Parse(e)))
}

/// Configuration for the shell transport
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Transfer utility to run
    pub command: String,
    /// Time allowed per transaction
    pub timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            command: "i2ctransfer".to_string(),
            timeout: Duration::from_millis(500),
        }
    }
}

/// Transport that runs `i2ctransfer`
pub struct ShellExtenderTransport {
    config: TransferConfig,
}

impl ShellExtenderTransport {
    /// Create a transport with default configuration
    pub fn new() -> Self {
        Self::with_config(TransferConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: TransferConfig) -> Self {
        Self { config }
    }
}

impl Default for ShellExtenderTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtenderTransport for ShellExtenderTransport {
    fn transact(
        &mut self,
        bus: u8,
        address: u8,
        request: &[u8],
        response_len: usize,
    ) -> Result<Vec<u8>, DetectError> {
        let args = transfer_args(bus, address, request, response_len);
        let output = run_with_timeout(&self.config.command, &args, self.config.timeout)?;
        Ok(parse_transfer_output(&output))
    }
}

/// Arguments for one combined write/read transaction
pub fn transfer_args(bus: u8, address: u8, request: &[u8], response_len: usize) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        bus.to_string(),
        format!("w{}@0x{:02x}", request.len(), address),
    ];
    args.extend(request.iter().map(|b| format!("0x{:02x}", b)));
    args.push(format!("r{}", response_len));
    args
}

/// Parse the `0xNN 0xNN ...` bytes printed by a read
pub fn parse_transfer_output(output: &str) -> Vec<u8> {
    output
        .split_whitespace()
        .filter_map(|token| {
            let hex = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))?;
            u8::from_str_radix(hex, 16).ok()
        })
        .collect()
}
