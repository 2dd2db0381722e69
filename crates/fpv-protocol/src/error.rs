//! Error types for extender protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while decoding protocol frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is shorter than the response type requires
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Unknown or unsupported command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Trailing CRC-8 byte does not match the payload
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Device name payload is not printable text
    #[error("invalid device name")]
    InvalidName,
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Communication timeout
    #[error("communication timeout after {0}ms")]
    Timeout(u64),

    /// Device did not answer
    #[error("no response from device 0x{0:02X}")]
    NoResponse(u8),

    /// Invalid response from device
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
