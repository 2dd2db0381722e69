//! Error types for hardware detection

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// External bus utility could not be run or reported failure
    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// External bus utility did not finish in time
    #[error("`{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// Bus transfer returned fewer bytes than requested
    #[error("short read from 0x{address:02X}: got {got} of {wanted} bytes")]
    ShortRead { address: u8, got: usize, wanted: usize },

    /// Device settings file problem
    #[error("device settings file {path}: {reason}")]
    SettingsFile { path: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// Extender protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] fpv_protocol::ProtocolError),
}

/// Reasons a device settings file is rejected
///
/// Any of these makes [`crate::DeviceRegistry::load`] rewrite the file with
/// defaults.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing file")]
    Missing,

    #[error("empty file")]
    Empty,

    #[error("stamp mismatch: [{0}]")]
    StampMismatch(String),

    #[error("bad record count line: [{0}]")]
    BadCount(String),

    /// More records than there are bus addresses
    #[error("{count} records, at most {max} allowed")]
    TooManyRecords { count: usize, max: usize },

    #[error("record {index}: {what} missing")]
    Truncated { index: usize, what: &'static str },

    #[error("record {index}: expected {expected} {what}, found {found}")]
    FieldCount {
        index: usize,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("record {index}: bad {field} [{token}]")]
    BadField {
        index: usize,
        field: &'static str,
        token: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
