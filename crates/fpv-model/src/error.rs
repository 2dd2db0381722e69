//! Error types for the model crate

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reading a config file
///
/// `OutOfRange` is soft: it is collected as a warning and the value is
/// repaired. Every other variant fails the load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing version line")]
    MissingVersion,

    #[error("Unknown config version: {0}")]
    UnknownVersion(String),

    #[error("Missing file stamp, found [{found}]")]
    MissingStamp { found: String },

    #[error("Unexpected end of file in group {group}")]
    UnexpectedEof { group: &'static str },

    #[error("Group {group}: expected {expected} fields, found {found}")]
    Arity {
        group: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Group {group}: invalid number [{token}]")]
    InvalidNumber { group: &'static str, token: String },

    #[error("Group {group}: {field} {value} exceeds {max}")]
    TooMany {
        group: &'static str,
        field: &'static str,
        value: i64,
        max: usize,
    },

    #[error("Group {group}: missing label [{label}]")]
    MissingLabel {
        group: &'static str,
        label: &'static str,
    },

    #[error("Group {group}: {field} out of range ({value})")]
    OutOfRange {
        group: &'static str,
        field: &'static str,
        value: i64,
    },
}

impl ParseError {
    /// True for problems that are repaired instead of failing the load
    pub fn is_soft(&self) -> bool {
        matches!(self, ParseError::OutOfRange { .. })
    }
}

/// Errors from loading and saving models
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Both config copies failed (primary: {primary}; backup: {backup})")]
    BothCopiesFailed { primary: String, backup: String },
}
