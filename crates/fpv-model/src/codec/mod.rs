//! Versioned model file format
//!
//! A model file is plain text, one group of values per line, read
//! positionally. The first line names the format version and the second is
//! a fixed stamp. Three layouts are understood:
//!
//! | Version | Differences                                                    |
//! |---------|----------------------------------------------------------------|
//! | 10      | Current layout, the only one written                           |
//! | 9       | No per-link rate types, no SiK/global group, 12 reserved ints  |
//! | 8       | As 9, no model flags, frequencies in MHz, 6 fixed link rows    |
//!
//! Fields were inserted mid-group between versions, so each version has a
//! reader of its own. A group with the wrong number of fields fails the
//! whole parse; values that parse but do not fit are returned as warnings
//! and repaired by validation.

mod reader;
mod v10;
mod v8;
mod v9;
mod writer;

use std::fmt;

use tracing::debug;

use crate::error::ParseError;
use crate::model::Model;
use reader::GroupReader;

/// Second line of every model file
pub const CONFIG_STAMP: &str = "vVIII.3stamp";

/// On-disk format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatVersion {
    V8,
    V9,
    V10,
}

impl FormatVersion {
    /// Version every save is written in
    pub const CURRENT: FormatVersion = FormatVersion::V10;

    pub fn number(&self) -> u32 {
        match self {
            FormatVersion::V8 => 8,
            FormatVersion::V9 => 9,
            FormatVersion::V10 => 10,
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            8 => Some(FormatVersion::V8),
            9 => Some(FormatVersion::V9),
            10 => Some(FormatVersion::V10),
            _ => None,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Result of a successful parse
#[derive(Debug, Clone)]
pub struct ParsedModel {
    pub model: Model,
    pub version: FormatVersion,
    /// Soft problems found on the way; all of them are repairable
    pub warnings: Vec<ParseError>,
}

/// Reader and writer for model files
pub struct ConfigCodec;

impl ConfigCodec {
    /// Parse a model file of any supported version
    ///
    /// The returned model is not validated yet.
    pub fn parse(text: &str) -> Result<ParsedModel, ParseError> {
        let mut reader = GroupReader::new(text);
        let version = read_version(&mut reader)?;

        let stamp = reader
            .line("stamp")
            .map_err(|_| ParseError::MissingStamp {
                found: String::new(),
            })?;
        if stamp != CONFIG_STAMP {
            return Err(ParseError::MissingStamp {
                found: stamp.to_string(),
            });
        }

        let model = match version {
            FormatVersion::V8 => v8::read(&mut reader)?,
            FormatVersion::V9 => v9::read(&mut reader)?,
            FormatVersion::V10 => v10::read(&mut reader)?,
        };
        let warnings = reader.into_warnings();
        debug!(
            "Parsed {} model file, {} warning(s)",
            version,
            warnings.len()
        );
        Ok(ParsedModel {
            model,
            version,
            warnings,
        })
    }

    /// Serialize a model in the current format
    pub fn serialize(model: &Model) -> String {
        writer::write(model)
    }
}

fn read_version(reader: &mut GroupReader<'_>) -> Result<FormatVersion, ParseError> {
    let line = reader
        .line("version")
        .map_err(|_| ParseError::MissingVersion)?;
    let value = line
        .strip_prefix("ver:")
        .ok_or(ParseError::MissingVersion)?
        .trim();
    value
        .parse::<u32>()
        .ok()
        .and_then(FormatVersion::from_number)
        .ok_or_else(|| ParseError::UnknownVersion(value.to_string()))
}

/// Vehicle names are stored as one token
pub(crate) fn encode_name(name: &str) -> String {
    if name.is_empty() {
        return "*".to_string();
    }
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

pub(crate) fn decode_name(token: &str) -> String {
    if token == "*" {
        return String::new();
    }
    token.replace('_', " ")
}
