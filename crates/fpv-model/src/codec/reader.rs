//! Line-oriented positional reader
//!
//! Every group of a config file is one line with a fixed number of fields,
//! sometimes preceded by a `label:` token. The reader hands out whole groups
//! and fails with [`ParseError::Arity`] when a line carries the wrong number
//! of fields, since nothing after it could be located any more. Values that
//! parse but do not fit their field are recorded as soft warnings.

use crate::error::ParseError;

pub(crate) struct GroupReader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    warnings: Vec<ParseError>,
}

impl<'a> GroupReader<'a> {
    /// Reader over non-blank lines of `text`
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect(),
            pos: 0,
            warnings: Vec::new(),
        }
    }

    /// Next line
    pub fn line(&mut self, group: &'static str) -> Result<&'a str, ParseError> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or(ParseError::UnexpectedEof { group })?;
        self.pos += 1;
        Ok(line)
    }

    /// Next line split into exactly `count` tokens
    pub fn tokens(&mut self, group: &'static str, count: usize) -> Result<Vec<&'a str>, ParseError> {
        let tokens: Vec<&str> = self.line(group)?.split_whitespace().collect();
        if tokens.len() != count {
            return Err(ParseError::Arity {
                group,
                expected: count,
                found: tokens.len(),
            });
        }
        Ok(tokens)
    }

    /// Next line as exactly `count` integers
    ///
    /// A zero count consumes nothing, so optional trailing groups (an empty
    /// bus list) need no line of their own.
    pub fn ints(&mut self, group: &'static str, count: usize) -> Result<Vec<i64>, ParseError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let tokens = self.tokens(group, count)?;
        tokens.iter().map(|t| parse_int(group, t)).collect()
    }

    /// Next line as `label` followed by exactly `count` integers
    pub fn labeled_ints(
        &mut self,
        group: &'static str,
        label: &'static str,
        count: usize,
    ) -> Result<Vec<i64>, ParseError> {
        let line = self.line(group)?;
        let rest = line
            .strip_prefix(label)
            .ok_or(ParseError::MissingLabel { group, label })?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() != count {
            return Err(ParseError::Arity {
                group,
                expected: count,
                found: tokens.len(),
            });
        }
        tokens.iter().map(|t| parse_int(group, t)).collect()
    }

    /// Move to the next line starting with `label`
    ///
    /// Returns false and stays put if there is none.
    pub fn seek_label(&mut self, label: &str) -> bool {
        match self.lines[self.pos..]
            .iter()
            .position(|l| l.starts_with(label))
        {
            Some(offset) => {
                self.pos += offset;
                true
            }
            None => false,
        }
    }

    /// Record a soft problem
    pub fn warn(&mut self, warning: ParseError) {
        self.warnings.push(warning);
    }

    pub fn into_warnings(self) -> Vec<ParseError> {
        self.warnings
    }

    /// Unsigned field; negative or oversized values become `default`
    pub fn u32_field(&mut self, group: &'static str, field: &'static str, value: i64, default: u32) -> u32 {
        u32::try_from(value).unwrap_or_else(|_| {
            self.warn(ParseError::OutOfRange { group, field, value });
            default
        })
    }

    /// Signed 32-bit field
    pub fn i32_field(&mut self, group: &'static str, field: &'static str, value: i64, default: i32) -> i32 {
        i32::try_from(value).unwrap_or_else(|_| {
            self.warn(ParseError::OutOfRange { group, field, value });
            default
        })
    }

    /// Byte-sized field (bus numbers and addresses)
    pub fn u8_field(&mut self, group: &'static str, field: &'static str, value: i64) -> Option<u8> {
        match u8::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => {
                self.warn(ParseError::OutOfRange { group, field, value });
                None
            }
        }
    }

    /// Element count that must not exceed `max`
    pub fn bounded_count(
        &mut self,
        group: &'static str,
        field: &'static str,
        value: i64,
        max: usize,
    ) -> Result<usize, ParseError> {
        match usize::try_from(value) {
            Ok(count) if count <= max => Ok(count),
            Ok(_) => Err(ParseError::TooMany {
                group,
                field,
                value,
                max,
            }),
            Err(_) => Err(ParseError::InvalidNumber {
                group,
                token: value.to_string(),
            }),
        }
    }

    /// Element count; negative counts are structural errors
    pub fn count(&mut self, group: &'static str, value: i64, max: usize) -> Result<usize, ParseError> {
        let count = usize::try_from(value).map_err(|_| ParseError::InvalidNumber {
            group,
            token: value.to_string(),
        })?;
        if count > max {
            self.warn(ParseError::OutOfRange {
                group,
                field: "count",
                value,
            });
        }
        Ok(count)
    }
}

pub(crate) fn parse_int(group: &'static str, token: &str) -> Result<i64, ParseError> {
    token.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        group,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_lines() {
        let mut reader = GroupReader::new("a\n\n   \nb\n");
        assert_eq!(reader.line("g").unwrap(), "a");
        assert_eq!(reader.line("g").unwrap(), "b");
        assert_eq!(reader.line("g"), Err(ParseError::UnexpectedEof { group: "g" }));
    }

    #[test]
    fn test_ints_arity() {
        let mut reader = GroupReader::new("1 2 3\n1 2\n");
        assert_eq!(reader.ints("g", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            reader.ints("g", 3),
            Err(ParseError::Arity { group: "g", expected: 3, found: 2 })
        );
    }

    #[test]
    fn test_zero_ints_consume_nothing() {
        let mut reader = GroupReader::new("7\n");
        assert!(reader.ints("g", 0).unwrap().is_empty());
        assert_eq!(reader.ints("g", 1).unwrap(), vec![7]);
    }

    #[test]
    fn test_labeled_ints() {
        let mut reader = GroupReader::new("relay: 1 -2\nother: 3\n");
        assert_eq!(reader.labeled_ints("relay", "relay:", 2).unwrap(), vec![1, -2]);
        assert_eq!(
            reader.labeled_ints("relay", "relay:", 1),
            Err(ParseError::MissingLabel { group: "relay", label: "relay:" })
        );
    }

    #[test]
    fn test_invalid_number() {
        let mut reader = GroupReader::new("1 x\n");
        assert!(matches!(
            reader.ints("g", 2),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_seek_label() {
        let mut reader = GroupReader::new("a\nb\nhw_info: 1\n");
        assert!(!reader.seek_label("nothing:"));
        assert_eq!(reader.line("g").unwrap(), "a");
        assert!(reader.seek_label("hw_info:"));
        assert_eq!(reader.labeled_ints("hw", "hw_info:", 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_soft_fields() {
        let mut reader = GroupReader::new("");
        assert_eq!(reader.u32_field("g", "f", -4, 9), 9);
        assert_eq!(reader.i32_field("g", "f", -4, 9), -4);
        assert_eq!(reader.u8_field("g", "f", 300), None);
        assert_eq!(reader.count("g", 8, 6).unwrap(), 8);
        assert!(reader.count("g", -1, 6).is_err());

        let warnings = reader.into_warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(ParseError::is_soft));
    }

    #[test]
    fn test_bounded_count_is_hard() {
        let mut reader = GroupReader::new("");
        assert_eq!(reader.bounded_count("g", "buses", 6, 6).unwrap(), 6);
        assert!(!reader.bounded_count("g", "buses", 7, 6).unwrap_err().is_soft());
        assert!(matches!(
            reader.bounded_count("g", "buses", -1, 6),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert!(reader.into_warnings().is_empty());
    }
}
