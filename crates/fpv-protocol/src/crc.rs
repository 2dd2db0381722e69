//! CRC-8 used by the extender protocol
//!
//! Polynomial 0x31, initial value 0xFF, no reflection and no final xor
//! (the CRC-8/NRSC-5 parameter set). The lookup table is built at compile
//! time.

const POLYNOMIAL: u8 = 0x31;
const INITIAL: u8 = 0xFF;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC8_TABLE: [u8; 256] = build_table();

/// Compute the CRC-8 of a byte slice
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(INITIAL, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// Append the CRC-8 of `frame` to it
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc8(frame);
    frame.push(crc);
}

/// Check a frame whose last byte is a CRC-8 over the preceding bytes
///
/// Returns the payload (without the trailer) on success.
pub fn verify_trailer(frame: &[u8]) -> Result<&[u8], crate::ParseError> {
    let (payload, trailer) = match frame.split_last() {
        Some((last, rest)) => (rest, *last),
        None => return Err(crate::ParseError::Incomplete { needed: 1 }),
    };
    let expected = crc8(payload);
    if expected != trailer {
        return Err(crate::ParseError::ChecksumMismatch {
            expected,
            actual: trailer,
        });
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC8_TABLE[0], 0x00);
        assert_eq!(CRC8_TABLE[1], 0x31);
        assert_eq!(CRC8_TABLE[2], 0x62);
        assert_eq!(CRC8_TABLE[3], 0x53);
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF7);
    }

    #[test]
    fn test_empty_is_initial() {
        assert_eq!(crc8(&[]), 0xFF);
    }

    #[test]
    fn test_verify_trailer() {
        let mut frame = vec![0x12, 0x34];
        append_crc(&mut frame);
        assert_eq!(verify_trailer(&frame).unwrap(), &[0x12, 0x34]);

        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(
            verify_trailer(&frame),
            Err(crate::ParseError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_empty_frame() {
        assert_eq!(
            verify_trailer(&[]),
            Err(crate::ParseError::Incomplete { needed: 1 })
        );
    }
}
