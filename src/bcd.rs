//! Packed binary-coded decimal helpers.
//!
//! Every calendar field of the MCP7940 is stored as two BCD digits, tens in
//! the high nibble and ones in the low nibble. The register bitfields strip
//! the control bits that share a byte with a field; what is left goes through
//! [`decode`] and [`encode`].

/// Errors that can occur while converting to or from BCD.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BcdError {
    /// One of the nibbles holds a value above 9
    InvalidDigit(u8),
    /// The value does not fit in two decimal digits
    OutOfRange(u8),
}

/// Decodes a packed BCD byte into its value (0-99).
///
/// # Errors
///
/// Returns [`BcdError::InvalidDigit`] if either nibble exceeds 9.
pub fn decode(byte: u8) -> Result<u8, BcdError> {
    let tens = byte >> 4;
    let ones = byte & 0x0F;
    if tens > 9 || ones > 9 {
        return Err(BcdError::InvalidDigit(byte));
    }
    Ok(tens * 10 + ones)
}

/// Encodes a value (0-99) as a packed BCD byte.
///
/// # Errors
///
/// Returns [`BcdError::OutOfRange`] if `value` is above 99.
pub fn encode(value: u8) -> Result<u8, BcdError> {
    if value > 99 {
        return Err(BcdError::OutOfRange(value));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid() {
        assert_eq!(decode(0x00).unwrap(), 0);
        assert_eq!(decode(0x09).unwrap(), 9);
        assert_eq!(decode(0x10).unwrap(), 10);
        assert_eq!(decode(0x59).unwrap(), 59);
        assert_eq!(decode(0x99).unwrap(), 99);
    }

    #[test]
    fn test_decode_invalid_nibbles() {
        assert_eq!(decode(0x0A), Err(BcdError::InvalidDigit(0x0A)));
        assert_eq!(decode(0xA0), Err(BcdError::InvalidDigit(0xA0)));
        assert_eq!(decode(0x6F), Err(BcdError::InvalidDigit(0x6F)));
        assert_eq!(decode(0xFF), Err(BcdError::InvalidDigit(0xFF)));
    }

    #[test]
    fn test_encode_valid() {
        assert_eq!(encode(0).unwrap(), 0x00);
        assert_eq!(encode(7).unwrap(), 0x07);
        assert_eq!(encode(10).unwrap(), 0x10);
        assert_eq!(encode(45).unwrap(), 0x45);
        assert_eq!(encode(99).unwrap(), 0x99);
    }

    #[test]
    fn test_encode_out_of_range() {
        assert_eq!(encode(100), Err(BcdError::OutOfRange(100)));
        assert_eq!(encode(u8::MAX), Err(BcdError::OutOfRange(u8::MAX)));
    }

    #[test]
    fn test_every_value_survives_encode_decode() {
        for value in 0..=99u8 {
            assert_eq!(decode(encode(value).unwrap()).unwrap(), value);
        }
    }
}
