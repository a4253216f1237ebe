//! Conversions between values and bit sequences
//!
//! All sequences are most-significant bit first. Integers use two's
//! complement over the requested width; strings use one byte per character
//! (the code point truncated to its low 8 bits).

use crate::error::{BitramError, Result};

/// Encode `value` as a two's-complement bit sequence.
///
/// With `Some(width)` the result has exactly `width` bits and fails with
/// `EncodingError` if `value` lies outside `[-2^(width-1), 2^(width-1) - 1]`.
/// With `None` the result uses the minimal two's-complement width including
/// the sign bit; zero encodes as a single `0` bit.
///
/// ```
/// use bitram::codec::{decimal_to_bits, format_bits};
///
/// assert_eq!(format_bits(&decimal_to_bits(5, Some(8)).unwrap()), "00000101");
/// assert_eq!(format_bits(&decimal_to_bits(-1, Some(4)).unwrap()), "1111");
/// assert_eq!(format_bits(&decimal_to_bits(5, None).unwrap()), "0101");
/// assert!(decimal_to_bits(128, Some(8)).is_err());
/// ```
pub fn decimal_to_bits(value: i64, width: Option<usize>) -> Result<Vec<bool>> {
    let width = match width {
        Some(width) => {
            if !fits_in_width(value, width) {
                return Err(BitramError::EncodingError(format!(
                    "{} does not fit in {} bits",
                    value, width
                )));
            }
            width
        }
        None => natural_width(value),
    };

    let wide = value as i128;
    let bits = (0..width)
        .map(|i| {
            let shift = width - 1 - i;
            if shift >= 127 {
                wide < 0
            } else {
                (wide >> shift) & 1 == 1
            }
        })
        .collect();
    Ok(bits)
}

/// Decode a two's-complement bit sequence. The first bit is the sign.
///
/// Empty input decodes to 0. Sequences wider than 64 bits decode only if
/// the excess leading bits are pure sign extension.
pub fn bits_to_decimal(bits: &[bool]) -> Result<i64> {
    if bits.is_empty() {
        return Ok(0);
    }

    let bits = if bits.len() > 64 {
        let excess = bits.len() - 64;
        let sign = bits[excess];
        if bits[..excess].iter().any(|&b| b != sign) {
            return Err(BitramError::EncodingError(format!(
                "{}-bit value does not fit in a 64-bit integer",
                bits.len()
            )));
        }
        &bits[excess..]
    } else {
        bits
    };

    let unsigned = bits
        .iter()
        .fold(0u128, |acc, &bit| (acc << 1) | u128::from(bit));
    let value = if bits[0] {
        unsigned as i128 - (1i128 << bits.len())
    } else {
        unsigned as i128
    };
    Ok(value as i64)
}

/// Encode text at 8 bits per character
pub fn string_to_bits(text: &str) -> Vec<bool> {
    let mut bits = Vec::with_capacity(text.chars().count() * 8);
    for ch in text.chars() {
        let byte = ch as u32 as u8;
        bits.extend((0..8).rev().map(|shift| (byte >> shift) & 1 == 1));
    }
    bits
}

/// Decode 8-bit groups into characters. A trailing partial group is dropped.
pub fn bits_to_string(bits: &[bool]) -> String {
    bits.chunks_exact(8)
        .map(|group| char::from(bits_to_byte(group)))
        .collect()
}

/// Parse a literal such as `"0101"`. Whitespace and `_` separators are ignored.
pub fn parse_bits(literal: &str) -> Result<Vec<bool>> {
    literal
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(BitramError::EncodingError(format!(
                "invalid bit character '{}'",
                other
            ))),
        })
        .collect()
}

/// Render bits as a `0`/`1` string
pub fn format_bits(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// Fold up to 8 bits into a byte, left-padding short groups with zeros
pub(crate) fn bits_to_byte(group: &[bool]) -> u8 {
    group
        .iter()
        .fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit))
}

fn fits_in_width(value: i64, width: usize) -> bool {
    if width == 0 {
        return value == 0;
    }
    if width >= 64 {
        return true;
    }
    let half = 1i64 << (width - 1);
    value >= -half && value < half
}

fn natural_width(value: i64) -> usize {
    if value >= 0 {
        64 - value.leading_zeros() as usize + 1
    } else {
        64 - value.leading_ones() as usize + 1
    }
}
