//! Bit expansion and related helpers.
//!
//! Read results are handed to the memory-map collaborator as an ASCII
//! bitstream: one `'0'`/`'1'` character per bit, bytes in order, and within
//! each byte the **least significant bit first**. Character `i * 8 + j` is
//! bit `j` of byte `i`.
//!
//! # Example
//!
//! ```
//! use simatic_s7::utils::{expand_bits, pack_bits};
//!
//! // 0x05 = 0b0000_0101: bits 0 and 2 are set
//! assert_eq!(expand_bits(&[0x05]), "10100000");
//!
//! // and back again
//! assert_eq!(pack_bits("10100000").unwrap(), vec![0x05]);
//! ```

use crate::error::{Result, S7Error};

/// Gets a single bit from a byte.
///
/// # Arguments
///
/// * `value` - The byte to extract from
/// * `bit` - Bit position (0-7, where 0 is LSB)
///
/// # Example
///
/// ```
/// use simatic_s7::utils::get_bit;
///
/// assert!(get_bit(0b0000_0100, 2));
/// assert!(!get_bit(0b0000_0100, 1));
/// ```
#[inline]
pub fn get_bit(value: u8, bit: u8) -> bool {
    (value >> bit) & 0x01 != 0
}

/// Sets or clears a single bit in a byte.
///
/// # Example
///
/// ```
/// use simatic_s7::utils::set_bit;
///
/// assert_eq!(set_bit(0, 7, true), 0x80);
/// assert_eq!(set_bit(0xFF, 0, false), 0xFE);
/// ```
#[inline]
pub fn set_bit(value: u8, bit: u8, state: bool) -> u8 {
    if state {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}

/// Expands raw bytes into an LSB-first ASCII bitstream.
///
/// The output always has `bytes.len() * 8` characters. Pure and total.
///
/// # Example
///
/// ```
/// use simatic_s7::utils::expand_bits;
///
/// assert_eq!(expand_bits(&[0x01, 0x80]), "1000000000000001");
/// assert_eq!(expand_bits(&[]), "");
/// ```
pub fn expand_bits(bytes: &[u8]) -> String {
    let mut bits = String::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for j in 0..8 {
            bits.push(if get_bit(byte, j) { '1' } else { '0' });
        }
    }
    bits
}

/// Packs an LSB-first ASCII bitstream back into bytes.
///
/// Inverse of [`expand_bits`]; useful for building write payloads from the
/// same representation the memory map works with.
///
/// # Errors
///
/// Returns `S7Error::InvalidParameter` if the length is not a multiple of 8
/// or a character other than `'0'`/`'1'` appears.
pub fn pack_bits(bits: &str) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(S7Error::invalid_parameter(
            "bits",
            format!("length {} is not a multiple of 8", bits.len()),
        ));
    }

    bits.as_bytes()
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .try_fold(0u8, |byte, (j, &c)| match c {
                    b'0' => Ok(byte),
                    b'1' => Ok(set_bit(byte, j as u8, true)),
                    other => Err(S7Error::invalid_parameter(
                        "bits",
                        format!("unexpected character {:?}", other as char),
                    )),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bit() {
        let value = 0b1010_0101u8;
        assert!(get_bit(value, 0));
        assert!(!get_bit(value, 1));
        assert!(get_bit(value, 2));
        assert!(get_bit(value, 7));
    }

    #[test]
    fn test_set_bit() {
        assert_eq!(set_bit(0, 3, true), 0b0000_1000);
        assert_eq!(set_bit(0b0000_1000, 3, false), 0);
    }

    #[test]
    fn test_expand_single_byte() {
        assert_eq!(expand_bits(&[0x05]), "10100000");
        assert_eq!(expand_bits(&[0xFF]), "11111111");
        assert_eq!(expand_bits(&[0x00]), "00000000");
    }

    #[test]
    fn test_expand_position_matches_bit() {
        let bytes = [0x12u8, 0xA7, 0x00, 0xFE, 0x81];
        let bits = expand_bits(&bytes);
        assert_eq!(bits.len(), bytes.len() * 8);

        let chars: Vec<char> = bits.chars().collect();
        for (i, &byte) in bytes.iter().enumerate() {
            for j in 0..8u8 {
                let expected = if get_bit(byte, j) { '1' } else { '0' };
                assert_eq!(chars[i * 8 + j as usize], expected, "byte {i} bit {j}");
            }
        }
    }

    #[test]
    fn test_expand_every_byte_value() {
        for value in 0..=255u8 {
            let bits = expand_bits(&[value]);
            assert_eq!(bits.len(), 8);
            assert_eq!(pack_bits(&bits).unwrap(), vec![value]);
        }
    }

    #[test]
    fn test_pack_rejects_bad_length() {
        assert!(pack_bits("1010").is_err());
    }

    #[test]
    fn test_pack_rejects_bad_character() {
        let err = pack_bits("1010x000").unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }
}
