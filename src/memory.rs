//! Bitstream value and the memory-map seam.
//!
//! A data block read produces a [`BitString`]. Interpreting it as named
//! booleans or numeric fields is the job of a memory map that lives outside
//! this crate; it plugs in by implementing [`MemoryMap`], and
//! [`Client::fetch`](crate::Client::fetch) builds it from `(bits, bit_length)`.
//!
//! # Example
//!
//! ```
//! use simatic_s7::{BitString, MemoryMap};
//!
//! struct Flags {
//!     running: bool,
//!     fault: bool,
//! }
//!
//! impl MemoryMap for Flags {
//!     fn from_bits(bits: BitString, _length: usize) -> Self {
//!         Flags {
//!             running: bits.bit(0).unwrap_or(false),
//!             fault: bits.bit(1).unwrap_or(false),
//!         }
//!     }
//! }
//!
//! let flags = Flags::from_bits(BitString::from_bytes(&[0x01]), 8);
//! assert!(flags.running);
//! assert!(!flags.fault);
//! ```

use std::fmt;

use crate::utils::{expand_bits, set_bit};

/// LSB-first ASCII bitstream produced by a data block read.
///
/// Always holds a multiple of 8 characters, each `'0'` or `'1'`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitString(String);

impl BitString {
    /// Expands raw bytes (see [`expand_bits`]).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(expand_bits(bytes))
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no bits are held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit at `index` (`byte * 8 + bit`), or `None` past the end.
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::BitString;
    ///
    /// let bits = BitString::from_bytes(&[0x00, 0x04]);
    /// assert_eq!(bits.bit(10), Some(true));
    /// assert_eq!(bits.bit(16), None);
    /// ```
    pub fn bit(&self, index: usize) -> Option<bool> {
        self.0.as_bytes().get(index).map(|&c| c == b'1')
    }

    /// Packs the bits back into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (j, &c)| set_bit(byte, j as u8, c == b'1'))
            })
            .collect()
    }

    /// Borrows the characters.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the value, returning the characters.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BitString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A memory map built from a data block read.
pub trait MemoryMap: Sized {
    /// Builds the map from the bitstream and its length in bits.
    fn from_bits(bits: BitString, length: usize) -> Self;
}

impl MemoryMap for BitString {
    fn from_bits(bits: BitString, _length: usize) -> Self {
        bits
    }
}

impl MemoryMap for (BitString, usize) {
    fn from_bits(bits: BitString, length: usize) -> Self {
        (bits, length)
    }
}
