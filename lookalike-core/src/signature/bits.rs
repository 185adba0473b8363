//! Fixed-length bitstring hashes.
//!
//! Perceptual hashes are stored packed, most significant bit first, and
//! serialize as `'0'`/`'1'` strings so stored records stay readable by
//! anything that produced the textual form.

use serde::{Deserialize, Serialize};

use crate::error::{LookalikeError, Result};

/// A packed bitstring of arbitrary length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitHash {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitHash {
    /// Pack a sequence of bits, first bit into the high bit of byte 0.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut bit_len = 0;

        for bit in bits {
            if bit_len % 8 == 0 {
                bytes.push(0u8);
            }
            if bit {
                if let Some(last) = bytes.last_mut() {
                    *last |= 0x80 >> (bit_len % 8);
                }
            }
            bit_len += 1;
        }

        Self { bytes, bit_len }
    }

    /// Parse the textual `'0'`/`'1'` form.
    pub fn from_bit_string(s: &str) -> Result<Self> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(LookalikeError::Serialization(format!(
                    "Invalid character {other:?} in bitstring"
                ))),
            })
            .collect::<Result<Vec<bool>>>()?;

        Ok(Self::from_bits(bits))
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Value of bit `index`, or `None` when out of range.
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        Some(self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len).map(move |i| self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Packed bytes; trailing pad bits are always zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn to_bit_string(&self) -> String {
        self.bits().map(|b| if b { '1' } else { '0' }).collect()
    }

    /// Number of differing bit positions, `None` when lengths differ.
    pub fn hamming_distance(&self, other: &Self) -> Option<u32> {
        if self.bit_len != other.bit_len {
            return None;
        }

        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Fraction of positions holding the same bit, in [0, 1].
    ///
    /// Hashes of different (or zero) length share nothing and score 0.
    pub fn matching_fraction(&self, other: &Self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        match self.hamming_distance(other) {
            Some(distance) => (self.bit_len as u32 - distance) as f64 / self.bit_len as f64,
            None => 0.0,
        }
    }
}

impl std::fmt::Display for BitHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

impl TryFrom<String> for BitHash {
    type Error = LookalikeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_bit_string(&value)
    }
}

impl From<BitHash> for String {
    fn from(hash: BitHash) -> Self {
        hash.to_bit_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_is_msb_first() {
        let hash = BitHash::from_bits([true, false, false, false, false, false, false, true, true]);
        assert_eq!(hash.len(), 9);
        assert_eq!(hash.as_bytes(), &[0x81, 0x80]);
        assert_eq!(hash.to_bit_string(), "100000011");
    }

    #[test]
    fn test_bit_string_roundtrip() {
        let text = "0110100111010001";
        let hash = BitHash::from_bit_string(text).unwrap();
        assert_eq!(hash.to_bit_string(), text);
        assert_eq!(hash.to_hex(), "69d1");
        assert_eq!(hash.count_ones(), 8);
    }

    #[test]
    fn test_invalid_bit_string() {
        assert!(BitHash::from_bit_string("01x1").is_err());
    }

    #[test]
    fn test_bit_accessor() {
        let hash = BitHash::from_bit_string("1010").unwrap();
        assert_eq!(hash.bit(0), Some(true));
        assert_eq!(hash.bit(1), Some(false));
        assert_eq!(hash.bit(4), None);
    }

    #[test]
    fn test_hamming_distance() {
        let a = BitHash::from_bit_string("11110000").unwrap();
        let b = BitHash::from_bit_string("11110011").unwrap();
        assert_eq!(a.hamming_distance(&b), Some(2));
        assert_eq!(a.matching_fraction(&b), 0.75);
        assert_eq!(a.matching_fraction(&a), 1.0);
    }

    #[test]
    fn test_length_mismatch_scores_zero() {
        let a = BitHash::from_bit_string("1111").unwrap();
        let b = BitHash::from_bit_string("11110").unwrap();
        assert_eq!(a.hamming_distance(&b), None);
        assert_eq!(a.matching_fraction(&b), 0.0);
    }

    #[test]
    fn test_empty_hash_scores_zero() {
        let empty = BitHash::from_bits(std::iter::empty());
        assert!(empty.is_empty());
        assert_eq!(empty.matching_fraction(&empty), 0.0);
    }

    #[test]
    fn test_serializes_as_bit_string() {
        let hash = BitHash::from_bit_string("0101").unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"0101\"");

        let restored: BitHash = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, hash);
        assert!(serde_json::from_str::<BitHash>("\"012\"").is_err());
    }
}
