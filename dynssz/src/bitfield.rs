//! Bitfield value types.
//!
//! Bits are packed little-endian within each byte: bit `i` lives at
//! `data[i / 8] & (1 << (i % 8))`. Both types maintain the invariant that
//! storage holds exactly `⌈len/8⌉` bytes with all padding bits zero, so
//! marshalling is a plain copy.

use crate::error::{Error, ErrorKind, Result};

pub(crate) fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// A fixed-length run of bits. The declared length comes from the field's
/// size annotation; values must match it when marshalled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitVector {
    data: Vec<u8>,
    len: usize,
}

impl BitVector {
    /// An all-zero bit run of the given length.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; bytes_for_bits(len)],
            len,
        }
    }

    /// Builds a bit run from explicit bit values.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut out = Self::new(bits.len());
        for (i, bit) in bits.iter().enumerate() {
            out.set(i, *bit);
        }
        out
    }

    /// The number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the run holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.data[index / 8] & (1 << (index % 8)) != 0)
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds, like slice indexing.
    pub fn set(&mut self, index: usize, bit: bool) {
        assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
        if bit {
            self.data[index / 8] |= 1 << (index % 8);
        } else {
            self.data[index / 8] &= !(1 << (index % 8));
        }
    }

    /// The packed backing bytes, `⌈len/8⌉` of them.
    pub fn as_raw_slice(&self) -> &[u8] {
        &self.data
    }

    /// Rebuilds from wire bytes, validating length and padding.
    pub(crate) fn from_wire(data: &[u8], bits: usize) -> Result<Self> {
        if data.len() != bytes_for_bits(bits) {
            return Err(Error::new(ErrorKind::SizeMismatch {
                expected: bytes_for_bits(bits),
                actual: data.len(),
            })
            .with_offset(0));
        }
        let tail = bits % 8;
        if tail != 0 {
            let padding = data[data.len() - 1] & !((1u8 << tail) - 1);
            if padding != 0 {
                return Err(Error::new(ErrorKind::InvalidBitlist("nonzero padding bits"))
                    .with_offset(data.len() - 1));
            }
        }
        Ok(Self {
            data: data.to_vec(),
            len: bits,
        })
    }
}

/// A growable run of bits, marshalled with a delimiter bit appended at the
/// length position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitList {
    data: Vec<u8>,
    len: usize,
}

impl BitList {
    /// An empty bit run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bit run from explicit bit values.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut out = Self::new();
        for bit in bits {
            out.push(*bit);
        }
        out
    }

    /// The number of bits, excluding the wire-level delimiter.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the run holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.data[index / 8] & (1 << (index % 8)) != 0)
    }

    /// Appends a bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.len / 8] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    /// The packed backing bytes, `⌈len/8⌉` of them, without the delimiter.
    pub fn as_raw_slice(&self) -> &[u8] {
        &self.data
    }

    /// Appends the delimited wire form: the bits followed by a 1 bit at
    /// position `len`.
    pub(crate) fn write_delimited(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&self.data);
        if self.len % 8 == 0 {
            out.push(1);
        } else {
            out[start + self.len / 8] |= 1 << (self.len % 8);
        }
    }

    /// Rebuilds from delimited wire bytes, validating the delimiter.
    pub(crate) fn from_wire(data: &[u8]) -> Result<Self> {
        let Some((&last, _)) = data.split_last() else {
            return Err(Error::new(ErrorKind::InvalidBitlist("empty payload")).with_offset(0));
        };
        if last == 0 {
            return Err(Error::new(ErrorKind::InvalidBitlist("missing delimiter bit"))
                .with_offset(data.len() - 1));
        }
        // The delimiter is the highest set bit of the last byte; everything
        // above it is zero by construction.
        let delimiter = 7 - last.leading_zeros() as usize;
        let len = (data.len() - 1) * 8 + delimiter;
        let mut bits = data.to_vec();
        bits[data.len() - 1] &= !(1u8 << delimiter);
        bits.truncate(bytes_for_bits(len));
        Ok(Self { data: bits, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_vector_round_trips_bools() {
        let bits = BitVector::from_bools(&[true, false, true, true, false, false, false, false, true]);
        assert_eq!(bits.len(), 9);
        assert_eq!(bits.as_raw_slice(), &[0b0000_1101, 0b0000_0001]);
        assert_eq!(bits.get(0), Some(true));
        assert_eq!(bits.get(1), Some(false));
        assert_eq!(bits.get(8), Some(true));
        assert_eq!(bits.get(9), None);
    }

    #[test]
    fn bit_vector_wire_validation() {
        assert!(BitVector::from_wire(&[0x0D, 0x01], 9).is_ok());
        let err = BitVector::from_wire(&[0x0D], 9).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SizeMismatch { .. }));
        let err = BitVector::from_wire(&[0x0D, 0x02], 9).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidBitlist(_)));
    }

    #[test]
    fn bit_list_delimiter_placement() {
        let mut wire = Vec::new();
        BitList::from_bools(&[true, false, true]).write_delimited(&mut wire);
        assert_eq!(wire, vec![0x0D]);

        wire.clear();
        BitList::new().write_delimited(&mut wire);
        assert_eq!(wire, vec![0x01]);

        wire.clear();
        BitList::from_bools(&[true; 8]).write_delimited(&mut wire);
        assert_eq!(wire, vec![0xFF, 0x01]);
    }

    #[test]
    fn bit_list_wire_round_trip() {
        for bools in [
            &[][..],
            &[true][..],
            &[true, false, true][..],
            &[false; 8][..],
            &[true; 13][..],
        ] {
            let list = BitList::from_bools(bools);
            let mut wire = Vec::new();
            list.write_delimited(&mut wire);
            assert_eq!(BitList::from_wire(&wire).unwrap(), list);
        }
    }

    #[test]
    fn bit_list_rejects_malformed_wire() {
        let err = BitList::from_wire(&[]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidBitlist(_)));
        let err = BitList::from_wire(&[0x05, 0x00]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidBitlist(_)));
    }

    #[test]
    fn delimiter_only_byte_decodes_to_multiple_of_eight() {
        let list = BitList::from_wire(&[0xFF, 0x01]).unwrap();
        assert_eq!(list.len(), 8);
        assert_eq!(list.as_raw_slice(), &[0xFF]);
    }
}
