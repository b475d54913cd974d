//! The 256-bit unsigned wire integer.

use core::fmt;

/// A `uint256`: 32 bytes, little-endian on the wire and in memory.
///
/// The codec treats it as an opaque integer; arithmetic is out of scope.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Uint256([u8; 32]);

impl Uint256 {
    /// The zero value.
    pub const ZERO: Self = Self([0; 32]);

    /// Builds from little-endian bytes.
    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The little-endian byte representation.
    pub const fn to_le_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Borrows the little-endian byte representation.
    pub fn as_le_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint256(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_land_in_the_low_bytes() {
        let value = Uint256::from(0x0102_0304u64);
        let bytes = value.to_le_bytes();
        assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert!(bytes[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn equality_is_bytewise() {
        assert_eq!(Uint256::from(7), Uint256::from(7));
        assert_ne!(Uint256::from(7), Uint256::ZERO);
    }
}
