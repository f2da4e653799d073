//! Frame integrity checks
//!
//! The checksum is always computed over the logical (unescaped) payload, never
//! over markers or escape bytes. It is appended to the payload before stuffing
//! and verified after un-stuffing.
//!
//! The algorithm is a deployment parameter. Both ends of a link must agree on
//! it; the controller and host use [`Crc32`].

/// Widest checksum any engine may produce, in bytes
pub const MAX_CHECKSUM_WIDTH: usize = 4;

/// A fixed-width checksum as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChecksumValue {
    bytes: [u8; MAX_CHECKSUM_WIDTH],
    len: u8,
}

impl ChecksumValue {
    /// Build a value from its wire bytes
    ///
    /// Bytes beyond [`MAX_CHECKSUM_WIDTH`] are ignored.
    pub fn from_bytes(wire: &[u8]) -> Self {
        let len = wire.len().min(MAX_CHECKSUM_WIDTH);
        let mut bytes = [0u8; MAX_CHECKSUM_WIDTH];
        bytes[..len].copy_from_slice(&wire[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// Wire representation, `WIDTH` bytes long
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Width in bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True for a zero-width value
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A checksum engine
///
/// Engines are stateless; the codec and detector are generic over them so
/// the width is known at compile time.
pub trait Checksum {
    /// Number of checksum bytes appended to each payload
    const WIDTH: usize;

    /// Compute the checksum of `bytes`
    fn compute(bytes: &[u8]) -> ChecksumValue;

    /// Compare the checksum of `bytes` against `expected` byte-for-byte
    fn verify(bytes: &[u8], expected: &[u8]) -> bool {
        Self::compute(bytes).as_bytes() == expected
    }
}

/// IEEE 802.3 CRC-32, transmitted little-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

impl Checksum for Crc32 {
    const WIDTH: usize = 4;

    fn compute(bytes: &[u8]) -> ChecksumValue {
        ChecksumValue::from_bytes(&crc32fast::hash(bytes).to_le_bytes())
    }
}

/// Single-byte XOR of all payload bytes
///
/// Cheap, but only detects odd numbers of flipped bits per bit position.
/// Suitable for short links and bench testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xor8;

impl Checksum for Xor8 {
    const WIDTH: usize = 1;

    fn compute(bytes: &[u8]) -> ChecksumValue {
        let checksum = bytes.iter().fold(0u8, |acc, &b| acc ^ b);
        ChecksumValue::from_bytes(&[checksum])
    }
}
