//! Frame encoding and decoding
//!
//! Frame format:
//! - MARKER (1 byte): 0x7E
//! - BODY: payload followed by its checksum, byte-stuffed
//! - MARKER (1 byte): 0x7E
//!
//! The codec is stateless. The streaming side of decoding lives in
//! [`crate::detector`]; [`decode`] handles a complete wire frame already in
//! memory.

use heapless::Vec;

use crate::checksum::Checksum;
use crate::escape::{max_stuffed_len, stuff, unstuff, MARKER};

/// Worst-case wire size of a frame carrying `max_payload` bytes
///
/// Accounts for both markers and for every payload and checksum byte being
/// escaped. Use it to size transmit buffers, the receive ring and the
/// detector at compile time.
pub const fn max_frame_len(max_payload: usize, checksum_width: usize) -> usize {
    2 + max_stuffed_len(max_payload + checksum_width)
}

/// Errors that can occur during frame encoding or decoding
///
/// None of these are fatal to the link. The detector treats all of them as
/// a reason to drop the current span and hunt for the next marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Destination buffer smaller than the worst-case frame
    BufferTooSmall,
    /// Span between markers exceeded the accumulation buffer
    Overflow,
    /// Checksum did not match the payload
    ChecksumMismatch,
    /// Escape byte at the end of a span, or raw marker inside one
    MalformedEscape,
    /// Span too short to hold a checksum
    Truncated,
    /// Wire frame does not start and end with a marker
    MissingMarker,
}

/// Error taxonomy for frame failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorClass {
    /// A buffer was too small for the data
    Capacity,
    /// Data arrived intact but failed verification
    Integrity,
    /// The byte stream did not follow the frame grammar
    Framing,
}

impl FrameError {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            FrameError::BufferTooSmall | FrameError::Overflow => ErrorClass::Capacity,
            FrameError::ChecksumMismatch => ErrorClass::Integrity,
            FrameError::MalformedEscape | FrameError::Truncated | FrameError::MissingMarker => {
                ErrorClass::Framing
            }
        }
    }
}

/// Encode `payload` into `buffer` as a complete wire frame
///
/// Returns the number of bytes written. An empty payload still produces a
/// frame (markers plus checksum), so `Ok` is never zero. Fails with
/// [`FrameError::BufferTooSmall`] if `buffer` is smaller than
/// [`max_frame_len`] for this payload, even when the actual stuffed frame
/// would have fit.
pub fn encode<C: Checksum>(payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if buffer.len() < max_frame_len(payload.len(), C::WIDTH) {
        return Err(FrameError::BufferTooSmall);
    }

    let checksum = C::compute(payload);

    buffer[0] = MARKER;
    let mut pos = 1;
    pos += stuff(payload, &mut buffer[pos..])?;
    pos += stuff(checksum.as_bytes(), &mut buffer[pos..])?;
    *buffer.get_mut(pos).ok_or(FrameError::BufferTooSmall)? = MARKER;

    Ok(pos + 1)
}

/// Encode `payload` into a heapless Vec of capacity `N`
pub fn encode_to_vec<C: Checksum, const N: usize>(
    payload: &[u8],
) -> Result<Vec<u8, N>, FrameError> {
    let mut buffer = [0u8; N];
    let len = encode::<C>(payload, &mut buffer)?;
    Vec::from_slice(&buffer[..len]).map_err(|_| FrameError::BufferTooSmall)
}

/// Decode a complete wire frame, markers included
///
/// `out` receives the un-stuffed payload followed by its checksum, so it
/// must have room for both. Returns the payload length; the payload is
/// `out[..len]`.
pub fn decode<C: Checksum>(wire: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    let body = match wire {
        [MARKER, body @ .., MARKER] => body,
        _ => return Err(FrameError::MissingMarker),
    };

    let len = unstuff(body, out)?;
    verify_unstuffed::<C>(&out[..len])
}

/// Verify un-stuffed frame content (payload followed by checksum)
///
/// Returns the payload length on success.
pub fn verify_unstuffed<C: Checksum>(content: &[u8]) -> Result<usize, FrameError> {
    let payload_len = content
        .len()
        .checked_sub(C::WIDTH)
        .ok_or(FrameError::Truncated)?;
    let (payload, checksum) = content.split_at(payload_len);

    if !C::verify(payload, checksum) {
        return Err(FrameError::ChecksumMismatch);
    }

    Ok(payload_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{Crc32, Xor8};
    use crate::escape::ESCAPE;
    use proptest::prelude::*;

    const MAX_PAYLOAD: usize = 160;
    const MAX_FRAME: usize = max_frame_len(MAX_PAYLOAD, Crc32::WIDTH);

    #[test]
    fn test_max_frame_len() {
        assert_eq!(max_frame_len(0, 1), 4);
        assert_eq!(max_frame_len(2, 1), 8);
        assert_eq!(max_frame_len(150, 4), 310);
    }

    #[test]
    fn test_encode_plain_payload() {
        let mut buffer = [0u8; 16];
        let len = encode::<Xor8>(&[0x01, 0x02], &mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[0x7E, 0x01, 0x02, 0x03, 0x7E]);
    }

    #[test]
    fn test_decode_plain_payload() {
        let mut out = [0u8; 16];
        let len = decode::<Xor8>(&[0x7E, 0x01, 0x02, 0x03, 0x7E], &mut out).unwrap();
        assert_eq!(&out[..len], &[0x01, 0x02]);
    }

    #[test]
    fn test_encode_marker_in_payload() {
        let mut buffer = [0u8; 16];
        let len = encode::<Crc32>(&[MARKER], &mut buffer).unwrap();

        assert_eq!(buffer[0], MARKER);
        assert_eq!(buffer[1], ESCAPE);
        assert_eq!(buffer[2], MARKER ^ 0x20);
        assert_eq!(buffer[len - 1], MARKER);
        assert!(!buffer[1..len - 1].contains(&MARKER));

        let mut out = [0u8; 16];
        let n = decode::<Crc32>(&buffer[..len], &mut out).unwrap();
        assert_eq!(&out[..n], &[MARKER]);
    }

    #[test]
    fn test_encode_empty_payload() {
        let mut buffer = [0u8; 16];
        let len = encode::<Xor8>(&[], &mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[0x7E, 0x00, 0x7E]);

        let mut out = [0u8; 4];
        assert_eq!(decode::<Xor8>(&buffer[..len], &mut out), Ok(0));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        // Worst case for two bytes with CRC-32 is 14; the real frame needs 8
        let mut buffer = [0u8; 13];
        assert_eq!(
            encode::<Crc32>(&[0x01, 0x02], &mut buffer),
            Err(FrameError::BufferTooSmall)
        );
        assert_eq!(FrameError::BufferTooSmall.class(), ErrorClass::Capacity);
    }

    #[test]
    fn test_encode_to_vec() {
        let frame = encode_to_vec::<Xor8, 8>(&[0x01, 0x02]).unwrap();
        assert_eq!(frame.as_slice(), &[0x7E, 0x01, 0x02, 0x03, 0x7E]);

        assert_eq!(
            encode_to_vec::<Xor8, 7>(&[0x01, 0x02]),
            Err(FrameError::BufferTooSmall)
        );
    }

    #[test]
    fn test_decode_corrupted_payload() {
        let mut wire = encode_to_vec::<Crc32, MAX_FRAME>(b"status").unwrap();
        wire[2] ^= 0x04;

        let mut out = [0u8; MAX_FRAME];
        let err = decode::<Crc32>(&wire, &mut out).unwrap_err();
        assert_eq!(err, FrameError::ChecksumMismatch);
        assert_eq!(err.class(), ErrorClass::Integrity);
    }

    #[test]
    fn test_decode_missing_marker() {
        let mut out = [0u8; 8];
        assert_eq!(
            decode::<Xor8>(&[0x01, 0x02, 0x03, 0x7E], &mut out),
            Err(FrameError::MissingMarker)
        );
        assert_eq!(
            decode::<Xor8>(&[0x7E], &mut out),
            Err(FrameError::MissingMarker)
        );
    }

    #[test]
    fn test_decode_truncated() {
        let mut out = [0u8; 8];
        assert_eq!(
            decode::<Crc32>(&[0x7E, 0x01, 0x02, 0x7E], &mut out),
            Err(FrameError::Truncated)
        );
        assert_eq!(FrameError::Truncated.class(), ErrorClass::Framing);
    }

    #[test]
    fn test_decode_bad_escape() {
        let mut out = [0u8; 8];
        assert_eq!(
            decode::<Xor8>(&[0x7E, 0x01, ESCAPE, 0x7E], &mut out),
            Err(FrameError::MalformedEscape)
        );
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD)) {
            let mut wire = [0u8; MAX_FRAME];
            let len = encode::<Crc32>(&payload, &mut wire).unwrap();
            prop_assert!(!wire[1..len - 1].contains(&MARKER));

            let mut out = [0u8; MAX_FRAME];
            let n = decode::<Crc32>(&wire[..len], &mut out).unwrap();
            prop_assert_eq!(&out[..n], &payload[..]);
        }
    }
}
