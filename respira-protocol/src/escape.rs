//! Byte stuffing
//!
//! The marker byte delimits frames, so it must never appear inside one. Any
//! marker or escape byte in the stuffed region is replaced by the pair
//! `ESCAPE, byte ^ ESCAPE_XOR`:
//!
//! ```text
//! 0x7E  ->  0x7D 0x5E
//! 0x7D  ->  0x7D 0x5D
//! ```

use crate::frame::FrameError;

/// Frame delimiter
pub const MARKER: u8 = 0x7E;

/// Introduces a transformed byte
pub const ESCAPE: u8 = 0x7D;

/// Applied to the byte following [`ESCAPE`]
pub const ESCAPE_XOR: u8 = 0x20;

/// True if `byte` must be escaped inside a frame
#[inline]
pub const fn needs_escape(byte: u8) -> bool {
    byte == MARKER || byte == ESCAPE
}

/// Worst-case stuffed size of `len` input bytes (every byte escaped)
pub const fn max_stuffed_len(len: usize) -> usize {
    len * 2
}

/// Exact stuffed size of `bytes`
pub fn stuffed_len(bytes: &[u8]) -> usize {
    bytes.len() + bytes.iter().filter(|&&b| needs_escape(b)).count()
}

/// Stuff `src` into `dst`
///
/// Returns the number of bytes written. Fails with
/// [`FrameError::BufferTooSmall`] if the stuffed form does not fit, in which
/// case `dst` holds a partial result.
pub fn stuff(src: &[u8], dst: &mut [u8]) -> Result<usize, FrameError> {
    let mut written = 0;
    for &byte in src {
        if needs_escape(byte) {
            if written + 2 > dst.len() {
                return Err(FrameError::BufferTooSmall);
            }
            dst[written] = ESCAPE;
            dst[written + 1] = byte ^ ESCAPE_XOR;
            written += 2;
        } else {
            if written >= dst.len() {
                return Err(FrameError::BufferTooSmall);
            }
            dst[written] = byte;
            written += 1;
        }
    }
    Ok(written)
}

/// Reverse [`stuff`]
///
/// `src` is the span between two markers and must not contain a raw marker.
/// Fails with [`FrameError::MalformedEscape`] if the span ends on an escape
/// byte or contains a raw marker, and with [`FrameError::BufferTooSmall`] if
/// the result does not fit in `dst`.
pub fn unstuff(src: &[u8], dst: &mut [u8]) -> Result<usize, FrameError> {
    let mut written = 0;
    let mut bytes = src.iter();

    while let Some(&byte) = bytes.next() {
        let value = match byte {
            MARKER => return Err(FrameError::MalformedEscape),
            ESCAPE => match bytes.next() {
                Some(&next) if next != MARKER => next ^ ESCAPE_XOR,
                _ => return Err(FrameError::MalformedEscape),
            },
            other => other,
        };

        let slot = dst.get_mut(written).ok_or(FrameError::BufferTooSmall)?;
        *slot = value;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stuff_plain_bytes_unchanged() {
        let mut out = [0u8; 8];
        let len = stuff(&[0x01, 0x02, 0x03], &mut out).unwrap();
        assert_eq!(&out[..len], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_stuff_marker_and_escape() {
        let mut out = [0u8; 8];
        let len = stuff(&[MARKER, 0x11, ESCAPE], &mut out).unwrap();
        assert_eq!(&out[..len], &[ESCAPE, 0x5E, 0x11, ESCAPE, 0x5D]);
        assert_eq!(len, stuffed_len(&[MARKER, 0x11, ESCAPE]));
    }

    #[test]
    fn test_stuff_buffer_too_small() {
        let mut out = [0u8; 2];
        assert_eq!(
            stuff(&[0x01, MARKER], &mut out),
            Err(FrameError::BufferTooSmall)
        );
        assert_eq!(stuff(&[1, 2, 3], &mut out), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_unstuff_trailing_escape() {
        let mut out = [0u8; 8];
        assert_eq!(
            unstuff(&[0x01, ESCAPE], &mut out),
            Err(FrameError::MalformedEscape)
        );
    }

    #[test]
    fn test_unstuff_raw_marker() {
        let mut out = [0u8; 8];
        assert_eq!(
            unstuff(&[0x01, MARKER, 0x02], &mut out),
            Err(FrameError::MalformedEscape)
        );
        assert_eq!(
            unstuff(&[ESCAPE, MARKER], &mut out),
            Err(FrameError::MalformedEscape)
        );
    }

    #[test]
    fn test_unstuff_overflow() {
        let mut out = [0u8; 2];
        assert_eq!(
            unstuff(&[1, 2, 3], &mut out),
            Err(FrameError::BufferTooSmall)
        );
    }

    #[test]
    fn test_every_byte_value() {
        let mut all = [0u8; 256];
        for (i, b) in all.iter_mut().enumerate() {
            *b = i as u8;
        }

        let mut stuffed = [0u8; max_stuffed_len(256)];
        let len = stuff(&all, &mut stuffed).unwrap();
        assert_eq!(len, 258);
        assert!(!stuffed[..len].contains(&MARKER));

        let mut restored = [0u8; 256];
        let n = unstuff(&stuffed[..len], &mut restored).unwrap();
        assert_eq!(&restored[..n], &all[..]);
    }

    proptest! {
        #[test]
        fn prop_unstuff_inverts_stuff(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut stuffed = [0u8; max_stuffed_len(512)];
            let len = stuff(&data, &mut stuffed).unwrap();
            prop_assert!(!stuffed[..len].contains(&MARKER));
            prop_assert_eq!(len, stuffed_len(&data));

            let mut restored = [0u8; 512];
            let n = unstuff(&stuffed[..len], &mut restored).unwrap();
            prop_assert_eq!(&restored[..n], &data[..]);
        }
    }
}
