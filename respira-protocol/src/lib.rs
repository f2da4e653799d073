//! Respira serial link framing
//!
//! This crate is the framing layer of the point-to-point UART link between
//! the Respira cycle controller and the GUI host. It turns an interrupt-fed,
//! error-prone byte stream into verified payloads, and payloads back into
//! wire frames.
//!
//! # Wire format
//!
//! ```text
//! ┌────────┬──────────────────────────────────────┬────────┐
//! │ MARKER │ stuffed(PAYLOAD ++ CHECKSUM)         │ MARKER │
//! │ 0x7E   │ 0x7E, 0x7D -> 0x7D, byte ^ 0x20      │ 0x7E   │
//! └────────┴──────────────────────────────────────┴────────┘
//! ```
//!
//! The checksum covers the unescaped payload only. Payloads are opaque.
//!
//! # Receive path
//!
//! ```text
//! UART ISR ──► RxProducer ══ RingBuffer ══ RxConsumer ──► FrameDetector ──► payload
//! ```
//!
//! All storage is statically sized. Corrupt, truncated or oversized frames
//! are dropped and the detector resynchronizes on the next marker.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod checksum;
pub mod detector;
pub mod escape;
pub mod frame;
pub mod ring;

pub use checksum::{Checksum, ChecksumValue, Crc32, Xor8};
pub use detector::{DecodedMessage, DetectorState, DetectorStats, FrameDetector, Progress};
pub use escape::{ESCAPE, MARKER};
pub use frame::{decode, encode, max_frame_len, ErrorClass, FrameError};
pub use ring::{ByteSource, PutOutcome, RingBuffer, RxConsumer, RxProducer};

/// Checksum engine used by the deployed link
pub type LinkChecksum = Crc32;
