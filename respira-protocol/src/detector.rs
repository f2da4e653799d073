//! Streaming frame detector
//!
//! Turns the received byte stream into verified frames, one byte at a time.
//! Bytes are un-stuffed as they arrive, so the accumulation buffer only ever
//! holds logical content (payload followed by checksum).
//!
//! ```text
//!                 MARKER                        MARKER, verified
//! AwaitingStart ─────────► Accumulating ─────────────────────────► FrameReady
//!      ▲                    │        ▲                                  │
//!      │            ESCAPE  │        │ any byte                         │
//!      │                    ▼        │                                  │
//!      │               EscapePending ┘                                  │
//!      │                                                                │
//!      └──── Error(reason) ◄── bad checksum / bad escape / overflow     │
//!      └────────────────────────────────────────────── frame consumed ──┘
//! ```
//!
//! Every failure is a resynchronization: the span is discarded and the
//! detector hunts for the next marker. Nothing here is fatal.
//!
//! A marker that closes an empty span is treated as the start of a new one.
//! This lets the detector lock on when it joins mid-stream, where the closing
//! marker of one frame is immediately followed by the opening marker of the
//! next.

use core::marker::PhantomData;
use core::ops::Deref;

use heapless::Vec;

use crate::checksum::Checksum;
use crate::escape::{ESCAPE, ESCAPE_XOR, MARKER};
use crate::frame::{verify_unstuffed, ErrorClass, FrameError};
use crate::ring::ByteSource;

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectorState {
    /// Discarding bytes until a marker
    AwaitingStart,
    /// Inside a frame, collecting bytes
    Accumulating,
    /// Previous byte was an escape
    EscapePending,
    /// A verified frame is waiting to be taken
    FrameReady,
    /// The last span was dropped; behaves like `AwaitingStart`
    Error(FrameError),
}

/// Outcome of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// Byte consumed, no frame yet
    Pending,
    /// Byte consumed and it completed a verified frame
    FrameReady,
    /// A frame is already waiting; the byte was not consumed
    Held,
}

/// Counters for link diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DetectorStats {
    /// Frames that passed verification
    pub frames: u32,
    /// Spans rejected for a bad checksum
    pub checksum_failures: u32,
    /// Spans rejected for a bad escape or missing checksum
    pub framing_failures: u32,
    /// Spans rejected for exceeding the accumulation buffer
    pub overflows: u32,
    /// Bytes skipped while hunting for a marker
    pub discarded: u32,
}

impl DetectorStats {
    /// Total number of rejected spans
    pub fn rejected(&self) -> u32 {
        self.checksum_failures + self.framing_failures + self.overflows
    }
}

/// Frame detector with an `N`-byte accumulation buffer
///
/// `N` bounds the un-stuffed content of one frame: the largest payload plus
/// the checksum width. Sizing it with [`crate::max_frame_len`] is always
/// sufficient.
pub struct FrameDetector<C, const N: usize> {
    state: DetectorState,
    buffer: Vec<u8, N>,
    payload_len: usize,
    stats: DetectorStats,
    _checksum: PhantomData<fn() -> C>,
}

impl<C: Checksum, const N: usize> Default for FrameDetector<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Checksum, const N: usize> FrameDetector<C, N> {
    /// Create a detector waiting for its first marker
    pub const fn new() -> Self {
        Self {
            state: DetectorState::AwaitingStart,
            buffer: Vec::new(),
            payload_len: 0,
            stats: DetectorStats {
                frames: 0,
                checksum_failures: 0,
                framing_failures: 0,
                overflows: 0,
                discarded: 0,
            },
            _checksum: PhantomData,
        }
    }

    /// Current state
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Diagnostic counters
    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    /// True if a verified frame is waiting
    pub fn is_frame_available(&self) -> bool {
        self.state == DetectorState::FrameReady
    }

    /// Payload length of the waiting frame, or 0 if there is none
    pub fn frame_length(&self) -> usize {
        if self.is_frame_available() {
            self.payload_len
        } else {
            0
        }
    }

    /// Borrow the waiting frame's payload without consuming it
    pub fn peek_frame(&self) -> Option<&[u8]> {
        self.is_frame_available()
            .then(|| &self.buffer[..self.payload_len])
    }

    /// Take the waiting frame
    ///
    /// The detector resumes scanning when the returned message is dropped.
    pub fn take_frame(&mut self) -> Option<DecodedMessage<'_, C, N>> {
        if self.is_frame_available() {
            Some(DecodedMessage { detector: self })
        } else {
            None
        }
    }

    /// Feed one byte
    ///
    /// Returns an error when the byte ends a span that fails verification or
    /// overflows the buffer. The detector has already resynchronized by then;
    /// the error is informational.
    pub fn feed(&mut self, byte: u8) -> Result<Progress, FrameError> {
        match self.state {
            DetectorState::FrameReady => Ok(Progress::Held),
            DetectorState::AwaitingStart | DetectorState::Error(_) => {
                if byte == MARKER {
                    self.buffer.clear();
                    self.state = DetectorState::Accumulating;
                } else {
                    self.stats.discarded = self.stats.discarded.saturating_add(1);
                    self.state = DetectorState::AwaitingStart;
                }
                Ok(Progress::Pending)
            }
            DetectorState::Accumulating => match byte {
                MARKER => self.end_span(),
                ESCAPE => {
                    self.state = DetectorState::EscapePending;
                    Ok(Progress::Pending)
                }
                other => self.push(other),
            },
            DetectorState::EscapePending => {
                if byte == MARKER {
                    // Span ended on an escape byte
                    return Err(self.reject(FrameError::MalformedEscape));
                }
                self.push(byte ^ ESCAPE_XOR)
            }
        }
    }

    /// Pull bytes from `source` until a frame is ready or it runs dry
    ///
    /// Returns `Ok(true)` if a frame is waiting. Stops at the first rejected
    /// span so the caller can observe it; call again to keep draining. While
    /// a frame is waiting no bytes are pulled, so they stay queued in the
    /// source.
    pub fn drain<S: ByteSource>(&mut self, source: &mut S) -> Result<bool, FrameError> {
        loop {
            if self.is_frame_available() {
                return Ok(true);
            }
            match source.next_byte() {
                Some(byte) => {
                    self.feed(byte)?;
                }
                None => return Ok(false),
            }
        }
    }

    /// Feed a run of bytes, stopping at the first frame
    ///
    /// Returns the number of bytes consumed and whether a frame is waiting.
    /// Rejected spans are counted in [`stats`](Self::stats) but do not stop
    /// the scan.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (usize, bool) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(Progress::FrameReady) => return (i + 1, true),
                Ok(Progress::Held) => return (i, true),
                Ok(Progress::Pending) | Err(_) => {}
            }
        }
        (bytes.len(), self.is_frame_available())
    }

    fn push(&mut self, byte: u8) -> Result<Progress, FrameError> {
        if self.buffer.push(byte).is_err() {
            return Err(self.reject(FrameError::Overflow));
        }
        self.state = DetectorState::Accumulating;
        Ok(Progress::Pending)
    }

    fn end_span(&mut self) -> Result<Progress, FrameError> {
        if self.buffer.is_empty() {
            // Back-to-back markers: this one opens the frame
            return Ok(Progress::Pending);
        }

        match verify_unstuffed::<C>(&self.buffer) {
            Ok(payload_len) => {
                self.payload_len = payload_len;
                self.state = DetectorState::FrameReady;
                self.stats.frames = self.stats.frames.saturating_add(1);
                Ok(Progress::FrameReady)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&mut self, error: FrameError) -> FrameError {
        let counter = match error.class() {
            ErrorClass::Integrity => &mut self.stats.checksum_failures,
            ErrorClass::Framing => &mut self.stats.framing_failures,
            ErrorClass::Capacity => &mut self.stats.overflows,
        };
        *counter = counter.saturating_add(1);

        self.buffer.clear();
        self.payload_len = 0;
        self.state = DetectorState::Error(error);
        error
    }
}

impl<C, const N: usize> FrameDetector<C, N> {
    /// Drop any partial or waiting frame and hunt for the next marker
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.payload_len = 0;
        self.state = DetectorState::AwaitingStart;
    }
}

/// A verified payload borrowed from the detector
///
/// Dereferences to the payload bytes (checksum stripped). Dropping it
/// releases the buffer and the detector resumes scanning.
pub struct DecodedMessage<'a, C, const N: usize> {
    detector: &'a mut FrameDetector<C, N>,
}

impl<C, const N: usize> DecodedMessage<'_, C, N> {
    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.detector.buffer[..self.detector.payload_len]
    }
}

impl<C, const N: usize> Deref for DecodedMessage<'_, C, N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.payload()
    }
}

impl<C, const N: usize> Drop for DecodedMessage<'_, C, N> {
    fn drop(&mut self) {
        self.detector.reset();
    }
}
