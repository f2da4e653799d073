//! Receive ring buffer
//!
//! Absorbs bytes from the transport's interrupt handler until the consumer
//! task drains them into the frame detector. Backed by a lock-free
//! single-producer/single-consumer queue: [`RxProducer::put_byte`] never
//! blocks and never waits on the consumer.
//!
//! # Overflow policy
//!
//! Drop-newest. When the ring is full the incoming byte is discarded and the
//! overrun counter incremented. Bytes already queued are never evicted, so
//! the oldest in-flight frame attempt keeps its ordering; the frame that was
//! cut short fails its checksum and the detector resynchronizes on the next
//! marker.
//!
//! # Capacity
//!
//! A `RingBuffer<N>` holds at most `N - 1` bytes.
//! Size it for the bytes that can arrive while the consumer is busy with
//! a frame; `2 * max_frame_len(..) + 1` holds two worst-case frames.

use heapless::spsc::{Consumer, Producer, Queue};
use portable_atomic::{AtomicU32, Ordering};

/// Result of storing a byte in the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PutOutcome {
    /// Byte queued
    Stored,
    /// Byte queued and equal to the ring's match byte
    CharacterMatch,
    /// Ring full, byte discarded
    Dropped,
}

/// An in-order source of received bytes
pub trait ByteSource {
    /// Take the oldest byte, if any
    fn next_byte(&mut self) -> Option<u8>;

    /// Number of bytes ready to be taken
    fn available(&self) -> usize;
}

/// Fixed-capacity receive ring
pub struct RingBuffer<const N: usize> {
    queue: Queue<u8, N>,
    overruns: AtomicU32,
    match_byte: u8,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring that reports [`PutOutcome::CharacterMatch`]
    /// whenever `match_byte` is stored
    pub const fn new(match_byte: u8) -> Self {
        Self {
            queue: Queue::new(),
            overruns: AtomicU32::new(0),
            match_byte,
        }
    }

    /// Store a byte, dropping it if the ring is full
    pub fn put_byte(&mut self, byte: u8) -> PutOutcome {
        let stored = self.queue.enqueue(byte).is_ok();
        outcome(stored, byte, self.match_byte, &self.overruns)
    }

    /// Take the oldest byte
    pub fn take_byte(&mut self) -> Option<u8> {
        self.queue.dequeue()
    }

    /// Number of bytes waiting
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of bytes the ring can hold
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of bytes dropped because the ring was full
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Split into an interrupt-side producer and a task-side consumer
    pub fn split(&mut self) -> (RxProducer<'_, N>, RxConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (
            RxProducer {
                inner: producer,
                overruns: &self.overruns,
                match_byte: self.match_byte,
            },
            RxConsumer {
                inner: consumer,
                overruns: &self.overruns,
            },
        )
    }
}

impl<const N: usize> ByteSource for RingBuffer<N> {
    fn next_byte(&mut self) -> Option<u8> {
        self.take_byte()
    }

    fn available(&self) -> usize {
        RingBuffer::available(self)
    }
}

fn outcome(stored: bool, byte: u8, match_byte: u8, overruns: &AtomicU32) -> PutOutcome {
    if !stored {
        overruns.fetch_add(1, Ordering::Relaxed);
        PutOutcome::Dropped
    } else if byte == match_byte {
        PutOutcome::CharacterMatch
    } else {
        PutOutcome::Stored
    }
}

/// Producer half, owned by the transport's byte-arrival path
pub struct RxProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    overruns: &'a AtomicU32,
    match_byte: u8,
}

impl<const N: usize> RxProducer<'_, N> {
    /// Store a byte, dropping it if the ring is full
    ///
    /// O(1), allocation-free and safe to call from interrupt context.
    pub fn put_byte(&mut self, byte: u8) -> PutOutcome {
        let stored = self.inner.enqueue(byte).is_ok();
        outcome(stored, byte, self.match_byte, self.overruns)
    }

    /// Store a run of bytes, returning how many were dropped
    pub fn put_slice(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .filter(|&&b| self.put_byte(b) == PutOutcome::Dropped)
            .count()
    }

    /// True if at least one more byte fits
    pub fn ready(&self) -> bool {
        self.inner.ready()
    }
}

/// Consumer half, owned by the task that drives the frame detector
pub struct RxConsumer<'a, const N: usize> {
    inner: Consumer<'a, u8, N>,
    overruns: &'a AtomicU32,
}

impl<const N: usize> RxConsumer<'_, N> {
    /// Number of bytes dropped because the ring was full
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl<const N: usize> ByteSource for RxConsumer<'_, N> {
    fn next_byte(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }

    fn available(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::MARKER;

    #[test]
    fn test_put_and_take_in_order() {
        let mut ring = RingBuffer::<8>::new(MARKER);
        assert_eq!(ring.put_byte(1), PutOutcome::Stored);
        assert_eq!(ring.put_byte(2), PutOutcome::Stored);
        assert_eq!(ring.available(), 2);

        assert_eq!(ring.take_byte(), Some(1));
        assert_eq!(ring.take_byte(), Some(2));
        assert_eq!(ring.take_byte(), None);
    }

    #[test]
    fn test_character_match() {
        let mut ring = RingBuffer::<8>::new(MARKER);
        assert_eq!(ring.put_byte(MARKER), PutOutcome::CharacterMatch);
        assert_eq!(ring.put_byte(0x00), PutOutcome::Stored);
    }

    #[test]
    fn test_drop_newest_on_overflow() {
        let mut ring = RingBuffer::<4>::new(MARKER);
        assert_eq!(ring.capacity(), 3);

        for b in 1..=3 {
            assert_eq!(ring.put_byte(b), PutOutcome::Stored);
        }
        assert_eq!(ring.put_byte(4), PutOutcome::Dropped);
        assert_eq!(ring.put_byte(MARKER), PutOutcome::Dropped);
        assert_eq!(ring.overruns(), 2);

        // Oldest bytes survive
        assert_eq!(ring.take_byte(), Some(1));
        assert_eq!(ring.take_byte(), Some(2));
        assert_eq!(ring.take_byte(), Some(3));
        assert_eq!(ring.take_byte(), None);
    }

    #[test]
    fn test_split_halves() {
        let mut ring = RingBuffer::<8>::new(MARKER);
        let (mut producer, mut consumer) = ring.split();

        assert_eq!(producer.put_slice(&[1, 2, MARKER]), 0);
        assert_eq!(consumer.available(), 3);
        assert_eq!(consumer.next_byte(), Some(1));

        // 2 queued; 5 more fill the ring, the rest are dropped
        assert_eq!(producer.put_slice(&[10, 11, 12, 13, 14, 15, 16]), 2);
        assert!(!producer.ready());
        assert_eq!(consumer.overruns(), 2);
        assert_eq!(consumer.available(), 7);
    }

    #[test]
    fn test_producer_on_another_thread() {
        let mut ring = RingBuffer::<64>::new(MARKER);
        let (mut producer, mut consumer) = ring.split();

        let mut received = heapless::Vec::<u8, 200>::new();
        std::thread::scope(|s| {
            s.spawn(move || {
                for b in 0..200u8 {
                    while producer.put_byte(b) == PutOutcome::Dropped {
                        std::thread::yield_now();
                    }
                }
            });

            while received.len() < 200 {
                match consumer.next_byte() {
                    Some(b) => received.push(b).unwrap(),
                    None => std::thread::yield_now(),
                }
            }
        });

        for (i, &b) in received.iter().enumerate() {
            assert_eq!(b, i as u8);
        }
    }
}
