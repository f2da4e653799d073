//! UART transport abstractions
//!
//! Transports are asynchronous and completion-driven. Starting an operation
//! returns immediately; the driver later reports the outcome from interrupt
//! context through a [`TransportListener`]. Received bytes do not travel in
//! the event: the driver pushes them into the receive ring as they arrive
//! and the event only tells the session to look.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a receive operation stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxErrorKind {
    /// Line went idle before the requested length arrived
    Timeout,
    /// Stop bit missing
    Framing,
    /// Overrun, noise, parity or DMA fault
    Other,
}

/// Completion notification from a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent {
    /// All bytes of the last transmit left the peripheral
    TxComplete,
    /// The last transmit failed
    TxError,
    /// The requested receive length arrived
    RxComplete,
    /// Receive stopped on an error
    RxError(RxErrorKind),
    /// The configured match byte arrived
    CharacterMatch,
}

/// Single handler for transport completions
///
/// Called from interrupt context, so implementations must not block.
pub trait TransportListener {
    fn on_event(&self, event: TransportEvent);
}

/// A serial transport with asynchronous completion
///
/// One instance carries both directions. The underlying peripheral cannot be
/// opened twice, so transmit and receive must be driven from the same
/// execution context.
pub trait Transport {
    /// Error type for starting an operation
    type Error: core::fmt::Debug;

    /// Arm reception with the given line settings
    ///
    /// Bytes are delivered into the receive ring as they arrive. Progress is
    /// reported as `RxComplete`, `CharacterMatch` or `RxError` events.
    fn start_receive(&mut self, config: &UartConfig) -> Result<(), Self::Error>;

    /// Start sending `data`
    ///
    /// Implementations copy `data` or finish with it before returning
    /// control of the buffer. Completion is reported as `TxComplete` or
    /// `TxError`.
    fn start_transmit(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl UartConfig {
    /// Bits on the wire per byte, start bit included
    pub fn bits_per_byte(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }

    /// Time to shift `len` bytes out, in microseconds (rounded up)
    pub fn transfer_time_us(&self, len: usize) -> u64 {
        let bits = len as u64 * self.bits_per_byte() as u64;
        (bits * 1_000_000).div_ceil(self.baudrate.max(1) as u64)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopBits {
    One,
    Two,
}
