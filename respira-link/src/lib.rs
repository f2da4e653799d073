//! Respira serial link
//!
//! Session layer for the controller/GUI link. Wraps one [`Transport`] and
//! the framing pieces from `respira-protocol` behind an async send/receive
//! API with per-direction timeouts.
//!
//! # Wiring
//!
//! ```ignore
//! static LINK_EVENTS: LinkEvents = LinkEvents::new();
//! const FRAME_LEN: usize = max_frame_len(MAX_PAYLOAD, LinkChecksum::WIDTH);
//! const RING_LEN: usize = 2 * FRAME_LEN + 1;
//!
//! static RX_RING: StaticCell<RingBuffer<RING_LEN>> = StaticCell::new();
//!
//! let ring = RX_RING.init(RingBuffer::new(MARKER));
//! let (producer, consumer) = ring.split();
//! // producer and &LINK_EVENTS go to the UART driver
//! let mut session: Session<_, LinkChecksum, FRAME_LEN, RING_LEN> =
//!     Session::new(uart, consumer, &LINK_EVENTS, LinkConfig::default());
//!
//! session.send_payload(&request).await?;
//! let reply = session.receive_payload().await?;
//! ```
//!
//! Send and receive take `&mut self`, so both directions are driven from one
//! task. The serial port cannot be opened twice.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This must go first so the macros are visible to the other modules
mod fmt;

pub mod config;
pub mod error;
pub mod events;
pub mod session;

pub use config::{ConfigError, LinkConfig};
pub use error::LinkError;
pub use events::{LinkEvents, RxEvent, TxOutcome};
pub use session::{LinkStats, Session};

pub use respira_hal::{RxErrorKind, Transport, TransportEvent, TransportListener, UartConfig};
pub use respira_protocol::{
    max_frame_len, Checksum, Crc32, DecodedMessage, FrameError, LinkChecksum, RingBuffer, MARKER,
};
