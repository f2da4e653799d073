//! Respira Hardware Abstraction Layer
//!
//! This crate defines the boundary between the link session and the chip
//! that moves bytes. A UART/DMA driver implements [`uart::Transport`] and
//! reports completions as [`uart::TransportEvent`]s; the session never
//! touches peripheral registers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  respira-link (session)                 │
//! └─────────────────────────────────────────┘
//!          │ start_receive / start_transmit ▲ TransportEvent
//!          ▼                                │
//! ┌─────────────────────────────────────────┐
//! │  respira-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  STM32 UART   │       │  host serial  │
//! │  + DMA driver │       │  port driver  │
//! └───────────────┘       └───────────────┘
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod uart;

pub use uart::{RxErrorKind, Transport, TransportEvent, TransportListener, UartConfig};
