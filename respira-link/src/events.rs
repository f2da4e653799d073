//! Transport completion routing
//!
//! The transport reports completions from interrupt context through
//! [`TransportListener`]. [`LinkEvents`] turns them into something the
//! session task can await:
//!
//! - a signal for the single in-flight transmit
//! - a signal for receive control events (`RxComplete`, `RxError`), which
//!   require the session to re-arm or report a fault
//! - a wake-up signal for `CharacterMatch`
//!
//! Signals hold the latest value, so nothing is queued and nothing can be
//! crowded out. Repeated character matches collapse into one wake-up; the
//! session drains the whole ring on every wake-up anyway.
//!
//! Typically placed in a `static` so the interrupt handler can reach it:
//!
//! ```ignore
//! static LINK_EVENTS: LinkEvents = LinkEvents::new();
//! ```

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use respira_hal::{RxErrorKind, TransportEvent, TransportListener};

/// Outcome of a transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxOutcome {
    Complete,
    Failed,
}

/// Receive progress reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    /// Requested length arrived; reception must be re-armed
    Complete,
    /// A marker arrived
    CharacterMatch,
    /// Reception stopped on an error
    Error(RxErrorKind),
}

/// Completion sink shared between a transport and its session
pub struct LinkEvents {
    tx: Signal<CriticalSectionRawMutex, TxOutcome>,
    rx_control: Signal<CriticalSectionRawMutex, RxEvent>,
    rx_wake: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for LinkEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEvents {
    pub const fn new() -> Self {
        Self {
            tx: Signal::new(),
            rx_control: Signal::new(),
            rx_wake: Signal::new(),
        }
    }

    /// Route a transport event. Never blocks.
    pub fn notify(&self, event: TransportEvent) {
        match event {
            TransportEvent::TxComplete => self.tx.signal(TxOutcome::Complete),
            TransportEvent::TxError => self.tx.signal(TxOutcome::Failed),
            TransportEvent::RxComplete => self.rx_control.signal(RxEvent::Complete),
            TransportEvent::RxError(kind) => self.rx_control.signal(RxEvent::Error(kind)),
            TransportEvent::CharacterMatch => self.rx_wake.signal(()),
        }
    }

    /// Forget any pending transmit outcome and receive events
    pub fn clear(&self) {
        self.tx.reset();
        self.rx_control.reset();
        self.rx_wake.reset();
    }

    pub(crate) fn reset_tx(&self) {
        self.tx.reset();
    }

    pub(crate) async fn tx_outcome(&self) -> TxOutcome {
        self.tx.wait().await
    }

    /// Wait for the next receive event
    ///
    /// A pending control event is returned before a pending wake-up.
    pub(crate) async fn next_rx(&self) -> RxEvent {
        match select(self.rx_control.wait(), self.rx_wake.wait()).await {
            Either::First(event) => event,
            Either::Second(()) => RxEvent::CharacterMatch,
        }
    }
}

impl TransportListener for LinkEvents {
    fn on_event(&self, event: TransportEvent) {
        self.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_tx_events_signal() {
        let events = LinkEvents::new();
        events.on_event(TransportEvent::TxComplete);
        assert_eq!(block_on(events.tx_outcome()), TxOutcome::Complete);

        events.on_event(TransportEvent::TxError);
        assert_eq!(block_on(events.tx_outcome()), TxOutcome::Failed);
    }

    #[test]
    fn test_latest_tx_outcome_wins() {
        let events = LinkEvents::new();
        events.on_event(TransportEvent::TxError);
        events.on_event(TransportEvent::TxComplete);
        assert_eq!(block_on(events.tx_outcome()), TxOutcome::Complete);
    }

    #[test]
    fn test_control_event_before_wake() {
        let events = LinkEvents::new();
        events.on_event(TransportEvent::CharacterMatch);
        events.on_event(TransportEvent::RxError(RxErrorKind::Framing));

        assert_eq!(
            block_on(events.next_rx()),
            RxEvent::Error(RxErrorKind::Framing)
        );
        assert_eq!(block_on(events.next_rx()), RxEvent::CharacterMatch);
    }

    #[test]
    fn test_matches_never_crowd_out_rearm() {
        let events = LinkEvents::new();
        for _ in 0..32 {
            events.on_event(TransportEvent::CharacterMatch);
        }
        events.on_event(TransportEvent::RxComplete);
        for _ in 0..32 {
            events.on_event(TransportEvent::CharacterMatch);
        }

        assert_eq!(block_on(events.next_rx()), RxEvent::Complete);
        // All matches collapse into a single wake-up
        assert_eq!(block_on(events.next_rx()), RxEvent::CharacterMatch);
        assert!(events.rx_wake.try_take().is_none());
        assert!(events.rx_control.try_take().is_none());
    }

    #[test]
    fn test_clear() {
        let events = LinkEvents::new();
        events.on_event(TransportEvent::CharacterMatch);
        events.on_event(TransportEvent::RxComplete);
        events.on_event(TransportEvent::TxComplete);
        events.clear();

        assert!(events.rx_wake.try_take().is_none());
        assert!(events.rx_control.try_take().is_none());
        assert!(events.tx.try_take().is_none());
    }
}
