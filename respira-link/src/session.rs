//! Link session
//!
//! Owns one transport and drives both directions from a single task. Only
//! one transmit is in flight at a time: [`Session::send_payload`] returns
//! once the transport confirms completion or the write timeout expires.
//! Reception runs continuously once armed; the transport pushes bytes into
//! the ring and [`Session::receive_payload`] drains them through the frame
//! detector until a verified payload is available or the inter-frame timeout
//! expires.
//!
//! ```text
//!           send_payload                      receive_payload
//!                │                                   ▲
//!          encode│                            verified│payload
//!                ▼                                   │
//!   tx_buf ─► Transport ═══ wire ═══ Transport ─► RingBuffer ─► FrameDetector
//!                │                       │
//!                └──── LinkEvents ◄──────┘  (completions from ISR)
//! ```

use embassy_time::{with_timeout, Instant};
use serde::de::DeserializeOwned;
use serde::Serialize;

use respira_hal::{RxErrorKind, Transport};
use respira_protocol::frame::encode;
use respira_protocol::{
    Checksum, DecodedMessage, DetectorStats, FrameDetector, FrameError, RxConsumer,
};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::{LinkEvents, RxEvent, TxOutcome};

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames the transport confirmed as sent
    pub frames_sent: u32,
    /// Transmits that failed or timed out
    pub tx_failures: u32,
    /// Receive line errors reported by the transport
    pub rx_faults: u32,
    /// Bytes dropped because the receive ring was full
    pub ring_overruns: u32,
    /// Frame detector counters
    pub detector: DetectorStats,
}

/// A framed serial link over one transport
///
/// `N` sizes the transmit buffer, the serialization scratch buffer and the
/// detector's accumulation buffer. Use
/// [`max_frame_len`](respira_protocol::max_frame_len) for the largest
/// payload the link must carry.
///
/// `R` is the receive ring size. The ring holds `R - 1` bytes and must
/// absorb everything that arrives while the caller holds a received message
/// or waits on a transmit; `2 * N + 1` holds two worst-case frames.
pub struct Session<'a, T, C, const N: usize, const R: usize> {
    transport: T,
    rx: RxConsumer<'a, R>,
    events: &'a LinkEvents,
    detector: FrameDetector<C, N>,
    config: LinkConfig,
    tx_buf: [u8; N],
    scratch: [u8; N],
    armed: bool,
    stats: LinkStats,
    last_overruns: u32,
}

impl<'a, T: Transport, C: Checksum, const N: usize, const R: usize>
    Session<'a, T, C, N, R>
{
    /// Create a session
    ///
    /// `rx` must be the consumer half of the ring the transport fills, and
    /// `events` the listener the transport reports to. Nothing touches the
    /// transport until the first send or receive.
    pub fn new(
        transport: T,
        rx: RxConsumer<'a, R>,
        events: &'a LinkEvents,
        config: LinkConfig,
    ) -> Self {
        Self {
            transport,
            rx,
            events,
            detector: FrameDetector::new(),
            config,
            tx_buf: [0; N],
            scratch: [0; N],
            armed: false,
            stats: LinkStats::default(),
            last_overruns: 0,
        }
    }

    /// Arm reception if it is not already running
    ///
    /// Called implicitly by every send and receive. Discards stale
    /// completions left over from before the session started.
    pub fn begin(&mut self) -> Result<(), LinkError<T::Error>> {
        if self.armed {
            return Ok(());
        }

        self.events.clear();
        self.detector.reset();
        self.arm()?;
        info!("Link started at {} baud", self.config.uart.baudrate);
        Ok(())
    }

    /// Frame and send `payload`, waiting for the transport to finish
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<(), LinkError<T::Error>> {
        let len = encode::<C>(payload, &mut self.tx_buf)?;
        self.transmit(len).await
    }

    /// Serialize `message` with postcard and send it as one frame
    pub async fn send_message<M: Serialize>(
        &mut self,
        message: &M,
    ) -> Result<(), LinkError<T::Error>> {
        let payload =
            postcard::to_slice(message, &mut self.scratch).map_err(|_| LinkError::Serialize)?;
        let len = encode::<C>(payload, &mut self.tx_buf)?;
        self.transmit(len).await
    }

    /// Wait for the next verified payload
    ///
    /// Frames that fail verification are dropped and waiting continues. If
    /// the inter-frame timeout expires after at least one rejection, the
    /// last rejection is returned instead of
    /// [`LinkError::ReceiveTimeout`].
    ///
    /// The returned message borrows the session; the detector starts on
    /// the next frame once it is dropped.
    pub async fn receive_payload(
        &mut self,
    ) -> Result<DecodedMessage<'_, C, N>, LinkError<T::Error>> {
        self.begin()?;

        let deadline = Instant::now() + self.config.inter_frame_timeout;
        let mut rejected: Option<FrameError> = None;

        loop {
            let drained = self.detector.drain(&mut self.rx);
            self.note_overruns();
            match drained {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    warn!("Frame rejected: {:?}", e);
                    rejected = Some(e);
                    continue;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match with_timeout(remaining, self.events.next_rx()).await {
                Ok(RxEvent::CharacterMatch) => {}
                Ok(RxEvent::Complete) | Ok(RxEvent::Error(RxErrorKind::Timeout)) => {
                    // Reception ended normally; keep listening
                    self.armed = false;
                    self.arm()?;
                }
                Ok(RxEvent::Error(kind)) => {
                    warn!("Receive fault: {:?}", kind);
                    self.armed = false;
                    self.stats.rx_faults = self.stats.rx_faults.saturating_add(1);
                    return Err(LinkError::RxFault(kind));
                }
                Err(_) => {
                    debug!(
                        "No frame within {} ms",
                        self.config.inter_frame_timeout.as_millis()
                    );
                    return Err(match rejected {
                        Some(e) => LinkError::Frame(e),
                        None => LinkError::ReceiveTimeout,
                    });
                }
            }
        }

        trace!("Received {} byte frame", self.detector.frame_length());
        self.detector.take_frame().ok_or(LinkError::ReceiveTimeout)
    }

    /// Receive one frame and deserialize its payload with postcard
    pub async fn receive_message<M: DeserializeOwned>(
        &mut self,
    ) -> Result<M, LinkError<T::Error>> {
        let message = self.receive_payload().await?;
        postcard::from_bytes(message.payload()).map_err(|_| LinkError::Deserialize)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            ring_overruns: self.rx.overruns(),
            detector: self.detector.stats(),
            ..self.stats
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn arm(&mut self) -> Result<(), LinkError<T::Error>> {
        self.transport
            .start_receive(&self.config.uart)
            .map_err(LinkError::Transport)?;
        self.armed = true;
        Ok(())
    }

    async fn transmit(&mut self, len: usize) -> Result<(), LinkError<T::Error>> {
        self.begin()?;

        let wire_time_us = self.config.uart.transfer_time_us(len);
        if wire_time_us > self.config.write_timeout.as_micros() {
            warn!(
                "{} byte frame needs {} us on the wire, longer than the write timeout",
                len,
                wire_time_us
            );
        }

        self.events.reset_tx();
        if let Err(e) = self.transport.start_transmit(&self.tx_buf[..len]) {
            self.count_tx_failure();
            return Err(LinkError::Transport(e));
        }

        match with_timeout(self.config.write_timeout, self.events.tx_outcome()).await {
            Ok(TxOutcome::Complete) => {
                trace!("Sent {} byte frame", len);
                self.stats.frames_sent = self.stats.frames_sent.saturating_add(1);
                Ok(())
            }
            Ok(TxOutcome::Failed) => {
                warn!("Transmit failed");
                self.count_tx_failure();
                Err(LinkError::TxFailed)
            }
            Err(_) => {
                warn!("Transmit timed out");
                self.count_tx_failure();
                Err(LinkError::WriteTimeout)
            }
        }
    }

    fn count_tx_failure(&mut self) {
        self.stats.tx_failures = self.stats.tx_failures.saturating_add(1);
    }

    fn note_overruns(&mut self) {
        let overruns = self.rx.overruns();
        if overruns != self.last_overruns {
            debug!(
                "Receive ring overrun, {} bytes dropped",
                overruns.wrapping_sub(self.last_overruns)
            );
            self.last_overruns = overruns;
        }
    }
}
