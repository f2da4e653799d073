//! Link errors

use respira_hal::RxErrorKind;
use respira_protocol::FrameError;

/// Errors returned by session send and receive calls
///
/// `E` is the transport's error type for starting an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// Encoding failed, or every frame seen before the deadline was rejected
    Frame(FrameError),
    /// The transport refused to start an operation
    Transport(E),
    /// The transport reported a failed transmit
    TxFailed,
    /// Transmit did not complete within the write timeout
    WriteTimeout,
    /// No frame arrived within the inter-frame timeout
    ReceiveTimeout,
    /// The transport stopped receiving on a line error
    RxFault(RxErrorKind),
    /// Message did not fit the payload buffer
    Serialize,
    /// Payload did not deserialize as the requested message
    Deserialize,
}

impl<E> From<FrameError> for LinkError<E> {
    fn from(e: FrameError) -> Self {
        LinkError::Frame(e)
    }
}

impl<E> LinkError<E> {
    /// True for either direction's timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::WriteTimeout | LinkError::ReceiveTimeout)
    }

    /// True for failures reported by the transport itself
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LinkError::Transport(_) | LinkError::TxFailed | LinkError::RxFault(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(LinkError::<()>::WriteTimeout.is_timeout());
        assert!(LinkError::<()>::ReceiveTimeout.is_timeout());
        assert!(!LinkError::<()>::TxFailed.is_timeout());

        assert!(LinkError::Transport(()).is_transport());
        assert!(LinkError::<()>::RxFault(RxErrorKind::Framing).is_transport());
        assert!(!LinkError::<()>::Frame(FrameError::ChecksumMismatch).is_transport());
    }

    #[test]
    fn test_from_frame_error() {
        let err: LinkError<()> = FrameError::BufferTooSmall.into();
        assert_eq!(err, LinkError::Frame(FrameError::BufferTooSmall));
    }
}
