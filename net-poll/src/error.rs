use thiserror::Error;

/// Errors this crate's reactor can produce: constructing the poll instance,
/// and I/O failures surfaced to callers that aren't simply routed through
/// the peer state machine as [`iop_p2p::transport::Event::Error`].
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to construct the underlying poll instance or its waker.
    #[error("failed to initialize reactor: {0}")]
    Init(#[source] std::io::Error),

    /// The poll loop's wait call failed for a reason other than a timeout.
    #[error("reactor poll failed: {0}")]
    Poll(#[source] std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Poll(err)
    }
}
