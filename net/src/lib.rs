//! Foundational clock and disconnect types shared by the reactor and protocol crates.
//!
//! Kept dependency-light and reactor-agnostic so the `p2p` crate's state
//! machine can be unit-tested against a simulated clock without pulling in
//! any socket or polling machinery. This mirrors the role the upstream
//! `nakamoto-net` crate plays for the multi-crate Bitcoin client this
//! workspace's layout is modeled on.
#![warn(missing_docs)]

mod time;

pub use time::{LocalDuration, LocalTime};

use std::fmt;
use std::io;
use std::sync::Arc;

/// A source of the current time, abstracted so tests can supply a simulated clock.
pub trait Clock {
    /// Get the current local time.
    fn local_time(&self) -> LocalTime;
}

/// The system clock, backed by [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_time(&self) -> LocalTime {
        LocalTime::now()
    }
}

/// Reason a peer was disconnected, generic over a protocol-specific reason type.
#[derive(Debug, Clone)]
pub enum Disconnect<T> {
    /// The connection failed or was torn down at the I/O layer.
    ConnectionError(Arc<io::Error>),
    /// The remote end closed its side of the connection.
    ConnectionClosed,
    /// The protocol state machine asked to disconnect for an application-level reason.
    StateMachine(T),
}

impl<T> Disconnect<T> {
    /// True if the remote peer's TCP connection was closed, as opposed to us
    /// choosing to disconnect for a protocol-level reason.
    pub fn is_remote_close(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

impl<T: fmt::Display> fmt::Display for Disconnect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError(err) => write!(f, "connection error: {err}"),
            Self::ConnectionClosed => write!(f, "connection closed by remote"),
            Self::StateMachine(reason) => write!(f, "{reason}"),
        }
    }
}
