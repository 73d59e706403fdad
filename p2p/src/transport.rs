//! The narrow I/O surface the state machine calls into.
//!
//! This is the "sans-I/O" boundary described in the design notes: [`Group`]
//! never touches a raw socket or OS timer. It only ever calls through a
//! [`Transport`], which the `net-poll` crate implements concretely with
//! real non-blocking sockets and a `popol`-driven timeout manager. Tests in
//! this crate implement `Transport` with an in-memory stub instead.
//!
//! [`Group`]: crate::group::Group
use std::net::SocketAddr;

use iop_net::LocalTime;

use crate::peer::PeerId;

/// Concrete I/O operations the peer group state machine requires.
pub trait Transport {
    /// The transport's own error type, surfaced back through [`crate::Error`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin a non-blocking connect to `addr` on behalf of `peer`.
    fn connect(&mut self, peer: PeerId, addr: SocketAddr) -> Result<(), Self::Error>;

    /// Queue `bytes` for non-blocking write to `peer`. No-op if the peer is
    /// not currently connected; the caller (the [`crate::group::Group`]) is
    /// responsible for checking state before calling this.
    fn write(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Tear down the socket associated with `peer`, if any.
    fn disconnect(&mut self, peer: PeerId);

    /// Register (or replace) a wake-up for `peer` at `at`.
    fn schedule_wake(&mut self, peer: PeerId, at: LocalTime);

    /// Cancel any pending wake-up for `peer`.
    fn cancel_wake(&mut self, peer: PeerId);
}

/// Events the transport feeds into the state machine.
///
/// Produced by a concrete reactor (or, in tests, pushed directly) and
/// consumed one at a time by [`crate::group::Group::handle_event`].
#[derive(Debug, Clone)]
pub enum Event {
    /// A connect attempt for `peer` completed successfully.
    Connected(PeerId),
    /// New bytes were read from `peer` and should be appended to its receive buffer.
    Readable(PeerId, Vec<u8>),
    /// The remote end of `peer`'s connection closed cleanly.
    Eof(PeerId),
    /// An I/O error occurred on `peer`'s connection (including a failed connect).
    Error(PeerId),
    /// `peer`'s scheduled wake-up fired.
    Timer(PeerId),
}
