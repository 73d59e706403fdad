//! The peer lifecycle state machine: connection policy, framing dispatch,
//! and the version/verack/ping/pong control protocol.
//!
//! This crate is deliberately sans-I/O: it never opens a socket or sets a
//! timer itself. It calls out through the [`transport::Transport`] trait,
//! which a concrete reactor crate (`net-poll`) implements with real
//! non-blocking sockets, and which tests in this crate implement with an
//! in-memory stub.
#![warn(missing_docs)]

pub mod callbacks;
pub mod discovery;
pub mod error;
pub mod group;
pub mod peer;
pub mod transport;

pub use callbacks::Hooks;
pub use error::Error;
pub use group::Group;
pub use peer::{Peer, PeerId};
pub use transport::{Event, Transport};

#[cfg(test)]
mod tests;
