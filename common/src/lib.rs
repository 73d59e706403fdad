//! Wire types and chain parameters shared by the protocol and reactor crates.
//!
//! This crate has no socket or event-loop dependencies of its own: it is the
//! types-and-codec layer the `p2p` state machine and the `net-poll` reactor
//! both build on, kept separate so the framing codec can be fuzzed and
//! unit-tested in complete isolation.
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod network;
pub mod state;
pub mod wire;

pub use error::{ConfigError, DecodeError};
pub use message::{NetAddr, Nonce, ServiceFlags, VersionMessage};
pub use network::{ChainParams, Network};
pub use state::PeerState;
