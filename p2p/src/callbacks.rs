//! Optional upper-layer callback slots.
//!
//! Each slot is a boxed closure rather than a raw context pointer; this is
//! the idiomatic expression of the opaque-callback-context design note
//! (closures capture whatever state the caller needs, and the core makes no
//! assumption about pointer stability beyond the group's own lifetime).
use std::sync::Arc;

use iop_common::wire::MessageHeader;

use crate::peer::Peer;

/// Callback invoked before built-in dispatch for every decoded message.
/// Returning `false` skips the core's own handling of `version`/`verack`/`ping`.
pub type ParseCmdHook = Arc<dyn Fn(&Peer, &MessageHeader, &[u8]) -> bool + Send + Sync>;

/// Callback invoked after dispatch (built-in or not) for every decoded message.
pub type PostCmdHook = Arc<dyn Fn(&Peer, &MessageHeader, &[u8]) + Send + Sync>;

/// Callback invoked whenever a peer's state changes.
pub type ConnectionStateChangedHook = Arc<dyn Fn(&Peer) + Send + Sync>;

/// Callback consulted before the pool top-up policy runs after an error.
/// Returning `false` suppresses automatic reconnection for this event.
pub type ShouldConnectMoreHook = Arc<dyn Fn(&Peer) -> bool + Send + Sync>;

/// Callback invoked exactly once per peer, when its handshake completes.
pub type HandshakeDoneHook = Arc<dyn Fn(&Peer) + Send + Sync>;

/// Callback invoked on every periodic tick, before timeout/ping enforcement.
/// Returning `false` short-circuits the rest of that peer's tick.
pub type PeriodicTickHook = Arc<dyn Fn(&Peer) -> bool + Send + Sync>;

/// Callback used to forward a log line; defaults to forwarding into the `log` facade.
pub type LogWriteHook = Arc<dyn Fn(&str) + Send + Sync>;

/// The full set of optional callback slots a [`crate::group::Group`] may have registered.
#[derive(Clone, Default)]
pub struct Hooks {
    /// See [`ParseCmdHook`].
    pub parse_cmd: Option<ParseCmdHook>,
    /// See [`PostCmdHook`].
    pub postcmd: Option<PostCmdHook>,
    /// See [`ConnectionStateChangedHook`].
    pub connection_state_changed: Option<ConnectionStateChangedHook>,
    /// See [`ShouldConnectMoreHook`].
    pub should_connect_more: Option<ShouldConnectMoreHook>,
    /// See [`HandshakeDoneHook`].
    pub handshake_done: Option<HandshakeDoneHook>,
    /// See [`PeriodicTickHook`].
    pub periodic_tick: Option<PeriodicTickHook>,
    /// See [`LogWriteHook`].
    pub log_write: Option<LogWriteHook>,
}

impl Hooks {
    fn log(&self, line: &str) {
        if let Some(hook) = &self.log_write {
            hook(line);
        } else {
            log::debug!("{line}");
        }
    }

    pub(crate) fn fire_connection_state_changed(&self, peer: &Peer) {
        if let Some(hook) = &self.connection_state_changed {
            hook(peer);
        }
        self.log(&format!("peer {} state -> {:?}", peer.id, peer.state));
    }

    pub(crate) fn fire_handshake_done(&self, peer: &Peer) {
        if let Some(hook) = &self.handshake_done {
            hook(peer);
        }
        self.log(&format!("peer {} handshake complete", peer.id));
    }

    pub(crate) fn should_connect_more(&self, peer: &Peer) -> bool {
        self.should_connect_more.as_ref().map_or(true, |hook| hook(peer))
    }

    pub(crate) fn periodic_tick(&self, peer: &Peer) -> bool {
        self.periodic_tick.as_ref().map_or(true, |hook| hook(peer))
    }

    pub(crate) fn parse_cmd(&self, peer: &Peer, header: &MessageHeader, payload: &[u8]) -> bool {
        self.parse_cmd.as_ref().map_or(true, |hook| hook(peer, header, payload))
    }

    pub(crate) fn fire_postcmd(&self, peer: &Peer, header: &MessageHeader, payload: &[u8]) {
        if let Some(hook) = &self.postcmd {
            hook(peer, header, payload);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
