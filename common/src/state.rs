//! Peer lifecycle state, represented as a bitset so a peer may hold several
//! flags at once (e.g. `CONNECTED | MISBEHAVED` while it is being torn down).
use bitflags::bitflags;

bitflags! {
    /// The lifecycle state of a single peer.
    ///
    /// `CONNECTING` and `CONNECTED` are mutually exclusive by construction:
    /// every transition helper in this crate clears one before setting the
    /// other. Once any terminal flag (`ERRORED`, `DISCONNECTED`,
    /// `MISBEHAVED`) is set, a peer never re-enters `CONNECTING` within the
    /// same lifetime.
    #[derive(Default)]
    pub struct PeerState: u16 {
        /// A non-blocking connect is in flight.
        const CONNECTING = 1 << 0;
        /// The TCP connection is established.
        const CONNECTED = 1 << 1;
        /// We tore the connection down voluntarily.
        const DISCONNECTED = 1 << 2;
        /// The remote end closed the connection.
        const DISCONNECTED_FROM_REMOTE = 1 << 3;
        /// A socket or protocol error occurred.
        const ERRORED = 1 << 4;
        /// The connect attempt exceeded the configured timeout.
        const TIMEOUT = 1 << 5;
        /// The remote violated the wire protocol.
        const MISBEHAVED = 1 << 6;
    }
}

impl PeerState {
    /// True once any flag marking the peer as permanently done is set.
    ///
    /// A terminal peer has already released its socket and timer and will
    /// not be selected by the connection policy again.
    pub fn is_terminal(&self) -> bool {
        self.intersects(Self::ERRORED | Self::DISCONNECTED | Self::MISBEHAVED)
    }

    /// True if the peer is neither connecting, connected, nor terminal —
    /// i.e. eligible to be picked up by the connection policy.
    pub fn is_eligible_for_connect(&self) -> bool {
        !self.intersects(Self::CONNECTED | Self::CONNECTING | Self::DISCONNECTED | Self::ERRORED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_flags() {
        assert!(PeerState::ERRORED.is_terminal());
        assert!(PeerState::DISCONNECTED.is_terminal());
        assert!(PeerState::MISBEHAVED.is_terminal());
        assert!(!PeerState::CONNECTED.is_terminal());
        assert!(!PeerState::CONNECTING.is_terminal());
    }

    #[test]
    fn fresh_peer_is_eligible() {
        assert!(PeerState::empty().is_eligible_for_connect());
        assert!(!PeerState::CONNECTING.is_eligible_for_connect());
        assert!(!(PeerState::CONNECTED | PeerState::MISBEHAVED).is_eligible_for_connect());
    }

    #[test]
    fn connecting_and_connected_can_be_queried_independently() {
        let both = PeerState::CONNECTING | PeerState::CONNECTED;
        assert!(both.contains(PeerState::CONNECTING));
        assert!(both.contains(PeerState::CONNECTED));
    }
}
