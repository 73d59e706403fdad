//! A single logical connection to a remote node.
use std::net::SocketAddr;

use iop_common::{PeerState, ServiceFlags};
use iop_net::LocalTime;

/// Stable, 1-based identifier assigned at insertion into a [`crate::group::Group`].
///
/// Used as the back-reference from a peer to its owning group's bookkeeping
/// rather than a strong handle, matching the non-owning `group_ref` relation
/// described for this entity.
pub type PeerId = usize;

/// One remote endpoint and everything the core tracks about it.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Stable identifier, assigned sequentially starting at 1.
    pub id: PeerId,
    /// Resolved socket address.
    pub addr: SocketAddr,
    /// Current lifecycle state.
    pub state: PeerState,
    /// Bytes received but not yet fully framed into a message.
    pub recv_buf: Vec<u8>,
    /// When the current connect attempt began; `None` when not connecting.
    pub time_started_con: Option<LocalTime>,
    /// When we last sent a `ping`.
    pub last_ping: Option<LocalTime>,
    /// Reserved for upper-layer request tracking; unused by this core.
    pub time_last_request: Option<LocalTime>,
    /// Set once a `verack` has been received.
    pub version_handshake: bool,
    /// The nonce the remote advertised in its `version` message.
    pub nonce: u64,
    /// Services the remote advertised.
    pub services: ServiceFlags,
    /// Chain height the remote reported in its `version` message.
    pub best_known_height: i32,
    /// User agent string the remote reported.
    pub user_agent: String,
    /// 32-byte slot reserved for upper-layer inventory tracking; zeroed at creation.
    pub last_requested_inv: [u8; 32],
}

impl Peer {
    /// Construct a fresh peer in the empty (not yet connecting) state.
    pub fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            state: PeerState::empty(),
            recv_buf: Vec::new(),
            time_started_con: None,
            last_ping: None,
            time_last_request: None,
            version_handshake: false,
            nonce: 0,
            services: ServiceFlags::empty(),
            best_known_height: 0,
            user_agent: String::new(),
            last_requested_inv: [0u8; 32],
        }
    }

    /// True if this peer is neither connecting, connected, nor in a terminal state.
    pub fn is_eligible_for_connect(&self) -> bool {
        self.state.is_eligible_for_connect()
    }
}
