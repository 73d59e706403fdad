//! The peer group: owns the peer collection, the connection policy, and the
//! framing/dispatch loop. Never touches a socket directly — all I/O goes
//! through a [`Transport`] passed into each call.
use std::net::SocketAddr;

use iop_common::message::{NetAddr, Nonce, ServiceFlags, VersionMessage, CMD_PING, CMD_PONG, CMD_VERACK, CMD_VERSION};
use iop_common::wire::{self, MessageHeader};
use iop_common::{ChainParams, PeerState};
use iop_net::LocalTime;

use crate::callbacks::Hooks;
use crate::discovery::{parse_address_list, resolve_dns_seed};
use crate::error::Error;
use crate::peer::{Peer, PeerId};
use crate::transport::{Event, Transport};

/// Protocol version advertised in outbound `version` messages.
pub const PROTOCOL_VERSION: i32 = 70015;
/// Lowest remote protocol version this core will still talk to.
pub const MIN_PROTOCOL_VERSION: i32 = 70001;
/// Default number of simultaneously `CONNECTED` peers the pool maintains.
pub const DEFAULT_DESIRED_CONNECTED: usize = 3;
/// Seconds a connect attempt is allowed to remain `CONNECTING` before timing out.
pub const CONNECT_TIMEOUT_S: u64 = 10;
/// Seconds between outbound pings once a peer has completed its handshake.
pub const PING_INTERVAL_S: u64 = 180;
/// Seconds between periodic ticks for every peer.
pub const PERIODIC_TIMER_S: u64 = 3;

/// Owns the ordered peer collection, chain parameters, connection policy and
/// upper-layer callback slots for one P2P session.
pub struct Group {
    chainparams: ChainParams,
    client_str: String,
    desired_connected: usize,
    peers: Vec<Peer>,
    hooks: Hooks,
    shutting_down: bool,
}

impl Group {
    /// Create an empty group for the given chain parameters.
    pub fn new(chainparams: ChainParams, client_str: impl Into<String>) -> Self {
        Self {
            chainparams,
            client_str: client_str.into(),
            desired_connected: DEFAULT_DESIRED_CONNECTED,
            peers: Vec::new(),
            hooks: Hooks::default(),
            shutting_down: false,
        }
    }

    /// Override the target count of simultaneously `CONNECTED` peers.
    pub fn set_desired_connected(&mut self, n: usize) {
        self.desired_connected = n;
    }

    /// Install the callback hooks for this group.
    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }

    /// Read-only access to the current peer collection, in insertion order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// The chain parameters this group was created with.
    pub fn chainparams(&self) -> &ChainParams {
        &self.chainparams
    }

    /// Number of peers whose state intersects `mask`.
    pub fn count_in_state(&self, mask: PeerState) -> usize {
        self.peers.iter().filter(|p| p.state.intersects(mask)).count()
    }

    fn next_peer_id(&self) -> PeerId {
        self.peers.len() + 1
    }

    /// Append one peer at the given address. Returns its assigned id.
    pub fn add_peer_by_address(&mut self, addr: SocketAddr) -> PeerId {
        let id = self.next_peer_id();
        self.peers.push(Peer::new(id, addr));
        id
    }

    /// Parse `"host:port"` and append a peer at that address.
    pub fn add_peer_by_address_str(&mut self, address: &str) -> Result<PeerId, Error> {
        use std::net::ToSocketAddrs;

        let addr = address
            .to_socket_addrs()
            .ok()
            .and_then(|mut it| it.next())
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

        Ok(self.add_peer_by_address(addr))
    }

    /// Discover peers: from an explicit comma-separated `host:port` list if
    /// `ips` is `Some`, otherwise by resolving the chain's first DNS seed.
    ///
    /// Returns whether at least one seed/address was attempted; individual
    /// malformed entries are dropped silently.
    pub fn add_peers_from_seed(&mut self, ips: Option<&str>) -> Result<bool, Error> {
        let addrs = match ips {
            Some(list) => parse_address_list(list),
            None => resolve_dns_seed(&self.chainparams)?,
        };

        let attempted = !addrs.is_empty();
        for addr in addrs {
            self.add_peer_by_address(addr);
        }
        Ok(attempted)
    }

    /// Launch connects for eligible peers until `desired_connected` are
    /// either connected or in flight, capped at `3 * deficit` attempts per call.
    ///
    /// Returns `true` if at least one connect was initiated or the deficit
    /// was already zero; `false` if the deficit is positive but no eligible
    /// candidate remains (the caller may wish to trigger rediscovery).
    pub fn connect_next_nodes<T: Transport>(&mut self, transport: &mut T, now: LocalTime) -> bool {
        let target = self.desired_connected.min(self.peers.len());
        let mut in_flight = self.count_in_state(PeerState::CONNECTED | PeerState::CONNECTING);
        if in_flight >= target {
            return true;
        }
        let deficit = target - in_flight;
        let cap = deficit * 3;

        let eligible: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|p| p.is_eligible_for_connect())
            .map(|p| p.id)
            .collect();

        let mut launched = 0;
        let mut attempts = 0;
        for id in eligible {
            if in_flight >= target || attempts >= cap {
                break;
            }
            attempts += 1;

            let addr = match self.peer_mut(id) {
                Some(peer) => {
                    peer.state |= PeerState::CONNECTING;
                    peer.time_started_con = Some(now);
                    peer.addr
                }
                None => continue,
            };

            if transport.connect(id, addr).is_ok() {
                transport.schedule_wake(id, now + iop_net::LocalDuration::from_secs(PERIODIC_TIMER_S));
                launched += 1;
                in_flight += 1;
            } else if let Some(peer) = self.peer_mut(id) {
                peer.state.remove(PeerState::CONNECTING);
                peer.state.insert(PeerState::ERRORED);
                peer.time_started_con = None;
            }
        }

        launched > 0 || deficit == 0
    }

    fn peer_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.id == id)
    }

    fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Feed one transport-level event into the state machine.
    pub fn handle_event<T: Transport>(&mut self, transport: &mut T, event: Event, now: LocalTime) {
        match event {
            Event::Connected(id) => self.on_connected(transport, id),
            Event::Readable(id, bytes) => self.on_readable(transport, id, bytes),
            Event::Eof(id) => self.on_disconnected(transport, id, true),
            Event::Error(id) => self.on_disconnected(transport, id, false),
            Event::Timer(id) => self.on_timer(transport, id, now),
        }
    }

    fn transition(&mut self, id: PeerId, new_state: PeerState) {
        if let Some(peer) = self.peer_mut(id) {
            peer.state = new_state;
        }
    }

    fn on_connected<T: Transport>(&mut self, transport: &mut T, id: PeerId) {
        self.transition(id, PeerState::CONNECTED);
        if let Some(peer) = self.peer(id).cloned() {
            self.hooks.fire_connection_state_changed(&peer);
            self.send_version(transport, id);
        }
    }

    fn on_disconnected<T: Transport>(&mut self, transport: &mut T, id: PeerId, remote_eof: bool) {
        let new_state = PeerState::ERRORED
            | if remote_eof {
                PeerState::DISCONNECTED_FROM_REMOTE
            } else {
                PeerState::DISCONNECTED
            };
        self.release_peer(transport, id, new_state);
    }

    /// Release a peer's socket/timer and move it to a terminal state,
    /// firing the state-changed hook and considering a pool top-up.
    fn release_peer<T: Transport>(&mut self, transport: &mut T, id: PeerId, new_state: PeerState) {
        transport.disconnect(id);
        transport.cancel_wake(id);
        self.transition(id, new_state);

        if let Some(peer) = self.peer(id).cloned() {
            self.hooks.fire_connection_state_changed(&peer);
            if new_state.contains(PeerState::ERRORED) && self.hooks.should_connect_more(&peer) {
                self.connect_next_nodes(transport, LocalTime::now());
            }
        }
    }

    fn on_timer<T: Transport>(&mut self, transport: &mut T, id: PeerId, now: LocalTime) {
        let peer = match self.peer(id).cloned() {
            Some(p) => p,
            None => return,
        };

        if !self.hooks.periodic_tick(&peer) {
            transport.schedule_wake(id, now + iop_net::LocalDuration::from_secs(PERIODIC_TIMER_S));
            return;
        }

        if peer.state.contains(PeerState::CONNECTING) {
            let started = peer.time_started_con.unwrap_or(now);
            if now.duration_since(started).as_secs() > CONNECT_TIMEOUT_S {
                self.release_peer(transport, id, PeerState::ERRORED | PeerState::TIMEOUT);
                return;
            }
        }

        if peer.version_handshake {
            let due = peer
                .last_ping
                .map(|t| now.duration_since(t).as_secs() >= PING_INTERVAL_S)
                .unwrap_or(true);
            if due {
                self.send_ping(transport, id, now);
            }
        }

        transport.schedule_wake(id, now + iop_net::LocalDuration::from_secs(PERIODIC_TIMER_S));
    }

    fn on_readable<T: Transport>(&mut self, transport: &mut T, id: PeerId, bytes: Vec<u8>) {
        if let Some(peer) = self.peer_mut(id) {
            peer.recv_buf.extend_from_slice(&bytes);
        } else {
            return;
        }

        loop {
            let still_connected = self.peer(id).map(|p| p.state.contains(PeerState::CONNECTED)).unwrap_or(false);
            if !still_connected {
                break;
            }

            let buf_len = self.peer(id).map(|p| p.recv_buf.len()).unwrap_or(0);
            let header = match self.peer(id).and_then(|p| wire::try_decode_header(&p.recv_buf).ok().flatten()) {
                Some(h) => h,
                None => break,
            };

            if header.data_len > wire::MAX_MESSAGE_SIZE {
                self.mark_misbehaved(transport, id);
                break;
            }

            let total = wire::HEADER_LEN + header.data_len as usize;
            if buf_len < total {
                break;
            }

            let payload = self
                .peer(id)
                .map(|p| p.recv_buf[wire::HEADER_LEN..total].to_vec())
                .unwrap_or_default();

            if let Some(peer) = self.peer_mut(id) {
                peer.recv_buf.drain(0..total);
            }

            self.dispatch(transport, id, header, payload);
        }
    }

    fn mark_misbehaved<T: Transport>(&mut self, transport: &mut T, id: PeerId) {
        if let Some(peer) = self.peer_mut(id) {
            peer.state.insert(PeerState::MISBEHAVED);
            peer.recv_buf.clear();
        }
        if let Some(peer) = self.peer(id).cloned() {
            self.hooks.fire_connection_state_changed(&peer);
            if peer.state.intersects(PeerState::CONNECTED | PeerState::CONNECTING) {
                let new_state = (peer.state & !(PeerState::CONNECTING | PeerState::CONNECTED)) | PeerState::DISCONNECTED;
                self.release_peer(transport, id, new_state);
            }
        }
    }

    fn dispatch<T: Transport>(&mut self, transport: &mut T, id: PeerId, header: MessageHeader, payload: Vec<u8>) {
        if header.magic != self.chainparams.magic {
            self.mark_misbehaved(transport, id);
            return;
        }

        let peer_snapshot = match self.peer(id).cloned() {
            Some(p) => p,
            None => return,
        };

        let handled_internally = if self.hooks.parse_cmd(&peer_snapshot, &header, &payload) {
            match header.command.as_str() {
                CMD_VERSION => self.handle_version(transport, id, &payload),
                CMD_VERACK => self.handle_verack(id),
                CMD_PING => self.handle_ping(transport, id, &payload),
                _ => {}
            }
            true
        } else {
            false
        };
        let _ = handled_internally;

        if let Some(peer) = self.peer(id).cloned() {
            self.hooks.fire_postcmd(&peer, &header, &payload);
        }
    }

    fn handle_version<T: Transport>(&mut self, transport: &mut T, id: PeerId, payload: &[u8]) {
        let version = match VersionMessage::decode(payload) {
            Ok(v) => v,
            Err(_) => {
                self.mark_misbehaved(transport, id);
                return;
            }
        };

        if !version.services.contains(ServiceFlags::NODE_NETWORK) {
            if let Some(peer) = self.peer(id).cloned() {
                self.send_verack(transport, id);
                let new_state = (peer.state & !(PeerState::CONNECTING | PeerState::CONNECTED)) | PeerState::DISCONNECTED;
                self.release_peer(transport, id, new_state);
            }
            return;
        }

        if let Some(peer) = self.peer_mut(id) {
            peer.nonce = version.nonce;
            peer.services = version.services;
            peer.best_known_height = version.start_height;
            peer.user_agent = version.user_agent;
        }

        self.send_verack(transport, id);
    }

    fn handle_verack(&mut self, id: PeerId) {
        if let Some(peer) = self.peer_mut(id) {
            peer.version_handshake = true;
        }
        if let Some(peer) = self.peer(id).cloned() {
            self.hooks.fire_handshake_done(&peer);
        }
    }

    fn handle_ping<T: Transport>(&mut self, transport: &mut T, id: PeerId, payload: &[u8]) {
        match Nonce::decode(payload) {
            Ok(nonce) => self.send(transport, id, CMD_PONG, &nonce.encode()),
            Err(_) => self.mark_misbehaved(transport, id),
        }
    }

    fn send_version<T: Transport>(&mut self, transport: &mut T, id: PeerId) {
        let peer = match self.peer(id) {
            Some(p) => p,
            None => return,
        };
        let addr = peer.addr;

        let msg = VersionMessage {
            version: PROTOCOL_VERSION,
            services: ServiceFlags::empty(),
            timestamp: LocalTime::now().as_secs() as i64,
            receiver: NetAddr::new(addr, ServiceFlags::empty()),
            sender: NetAddr::new(addr, ServiceFlags::empty()),
            nonce: fastrand::u64(..),
            user_agent: self.client_str.clone(),
            start_height: 0,
            relay: true,
        };
        self.send(transport, id, CMD_VERSION, &msg.encode());
    }

    fn send_verack<T: Transport>(&mut self, transport: &mut T, id: PeerId) {
        self.send(transport, id, CMD_VERACK, &[]);
    }

    fn send_ping<T: Transport>(&mut self, transport: &mut T, id: PeerId, now: LocalTime) {
        let nonce = Nonce(fastrand::u64(..));
        self.send(transport, id, CMD_PING, &nonce.encode());
        if let Some(peer) = self.peer_mut(id) {
            peer.last_ping = Some(now);
        }
    }

    /// Encode and send `command` with `payload` to `peer`, if it is
    /// currently connected. No-op (per the public `peer_send` contract)
    /// otherwise.
    pub fn send<T: Transport>(&mut self, transport: &mut T, id: PeerId, command: &str, payload: &[u8]) {
        let connected = self.peer(id).map(|p| p.state.contains(PeerState::CONNECTED)).unwrap_or(false);
        if !connected {
            return;
        }
        if let Ok(bytes) = wire::encode_message(self.chainparams.magic, command, payload) {
            let _ = transport.write(id, &bytes);
        }
    }

    /// Disconnect every peer and mark the group as shut down. Safe to call
    /// from within a callback already running on the event loop.
    pub fn shutdown<T: Transport>(&mut self, transport: &mut T) {
        self.shutting_down = true;
        let ids: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|p| p.state.intersects(PeerState::CONNECTED | PeerState::CONNECTING))
            .map(|p| p.id)
            .collect();

        for id in ids {
            self.release_peer(transport, id, PeerState::DISCONNECTED);
        }
    }

    /// Whether [`Group::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }
}
