use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use iop_common::message::{NetAddr, Nonce, ServiceFlags, VersionMessage, CMD_PING, CMD_PONG, CMD_VERACK, CMD_VERSION};
use iop_common::wire;
use iop_common::{ChainParams, PeerState};
use iop_net::LocalTime;

use crate::callbacks::Hooks;
use crate::group::{Group, CONNECT_TIMEOUT_S, PERIODIC_TIMER_S, PING_INTERVAL_S};
use crate::peer::PeerId;
use crate::transport::{Event, Transport};

#[derive(Default)]
struct StubTransport {
    connects: Vec<(PeerId, SocketAddr)>,
    writes: HashMap<PeerId, Vec<Vec<u8>>>,
    disconnects: Vec<PeerId>,
    wakes: HashMap<PeerId, LocalTime>,
    fail_connect: bool,
}

impl StubTransport {
    fn sent_commands(&self, id: PeerId) -> Vec<String> {
        self.writes
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|bytes| wire::try_decode_header(bytes).ok().flatten())
            .map(|h| h.command)
            .collect()
    }
}

impl Transport for StubTransport {
    type Error = std::io::Error;

    fn connect(&mut self, peer: PeerId, addr: SocketAddr) -> Result<(), Self::Error> {
        self.connects.push((peer, addr));
        if self.fail_connect {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "refused"));
        }
        Ok(())
    }

    fn write(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error> {
        self.writes.entry(peer).or_default().push(bytes.to_vec());
        Ok(())
    }

    fn disconnect(&mut self, peer: PeerId) {
        self.disconnects.push(peer);
    }

    fn schedule_wake(&mut self, peer: PeerId, at: LocalTime) {
        self.wakes.insert(peer, at);
    }

    fn cancel_wake(&mut self, peer: PeerId) {
        self.wakes.remove(&peer);
    }
}

const MAGIC: u32 = 0xF9BE_B4D9;

fn addr(n: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, n)), 18333)
}

fn params() -> ChainParams {
    ChainParams {
        magic: MAGIC,
        default_port: 18333,
        dns_seeds: vec![],
    }
}

fn remote_version(nonce: u64, services: ServiceFlags, start_height: i32, user_agent: &str) -> Vec<u8> {
    let msg = VersionMessage {
        version: 70015,
        services,
        timestamp: 0,
        receiver: NetAddr::new(addr(1), ServiceFlags::empty()),
        sender: NetAddr::new(addr(2), services),
        nonce,
        user_agent: user_agent.to_string(),
        start_height,
        relay: true,
    };
    wire::encode_message(MAGIC, CMD_VERSION, &msg.encode()).unwrap()
}

fn connect_one(group: &mut Group, transport: &mut StubTransport, now: LocalTime) -> PeerId {
    let id = group.add_peer_by_address(addr(1));
    group.connect_next_nodes(transport, now);
    group.handle_event(transport, Event::Connected(id), now);
    id
}

#[test]
fn state_exclusivity() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    let peer = group.peers().iter().find(|p| p.id == id).unwrap();

    assert!(peer.state.contains(PeerState::CONNECTED));
    assert!(!peer.state.contains(PeerState::CONNECTING));
}

#[test]
fn reconnect_invariant_releases_socket_and_timer_on_error() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = group.add_peer_by_address(addr(1));
    group.connect_next_nodes(&mut transport, t0);
    group.handle_event(&mut transport, Event::Error(id), t0);

    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.state.contains(PeerState::ERRORED));
    assert!(!peer.state.contains(PeerState::TIMEOUT), "plain connect error is not a timeout");
    assert!(transport.disconnects.contains(&id));
    assert!(!transport.wakes.contains_key(&id));
}

#[test]
fn ping_cadence_fires_within_window() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    let version = remote_version(1, ServiceFlags::NODE_NETWORK, 100, "/ua/");
    group.handle_event(&mut transport, Event::Readable(id, version), t0);
    let verack = wire::encode_message(MAGIC, CMD_VERACK, &[]).unwrap();
    group.handle_event(&mut transport, Event::Readable(id, verack), t0);

    let t1 = t0 + iop_net::LocalDuration::from_secs(PING_INTERVAL_S + 1);
    group.handle_event(&mut transport, Event::Timer(id), t1);

    assert!(transport.sent_commands(id).contains(&CMD_PING.to_string()));
}

#[test]
fn connect_timeout_marks_errored_and_timed_out() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = group.add_peer_by_address(addr(1));
    group.connect_next_nodes(&mut transport, t0);

    let t1 = t0 + iop_net::LocalDuration::from_secs(CONNECT_TIMEOUT_S + 1);
    group.handle_event(&mut transport, Event::Timer(id), t1);

    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.state.contains(PeerState::ERRORED));
    assert!(peer.state.contains(PeerState::TIMEOUT));
}

#[test]
fn misbehavior_trigger_on_oversized_length() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);

    let mut header = Vec::new();
    header.extend_from_slice(&MAGIC.to_le_bytes());
    header.extend_from_slice(b"junk\0\0\0\0\0\0\0\0");
    header.extend_from_slice(&(wire::MAX_MESSAGE_SIZE + 1).to_le_bytes());
    header.extend_from_slice(&[0u8; 4]);

    group.handle_event(&mut transport, Event::Readable(id, header), t0);

    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.state.contains(PeerState::MISBEHAVED));
    assert!(peer.recv_buf.is_empty());
}

#[test]
fn pool_top_up_reaches_desired_connected_and_no_further() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let ids: Vec<PeerId> = (1..=5).map(|n| group.add_peer_by_address(addr(n))).collect();
    group.connect_next_nodes(&mut transport, t0);
    for &id in &ids {
        if transport.connects.iter().any(|(pid, _)| *pid == id) {
            group.handle_event(&mut transport, Event::Connected(id), t0);
        }
    }

    assert_eq!(group.count_in_state(PeerState::CONNECTED), 3);
}

#[test]
fn handshake_scenario() {
    let mut group = Group::new(params(), "libiop 0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    assert!(transport.sent_commands(id).contains(&CMD_VERSION.to_string()));

    let version = remote_version(77, ServiceFlags::NODE_NETWORK, 100, "/ua/");
    group.handle_event(&mut transport, Event::Readable(id, version), t0);
    assert!(transport.sent_commands(id).contains(&CMD_VERACK.to_string()));

    {
        let peer = group.peers().iter().find(|p| p.id == id).unwrap();
        assert_eq!(peer.best_known_height, 100);
        assert!(!peer.version_handshake);
    }

    let handshake_fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = handshake_fired.clone();
    let mut hooks = Hooks::default();
    hooks.handshake_done = Some(std::sync::Arc::new(move |_peer| {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }));
    group.set_hooks(hooks);

    let verack = wire::encode_message(MAGIC, CMD_VERACK, &[]).unwrap();
    group.handle_event(&mut transport, Event::Readable(id, verack), t0);

    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.version_handshake);
    assert!(handshake_fired.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn ping_pong_scenario() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    let version = remote_version(1, ServiceFlags::NODE_NETWORK, 0, "");
    group.handle_event(&mut transport, Event::Readable(id, version), t0);
    let verack = wire::encode_message(MAGIC, CMD_VERACK, &[]).unwrap();
    group.handle_event(&mut transport, Event::Readable(id, verack), t0);

    let ping = wire::encode_message(MAGIC, CMD_PING, &Nonce(0xDEAD_BEEF).encode()).unwrap();
    group.handle_event(&mut transport, Event::Readable(id, ping), t0);

    let last_write = transport.writes.get(&id).unwrap().last().unwrap().clone();
    let header = wire::try_decode_header(&last_write).unwrap().unwrap();
    assert_eq!(header.command, CMD_PONG);
    let pong_payload = &last_write[wire::HEADER_LEN..];
    assert_eq!(Nonce::decode(pong_payload).unwrap(), Nonce(0xDEAD_BEEF));
}

#[test]
fn magic_mismatch_marks_misbehaved_and_releases_socket() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    let bad = wire::encode_message(0x0000_0000, CMD_VERSION, &[]).unwrap();
    group.handle_event(&mut transport, Event::Readable(id, bad), t0);

    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.state.contains(PeerState::MISBEHAVED));
    assert!(peer.state.contains(PeerState::DISCONNECTED));
    assert!(!peer.state.contains(PeerState::CONNECTED), "released peer must not still count as connected");
    assert!(!peer.state.contains(PeerState::CONNECTING));
    assert!(transport.disconnects.contains(&id));
    assert_eq!(group.count_in_state(PeerState::CONNECTED), 0);
}

#[test]
fn partial_frames_reassemble_into_one_dispatch() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let id = connect_one(&mut group, &mut transport, t0);
    let payload = vec![7u8; 72];
    let full = wire::encode_message(MAGIC, CMD_PONG, &payload).unwrap();

    let mut hooks = Hooks::default();
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let count_clone = count.clone();
    hooks.postcmd = Some(std::sync::Arc::new(move |_peer, _header, _payload| {
        count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }));
    group.set_hooks(hooks);

    // Feed the message in irregular chunks that sum to its full length.
    let mut offset = 0;
    for len in [5usize, 1, 10, 78, 2] {
        let end = (offset + len).min(full.len());
        group.handle_event(&mut transport, Event::Readable(id, full[offset..end].to_vec()), t0);
        offset = end;
    }

    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    let peer = group.peers().iter().find(|p| p.id == id).unwrap();
    assert!(peer.recv_buf.is_empty());
}

#[test]
fn discovery_from_list_produces_two_peers_and_drops_malformed() {
    let mut group = Group::new(params(), "test/0.1");
    let attempted = group
        .add_peers_from_seed(Some("127.0.0.1:18333, 10.0.0.1:18333, not-an-address"))
        .unwrap();

    assert!(attempted);
    assert_eq!(group.peers().len(), 2);
}

#[test]
fn graceful_shutdown_disconnects_all_connected_peers() {
    let mut group = Group::new(params(), "test/0.1");
    let mut transport = StubTransport::default();
    let t0 = LocalTime::from_secs(0);

    let ids: Vec<PeerId> = (1..=3)
        .map(|n| group.add_peer_by_address(addr(n)))
        .collect();
    group.connect_next_nodes(&mut transport, t0);
    for &id in &ids {
        group.handle_event(&mut transport, Event::Connected(id), t0);
    }
    assert_eq!(group.count_in_state(PeerState::CONNECTED), 3);

    group.shutdown(&mut transport);

    for &id in &ids {
        let peer = group.peers().iter().find(|p| p.id == id).unwrap();
        assert!(peer.state.contains(PeerState::DISCONNECTED));
    }
    assert!(group.is_shutting_down());
}
