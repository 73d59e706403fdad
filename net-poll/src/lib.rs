//! A `popol`-driven, single-threaded `poll(2)` reactor.
//!
//! This is the concrete [`Transport`] implementation the `p2p` crate's
//! sans-I/O state machine is designed to be driven by: one [`Reactor`] owns
//! one non-blocking [`std::net::TcpStream`] per connecting/connected peer,
//! registered with a `popol` readiness set, and turns readiness and timer
//! events into the [`Event`]s [`Group::handle_event`] expects.
//!
//! [`Group::handle_event`]: iop_p2p::Group::handle_event
#![warn(missing_docs)]

mod error;
mod timeout;

pub use error::Error;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use iop_net::LocalTime;
use iop_p2p::transport::{Event, Transport};
use iop_p2p::{Group, PeerId};

use timeout::TimeoutManager;

/// Largest single read drained from a socket per readiness notification.
const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Source {
    Peer(PeerId),
    Waker,
}

/// A command sent to a running [`Reactor`] from another thread.
enum Command {
    Shutdown,
}

/// One outcome of a [`Reactor::step`] cycle: either a transport [`Event`]
/// destined for a [`Group`], or a cross-thread shutdown request.
enum StepEvent {
    Peer(Event),
    Shutdown,
}

/// A cloneable, thread-safe reference to a running reactor, usable to
/// request shutdown from outside the event loop (e.g. a signal handler).
#[derive(Clone)]
pub struct Handle {
    commands: crossbeam_channel::Sender<Command>,
    waker: Arc<popol::Waker>,
}

impl Handle {
    /// Ask the reactor to shut down its group and return from [`Reactor::run`].
    pub fn shutdown(&self) -> io::Result<()> {
        let _ = self.commands.send(Command::Shutdown);
        self.waker.wake()
    }
}

/// Owns the sockets and readiness set backing one running [`Group`].
pub struct Reactor {
    sources: popol::Sources<Source>,
    connecting: HashMap<PeerId, Socket>,
    streams: HashMap<PeerId, TcpStream>,
    write_queues: HashMap<PeerId, Vec<u8>>,
    timeouts: TimeoutManager,
    waker: Arc<popol::Waker>,
    commands: crossbeam_channel::Receiver<Command>,
    command_tx: crossbeam_channel::Sender<Command>,
}

impl Reactor {
    /// Construct an idle reactor with no registered peers.
    pub fn new() -> Result<Self, Error> {
        let mut sources = popol::Sources::new();
        let waker = Arc::new(popol::Waker::new(&mut sources, Source::Waker).map_err(Error::Init)?);
        let (command_tx, commands) = crossbeam_channel::unbounded();

        Ok(Self {
            sources,
            connecting: HashMap::new(),
            streams: HashMap::new(),
            write_queues: HashMap::new(),
            timeouts: TimeoutManager::new(),
            waker,
            commands,
            command_tx,
        })
    }

    /// Obtain a [`Handle`] that can request shutdown from another thread.
    pub fn handle(&self) -> Handle {
        Handle {
            commands: self.command_tx.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Drive `group` until it shuts down.
    ///
    /// Each iteration waits for socket readiness or the next due per-peer
    /// timer, translates whatever fired into [`Event`]s, and feeds them to
    /// `group.handle_event` one at a time, exactly as the single-threaded
    /// cooperative scheduling model requires.
    pub fn run(&mut self, group: &mut Group) -> Result<(), Error> {
        loop {
            if group.is_shutting_down() && self.streams.is_empty() && self.connecting.is_empty() {
                return Ok(());
            }

            let default_wait = Duration::from_secs(3);
            let (events, now) = self.step(default_wait)?;

            for event in events {
                match event {
                    StepEvent::Shutdown => group.shutdown(self),
                    StepEvent::Peer(event) => group.handle_event(self, event, now),
                }
            }
        }
    }

    /// Wait for at most `timeout` for readiness or a due timer, translate
    /// whatever fired, and return the resulting events without touching a
    /// [`Group`]. Exposed so reactor-level integration tests can drive the
    /// transport directly, without a full state machine attached.
    fn step(&mut self, timeout: Duration) -> Result<(Vec<StepEvent>, LocalTime), Error> {
        let mut events = popol::Events::new();
        let mut pending: Vec<StepEvent> = Vec::new();

        let now = LocalTime::now();
        let wait = self.timeouts.next_wake(now).map(Duration::from).unwrap_or(timeout);

        match self.sources.wait_timeout(&mut events, wait) {
            Ok(()) => {
                for (source, readiness) in events.iter() {
                    match *source {
                        Source::Waker => {
                            let commands: Vec<Command> = self.commands.try_iter().collect();
                            for command in commands {
                                match command {
                                    Command::Shutdown => pending.push(StepEvent::Shutdown),
                                }
                            }
                        }
                        Source::Peer(id) => {
                            let mut peer_events = Vec::new();
                            self.poll_peer(id, readiness, &mut peer_events);
                            pending.extend(peer_events.into_iter().map(StepEvent::Peer));
                        }
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
            Err(err) => return Err(Error::Poll(err)),
        }

        let now = LocalTime::now();
        let mut fired = Vec::new();
        self.timeouts.wake(now, &mut fired);
        pending.extend(fired.into_iter().map(|id| StepEvent::Peer(Event::Timer(id))));

        Ok((pending, now))
    }

    /// Directly exercise the transport for one readiness cycle, returning
    /// the [`Event`]s produced. Used by reactor-level integration tests
    /// that don't want to attach a full [`Group`].
    pub fn poll_once(&mut self, timeout: Duration) -> Result<Vec<Event>, Error> {
        let (events, _now) = self.step(timeout)?;
        Ok(events
            .into_iter()
            .filter_map(|e| match e {
                StepEvent::Peer(event) => Some(event),
                StepEvent::Shutdown => None,
            })
            .collect())
    }

    fn poll_peer(&mut self, id: PeerId, readiness: popol::Event, pending: &mut Vec<Event>) {
        let failed = readiness.errored || readiness.hangup || readiness.invalid;

        if readiness.writable && !failed {
            if let Some(socket) = self.connecting.remove(&id) {
                self.finish_connect(id, socket, pending);
            } else {
                self.flush_writes(id, pending);
            }
        }
        if readiness.readable && !failed {
            self.drain_readable(id, pending);
        }
        if failed {
            pending.push(Event::Error(id));
        }
    }

    fn finish_connect(&mut self, id: PeerId, socket: Socket, pending: &mut Vec<Event>) {
        match socket.take_error() {
            Ok(None) => {
                if let Some(source) = self.sources.get_mut(&Source::Peer(id)) {
                    source.set(popol::interest::READ);
                }
                let stream: TcpStream = socket.into();
                if stream.set_nonblocking(true).is_err() {
                    pending.push(Event::Error(id));
                    return;
                }
                self.streams.insert(id, stream);
                log::debug!("peer {id}: connected");
                pending.push(Event::Connected(id));
            }
            Ok(Some(err)) => {
                log::debug!("peer {id}: connect failed: {err}");
                self.sources.unregister(&Source::Peer(id));
                pending.push(Event::Error(id));
            }
            Err(err) => {
                log::debug!("peer {id}: connect failed: {err}");
                self.sources.unregister(&Source::Peer(id));
                pending.push(Event::Error(id));
            }
        }
    }

    fn flush_writes(&mut self, id: PeerId, pending: &mut Vec<Event>) {
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        let Some(queue) = self.write_queues.get_mut(&id) else {
            if let Some(source) = self.sources.get_mut(&Source::Peer(id)) {
                source.unset(popol::interest::WRITE);
            }
            return;
        };

        match stream.write(queue) {
            Ok(written) => {
                queue.drain(..written);
                if queue.is_empty() {
                    self.write_queues.remove(&id);
                    if let Some(source) = self.sources.get_mut(&Source::Peer(id)) {
                        source.unset(popol::interest::WRITE);
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => pending.push(Event::Error(id)),
        }
    }

    fn drain_readable(&mut self, id: PeerId, pending: &mut Vec<Event>) {
        let Some(stream) = self.streams.get_mut(&id) else {
            return;
        };
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    pending.push(Event::Eof(id));
                    break;
                }
                Ok(n) => pending.push(Event::Readable(id, buf[..n].to_vec())),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    log::debug!("peer {id}: read error: {err}");
                    pending.push(Event::Error(id));
                    break;
                }
            }
        }
    }
}

impl Transport for Reactor {
    type Error = io::Error;

    fn connect(&mut self, peer: PeerId, addr: SocketAddr) -> Result<(), Self::Error> {
        log::debug!("peer {peer}: connecting to {addr}");
        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;

        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err),
        }

        self.sources.register(Source::Peer(peer), &socket, popol::interest::WRITE);
        self.connecting.insert(peer, socket);
        Ok(())
    }

    fn write(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error> {
        if bytes.is_empty() {
            return Ok(());
        }
        if let Some(queue) = self.write_queues.get_mut(&peer) {
            queue.extend_from_slice(bytes);
            return Ok(());
        }
        let Some(stream) = self.streams.get_mut(&peer) else {
            return Ok(());
        };
        match stream.write(bytes) {
            Ok(written) if written == bytes.len() => Ok(()),
            Ok(written) => {
                self.write_queues.insert(peer, bytes[written..].to_vec());
                if let Some(source) = self.sources.get_mut(&Source::Peer(peer)) {
                    source.set(popol::interest::WRITE);
                }
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                self.write_queues.insert(peer, bytes.to_vec());
                if let Some(source) = self.sources.get_mut(&Source::Peer(peer)) {
                    source.set(popol::interest::WRITE);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn disconnect(&mut self, peer: PeerId) {
        self.connecting.remove(&peer);
        self.write_queues.remove(&peer);
        if let Some(stream) = self.streams.remove(&peer) {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.sources.unregister(&Source::Peer(peer));
        self.timeouts.unregister(peer);
    }

    fn schedule_wake(&mut self, peer: PeerId, at: LocalTime) {
        self.timeouts.register(peer, at);
    }

    fn cancel_wake(&mut self, peer: PeerId) {
        self.timeouts.unregister(peer);
    }
}
