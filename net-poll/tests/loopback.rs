//! Reactor-level tests that open real loopback sockets, as distinct from
//! the `p2p` crate's protocol-level tests, which never touch a socket.
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use iop_net_poll::Reactor;
use iop_p2p::transport::{Event, Transport};

fn local_listener() -> TcpListener {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    listener.set_nonblocking(false).unwrap();
    listener
}

#[test]
fn connect_yields_connected_event() {
    let listener = local_listener();
    let addr = listener.local_addr().unwrap();
    let accepted = thread::spawn(move || listener.accept().unwrap());

    let mut reactor = Reactor::new().expect("construct reactor");
    reactor.connect(1, addr).expect("begin connect");

    let events = poll_until(&mut reactor, |events| {
        events.iter().any(|e| matches!(e, Event::Connected(1)))
    });
    assert!(events.iter().any(|e| matches!(e, Event::Connected(1))));

    accepted.join().unwrap();
}

#[test]
fn bytes_written_are_readable_by_the_peer() {
    let listener = local_listener();
    let addr = listener.local_addr().unwrap();
    let accepted = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        socket.write_all(b"hello from remote").unwrap();
        socket
    });

    let mut reactor = Reactor::new().expect("construct reactor");
    reactor.connect(1, addr).expect("begin connect");
    poll_until(&mut reactor, |events| events.iter().any(|e| matches!(e, Event::Connected(1))));

    let mut socket = accepted.join().unwrap();

    let events = poll_until(&mut reactor, |events| {
        events.iter().any(|e| matches!(e, Event::Readable(1, _)))
    });
    let bytes = events
        .into_iter()
        .find_map(|e| match e {
            Event::Readable(1, bytes) => Some(bytes),
            _ => None,
        })
        .unwrap();
    assert_eq!(&bytes, b"hello from remote");

    reactor.write(1, b"hello from us").unwrap();
    let mut buf = [0u8; 64];
    let n = socket.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello from us");
}

#[test]
fn disconnect_releases_the_socket() {
    let listener = local_listener();
    let addr = listener.local_addr().unwrap();
    let accepted = thread::spawn(move || listener.accept().unwrap());

    let mut reactor = Reactor::new().expect("construct reactor");
    reactor.connect(1, addr).expect("begin connect");
    poll_until(&mut reactor, |events| events.iter().any(|e| matches!(e, Event::Connected(1))));
    accepted.join().unwrap();

    reactor.disconnect(1);

    // A second connect for the same peer id must be accepted again: proof
    // the previous registration was fully torn down, not merely forgotten.
    let listener2 = local_listener();
    let addr2 = listener2.local_addr().unwrap();
    let accepted2 = thread::spawn(move || listener2.accept().unwrap());
    reactor.connect(1, addr2).expect("reconnect after disconnect");
    poll_until(&mut reactor, |events| events.iter().any(|e| matches!(e, Event::Connected(1))));
    accepted2.join().unwrap();
}

fn poll_until(reactor: &mut Reactor, done: impl Fn(&[Event]) -> bool) -> Vec<Event> {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let mut collected = Vec::new();
    while std::time::Instant::now() < deadline {
        let events = reactor.poll_once(Duration::from_millis(200)).expect("poll");
        let found = done(&events);
        collected.extend(events);
        if found {
            return collected;
        }
    }
    panic!("timed out waiting for expected event");
}
