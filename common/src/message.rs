//! Control message bodies: `version`, `verack`, `ping`, `pong`, and the
//! network-address record embedded in a `version` message.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bitflags::bitflags;

use crate::error::DecodeError;
use crate::wire::{
    decode_i32_le, decode_i64_le, decode_length_prefixed_string, decode_u64_le, encode_i32_le,
    encode_i64_le, encode_length_prefixed_string, encode_u64_le,
};

/// Command name for a version announcement.
pub const CMD_VERSION: &str = "version";
/// Command name for a handshake acknowledgement.
pub const CMD_VERACK: &str = "verack";
/// Command name for a liveness probe.
pub const CMD_PING: &str = "ping";
/// Command name for a liveness probe reply.
pub const CMD_PONG: &str = "pong";

bitflags! {
    /// Services advertised by a peer in its `version` message.
    #[derive(Default)]
    pub struct ServiceFlags: u64 {
        /// The peer maintains a full copy of the chain and serves it to others.
        const NODE_NETWORK = 1 << 0;
        /// The peer serves compact block filters.
        const NODE_BLOOM = 1 << 2;
    }
}

/// A network address record as embedded in a `version` message.
///
/// The 26-byte Bitcoin-style fixed encoding (8-byte services, 16-byte
/// IPv6/v4-mapped address, 2-byte big-endian port) is used; this
/// implementation does not embed a timestamp field, matching the
/// version-message variant of the address record rather than the
/// timestamped `addr` message variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddr {
    /// Services advertised by this address.
    pub services: ServiceFlags,
    /// The peer's IP address.
    pub ip: IpAddr,
    /// The peer's port.
    pub port: u16,
}

const NET_ADDR_LEN: usize = 26;

impl NetAddr {
    /// Construct a record from a concrete socket address and service set.
    pub fn new(addr: SocketAddr, services: ServiceFlags) -> Self {
        Self {
            services,
            ip: addr.ip(),
            port: addr.port(),
        }
    }

    /// The socket address this record describes.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Encode in the fixed 26-byte wire layout.
    pub fn encode(&self, out: &mut Vec<u8>) {
        encode_u64_le(self.services.bits(), out);
        out.extend_from_slice(&ipv6_mapped_octets(self.ip));
        out.extend_from_slice(&self.port.to_be_bytes());
    }

    /// Decode from the fixed 26-byte wire layout.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        if buf.len() < NET_ADDR_LEN {
            return Err(DecodeError::Truncated {
                needed: NET_ADDR_LEN,
                available: buf.len(),
            });
        }
        let (services, rest) = decode_u64_le(buf)?;
        let (addr_bytes, rest) = rest.split_at(16);
        let mut octets = [0u8; 16];
        octets.copy_from_slice(addr_bytes);
        let ip = ipv6_mapped_to_ip(octets);
        let (port_bytes, rest) = rest.split_at(2);
        let port = u16::from_be_bytes(port_bytes.try_into().unwrap());

        Ok((
            Self {
                services: ServiceFlags::from_bits_truncate(services),
                ip,
                port,
            },
            rest,
        ))
    }
}

fn ipv6_mapped_octets(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

fn ipv6_mapped_to_ip(octets: [u8; 16]) -> IpAddr {
    let v6 = Ipv6Addr::from(octets);
    match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    }
}

/// Body of a `version` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    /// Protocol version advertised by the sender.
    pub version: i32,
    /// Services the sender offers.
    pub services: ServiceFlags,
    /// Sender's wall-clock time at the moment the message was built.
    pub timestamp: i64,
    /// Address the sender believes it is reachable at.
    pub receiver: NetAddr,
    /// Address the sender believes the recipient is reachable at.
    pub sender: NetAddr,
    /// Random value used to detect self-connections.
    pub nonce: u64,
    /// Free-form client identification string.
    pub user_agent: String,
    /// Height of the sender's best known chain tip.
    pub start_height: i32,
    /// Whether the sender wants unfiltered relay. Some peers omit this
    /// trailing byte entirely; absence decodes as `true`.
    pub relay: bool,
}

impl VersionMessage {
    /// Encode this message's body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_i32_le(self.version, &mut out);
        encode_u64_le(self.services.bits(), &mut out);
        encode_i64_le(self.timestamp, &mut out);
        self.receiver.encode(&mut out);
        self.sender.encode(&mut out);
        encode_u64_le(self.nonce, &mut out);
        encode_length_prefixed_string(&self.user_agent, &mut out);
        encode_i32_le(self.start_height, &mut out);
        out.push(self.relay as u8);
        out
    }

    /// Decode a message body. The trailing `relay` byte is optional; a
    /// truncated tail after `start_height` decodes as `relay = true`.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (version, rest) = decode_i32_le(buf)?;
        let (services, rest) = decode_u64_le(rest)?;
        let (timestamp, rest) = decode_i64_le(rest)?;
        let (receiver, rest) = NetAddr::decode(rest)?;
        let (sender, rest) = NetAddr::decode(rest)?;
        let (nonce, rest) = decode_u64_le(rest)?;
        let (user_agent, rest) = decode_length_prefixed_string(rest)?;
        let (start_height, rest) = decode_i32_le(rest)?;
        let relay = rest.first().map(|&b| b != 0).unwrap_or(true);

        Ok(Self {
            version,
            services: ServiceFlags::from_bits_truncate(services),
            timestamp,
            receiver,
            sender,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

/// Body of a `ping` or `pong` message: a single nonce used to correlate
/// the reply with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub u64);

impl Nonce {
    /// Encode as 8 little-endian bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        encode_u64_le(self.0, &mut out);
        out
    }

    /// Decode from 8 little-endian bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (nonce, _) = decode_u64_le(buf)?;
        Ok(Self(nonce))
    }
}
