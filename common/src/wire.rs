//! Streaming message framing: the fixed 24-byte header, primitive field
//! codecs, and the checksum scheme shared by every message on the wire.
use bitcoin_hashes::{sha256d, Hash};

use crate::error::DecodeError;

/// Length of the magic tag, in bytes.
pub const MAGIC_LEN: usize = 4;
/// Length of the NUL-padded ASCII command field, in bytes.
pub const COMMAND_LEN: usize = 12;
/// Total length of a [`MessageHeader`] on the wire.
pub const HEADER_LEN: usize = MAGIC_LEN + COMMAND_LEN + 4 + 4;
/// Largest payload this implementation will accept before marking the
/// sending peer misbehaved.
pub const MAX_MESSAGE_SIZE: u32 = 32 * 1024 * 1024;

/// A decoded fixed-size message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Network magic as read off the wire, compared against chain params by the caller.
    pub magic: u32,
    /// ASCII command name with trailing NULs stripped.
    pub command: String,
    /// Length of the payload that follows this header.
    pub data_len: u32,
    /// First four bytes of the double-SHA-256 digest of the payload.
    pub checksum: [u8; 4],
}

/// Attempt to decode a header from the start of `buf`.
///
/// Returns `Ok(None)` if fewer than [`HEADER_LEN`] bytes are buffered; the
/// caller should wait for more bytes rather than treat this as an error.
pub fn try_decode_header(buf: &[u8]) -> Result<Option<MessageHeader>, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let (magic, rest) = decode_u32_le(buf)?;
    let (command_bytes, rest) = rest.split_at(COMMAND_LEN);
    let command = decode_command(command_bytes)?;
    let (data_len, rest) = decode_u32_le(rest)?;
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&rest[..4]);

    Ok(Some(MessageHeader {
        magic,
        command,
        data_len,
        checksum,
    }))
}

fn decode_command(bytes: &[u8]) -> Result<String, DecodeError> {
    let nul_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (name, pad) = bytes.split_at(nul_pos);
    if !pad.iter().all(|&b| b == 0) {
        return Err(DecodeError::InvalidCommand);
    }
    if !name.iter().all(|&b| b.is_ascii_graphic()) {
        return Err(DecodeError::InvalidCommand);
    }
    std::str::from_utf8(name)
        .map(str::to_string)
        .map_err(|_| DecodeError::InvalidCommand)
}

fn encode_command(name: &str) -> Result<[u8; COMMAND_LEN], DecodeError> {
    if name.len() > COMMAND_LEN || !name.is_ascii() {
        return Err(DecodeError::InvalidCommand);
    }
    let mut out = [0u8; COMMAND_LEN];
    out[..name.len()].copy_from_slice(name.as_bytes());
    Ok(out)
}

/// Decode a little-endian `u32`, returning the remaining bytes.
pub fn decode_u32_le(buf: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    require(buf, 4)?;
    let (head, rest) = buf.split_at(4);
    Ok((u32::from_le_bytes(head.try_into().unwrap()), rest))
}

/// Decode a little-endian `u64`, returning the remaining bytes.
pub fn decode_u64_le(buf: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    require(buf, 8)?;
    let (head, rest) = buf.split_at(8);
    Ok((u64::from_le_bytes(head.try_into().unwrap()), rest))
}

/// Decode a little-endian `i32`, returning the remaining bytes.
pub fn decode_i32_le(buf: &[u8]) -> Result<(i32, &[u8]), DecodeError> {
    require(buf, 4)?;
    let (head, rest) = buf.split_at(4);
    Ok((i32::from_le_bytes(head.try_into().unwrap()), rest))
}

/// Decode a little-endian `i64`, returning the remaining bytes.
pub fn decode_i64_le(buf: &[u8]) -> Result<(i64, &[u8]), DecodeError> {
    require(buf, 8)?;
    let (head, rest) = buf.split_at(8);
    Ok((i64::from_le_bytes(head.try_into().unwrap()), rest))
}

/// Decode a compact (Bitcoin-style) variable-length integer.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    require(buf, 1)?;
    let (tag, rest) = buf.split_at(1);
    match tag[0] {
        0xff => {
            let (v, rest) = decode_u64_le(rest)?;
            Ok((v, rest))
        }
        0xfe => {
            let (v, rest) = decode_u32_le(rest)?;
            Ok((v as u64, rest))
        }
        0xfd => {
            require(rest, 2)?;
            let (head, rest) = rest.split_at(2);
            Ok((u16::from_le_bytes(head.try_into().unwrap()) as u64, rest))
        }
        n => Ok((n as u64, rest)),
    }
}

/// Decode a length-prefixed (varint length, then UTF-8 bytes) string.
pub fn decode_length_prefixed_string(buf: &[u8]) -> Result<(String, &[u8]), DecodeError> {
    let (len, rest) = decode_varint(buf)?;
    let len = len as usize;
    require(rest, len)?;
    let (bytes, rest) = rest.split_at(len);
    let s = std::str::from_utf8(bytes)
        .map_err(|_| DecodeError::InvalidUtf8)?
        .to_string();
    Ok((s, rest))
}

fn require(buf: &[u8], n: usize) -> Result<(), DecodeError> {
    if buf.len() < n {
        Err(DecodeError::Truncated {
            needed: n,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Encode a `u32` as little-endian bytes.
pub fn encode_u32_le(v: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Encode a `u64` as little-endian bytes.
pub fn encode_u64_le(v: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Encode an `i32` as little-endian bytes.
pub fn encode_i32_le(v: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Encode an `i64` as little-endian bytes.
pub fn encode_i64_le(v: i64, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Encode a `u64` as a compact variable-length integer.
pub fn encode_varint(v: u64, out: &mut Vec<u8>) {
    if v < 0xfd {
        out.push(v as u8);
    } else if v <= u16::MAX as u64 {
        out.push(0xfd);
        out.extend_from_slice(&(v as u16).to_le_bytes());
    } else if v <= u32::MAX as u64 {
        out.push(0xfe);
        out.extend_from_slice(&(v as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Encode a string as a length-prefixed field.
pub fn encode_length_prefixed_string(s: &str, out: &mut Vec<u8>) {
    encode_varint(s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

/// Compute the 4-byte header checksum for a payload: the first four bytes
/// of its double-SHA-256 digest.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256d::Hash::hash(payload);
    let bytes = digest.into_inner();
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// Encode a complete message: header (with computed checksum) followed by payload.
pub fn encode_message(magic: u32, command: &str, payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    encode_u32_le(magic, &mut out);
    out.extend_from_slice(&encode_command(command)?);
    encode_u32_le(payload.len() as u32, &mut out);
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    Ok(out)
}
