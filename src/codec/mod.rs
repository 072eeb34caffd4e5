//! # Wire Codec
//!
//! Pure functions for the two trickiest pieces of the MeshCore RF format:
//!
//! - **Packed path-length decoding**: a single byte carries both a hop count
//!   (low 6 bits) and a bytes-per-hop size code (high 2 bits). Firmware that
//!   predates the packed form sends a raw byte count instead, so decoding
//!   carries a legacy fallback. Walking a path buffer with the wrong stride
//!   corrupts every hop after the first, which is why this lives in one
//!   well-tested place.
//! - **Packet identity digests**: a content-addressed 8-byte digest matching
//!   the firmware's `Packet::calculatePacketHash()`, used to recognize the
//!   same logical packet arriving again via a different path.
//!
//! Both functions are total: malformed input yields the legacy interpretation
//! or the all-zero sentinel digest, never an error. Callers treat those as
//! "proceed with reduced confidence".

use sha2::{Digest, Sha256};

/// Payload type code for trace packets (header bits 2-5).
pub const PAYLOAD_TYPE_TRACE: u8 = 9;

/// Payload types whose digest mixes in the path length. Trace responses grow
/// their path en route, so two observations of the same trace differ in
/// path_len and must not collide; every other type dedups on payload alone.
pub const PATH_LEN_SENSITIVE_TYPES: &[u8] = &[PAYLOAD_TYPE_TRACE];

/// Digest returned for structurally unparseable packets.
pub const SENTINEL_PACKET_HASH: &str = "0000000000000000";

/// Default cap on the decoded path byte length. Anything larger than this is
/// assumed to be a legacy one-byte-per-hop length byte.
pub const DEFAULT_MAX_PATH_SIZE: usize = 64;

// Route types (header low 2 bits) that carry 4 transport-code bytes.
const ROUTE_TRANSPORT_FLOOD: u8 = 0x00;
const ROUTE_TRANSPORT_DIRECT: u8 = 0x03;

/// Decode a packed path-length byte into `(path_byte_length, bytes_per_hop)`.
///
/// Low 6 bits are the hop count (0-63); the high 2 bits select the per-hop
/// width: code 0 = 1 byte, 1 = 2 bytes, 2 = 3 bytes, 3 reserved. The reserved
/// code, or a product exceeding `max_path_size`, falls back to the legacy
/// reading: the whole byte is a raw path byte length at one byte per hop.
pub fn decode_path_len_byte(byte: u8, max_path_size: usize) -> (usize, usize) {
    let hop_count = (byte & 0x3F) as usize;
    let size_code = byte >> 6;
    if size_code == 3 {
        return (byte as usize, 1);
    }
    let bytes_per_hop = size_code as usize + 1;
    let path_byte_length = hop_count * bytes_per_hop;
    if path_byte_length > max_path_size {
        return (byte as usize, 1);
    }
    (path_byte_length, bytes_per_hop)
}

/// Compute the content-addressed identity digest for a raw packet.
///
/// Layout walked: header byte, 4 transport-code bytes when the route type is
/// TRANSPORT_FLOOD or TRANSPORT_DIRECT, path-length byte, path bytes, then
/// payload. The digest is `sha256(payload_type ++ path_len ++ payload)` where
/// the 2-byte little-endian `path_len` is included only for types listed in
/// [`PATH_LEN_SENSITIVE_TYPES`]. Returns the first 8 digest bytes as 16
/// uppercase hex chars, or [`SENTINEL_PACKET_HASH`] when the buffer is
/// truncated or its declared lengths are inconsistent.
///
/// `payload_type` overrides the type extracted from the header; pass `None`
/// for normal packets.
pub fn packet_hash(raw: &[u8], payload_type: Option<u8>) -> String {
    let Some(&header) = raw.first() else {
        return SENTINEL_PACKET_HASH.to_string();
    };

    let payload_type = match payload_type {
        Some(t) => t & 0x0F,
        None => (header >> 2) & 0x0F,
    };

    let route_type = header & 0x03;
    let has_transport = route_type == ROUTE_TRANSPORT_FLOOD || route_type == ROUTE_TRANSPORT_DIRECT;

    let mut offset = 1usize;
    if has_transport {
        offset += 4;
    }

    let Some(&path_len) = raw.get(offset) else {
        return SENTINEL_PACKET_HASH.to_string();
    };
    offset += 1;

    let payload_start = offset + path_len as usize;
    if raw.len() <= payload_start {
        return SENTINEL_PACKET_HASH.to_string();
    }
    let payload = &raw[payload_start..];

    let mut hasher = Sha256::new();
    hasher.update([payload_type]);
    if PATH_LEN_SENSITIVE_TYPES.contains(&payload_type) {
        // Firmware hashes path_len as a uint16_t, hence two LE bytes.
        hasher.update((path_len as u16).to_le_bytes());
    }
    hasher.update(payload);
    let digest = hasher.finalize();

    let mut out = String::with_capacity(16);
    for b in &digest[..8] {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", b);
    }
    out
}

/// Hex-string convenience wrapper around [`packet_hash`] for tooling that
/// works with captured packet dumps.
pub fn packet_hash_hex(raw_hex: &str, payload_type: Option<u8>) -> String {
    match decode_hex(raw_hex) {
        Some(bytes) => packet_hash(&bytes, payload_type),
        None => SENTINEL_PACKET_HASH.to_string(),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
