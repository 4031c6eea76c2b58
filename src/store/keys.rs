/// Key layout and encoding utilities for the log store partitions
///
/// Partition structure:
/// - `entries`: {timestamp_micros:8}{seq:8} -> Entry (JSON)
/// - `meta`: {name} -> value (big-endian integer)
///
/// Both halves of an entry key are big-endian, and the timestamp has its sign
/// bit flipped, so lexicographic key order is (timestamp, insertion order).
/// Scanning the partition backwards yields most recent first.
use chrono::{DateTime, Utc};

pub const ENTRY_KEY_LEN: usize = 16;

pub const META_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const META_NEXT_SEQ: &[u8] = b"next_seq";

const SIGN_BIT: u64 = 1 << 63;

/// Map a signed microsecond timestamp onto an order-preserving u64
fn encode_micros(micros: i64) -> u64 {
    (micros as u64) ^ SIGN_BIT
}

fn decode_micros(raw: u64) -> i64 {
    (raw ^ SIGN_BIT) as i64
}

/// Encode an entry key: {timestamp}{seq}
pub fn encode_entry_key(timestamp: &DateTime<Utc>, seq: u64) -> [u8; ENTRY_KEY_LEN] {
    let mut key = [0u8; ENTRY_KEY_LEN];
    key[..8].copy_from_slice(&encode_micros(timestamp.timestamp_micros()).to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Decode an entry key -> (timestamp micros, seq)
pub fn decode_entry_key(key: &[u8]) -> Option<(i64, u64)> {
    if key.len() != ENTRY_KEY_LEN {
        return None;
    }
    let ts = u64::from_be_bytes(key[..8].try_into().ok()?);
    let seq = u64::from_be_bytes(key[8..].try_into().ok()?);
    Some((decode_micros(ts), seq))
}

/// Smallest key not before `timestamp`, for inclusive lower bounds
///
/// A fractional microsecond rounds up, so entries stamped just before
/// `timestamp` stay out of the range.
pub fn lower_bound(timestamp: &DateTime<Utc>) -> [u8; ENTRY_KEY_LEN] {
    cutoff_key(timestamp)
}

/// Largest key at `timestamp`, for inclusive upper bounds
pub fn upper_bound(timestamp: &DateTime<Utc>) -> [u8; ENTRY_KEY_LEN] {
    encode_entry_key(timestamp, u64::MAX)
}

/// Exclusive upper bound selecting every key strictly older than `cutoff`
///
/// Stored timestamps carry whole microseconds, so a cutoff with a fractional
/// microsecond rounds up.
pub fn cutoff_key(cutoff: &DateTime<Utc>) -> [u8; ENTRY_KEY_LEN] {
    let mut micros = cutoff.timestamp_micros();
    if cutoff.timestamp_subsec_nanos() % 1_000 != 0 {
        micros += 1;
    }
    let mut key = [0u8; ENTRY_KEY_LEN];
    key[..8].copy_from_slice(&encode_micros(micros).to_be_bytes());
    key
}

pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn decode_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}
