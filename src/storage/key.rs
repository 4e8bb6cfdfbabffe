//! Storage key schema.
//!
//! The backend is addressed by (hash key, sort key) pairs flattened into one
//! byte string:
//!
//! ```text
//! [ hash_key_len: u16 big-endian ][ hash_key ][ sort_key ]
//! ```
//!
//! Plain Redis keys become hash keys with an empty sort key.

use bytes::{BufMut, Bytes, BytesMut};

/// Longest hash key the schema can encode.
pub const MAX_HASH_KEY_LEN: usize = u16::MAX as usize;

/// Builds the storage key. Returns `None` if the hash key is too long.
pub fn generate_key(hash_key: &[u8], sort_key: &[u8]) -> Option<Bytes> {
    if hash_key.len() > MAX_HASH_KEY_LEN {
        return None;
    }
    let mut key = BytesMut::with_capacity(2 + hash_key.len() + sort_key.len());
    key.put_u16(hash_key.len() as u16);
    key.put_slice(hash_key);
    key.put_slice(sort_key);
    Some(key.freeze())
}

/// Splits a storage key back into (hash key, sort key).
pub fn restore_key(key: &[u8]) -> Option<(Bytes, Bytes)> {
    if key.len() < 2 {
        return None;
    }
    let hash_len = u16::from_be_bytes([key[0], key[1]]) as usize;
    if key.len() < 2 + hash_len {
        return None;
    }
    let hash_key = Bytes::copy_from_slice(&key[2..2 + hash_len]);
    let sort_key = Bytes::copy_from_slice(&key[2 + hash_len..]);
    Some((hash_key, sort_key))
}
