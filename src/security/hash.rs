// src/security/hash.rs

use sha1::{Digest, Sha1};

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-1 of a fresh UUIDv4 string; the same recipe node ids use.
pub fn unique_hashkey() -> String {
    sha1_hex(uuid::Uuid::new_v4().to_string().as_bytes())
}

pub fn hashkey_from_string(s: &str) -> String {
    sha1_hex(s.as_bytes())
}
