//! hashing helpers for the lock ledger: block ids, merge keys, state root
use sha3::{Digest, Sha3_512};

use crate::types::Hash;

fn sha3_512_bytes(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut arr = [0u8; 64];
    arr.copy_from_slice(&out);
    arr
}

pub fn sha3_512(data: &[u8]) -> Hash {
    Hash::from_bytes(sha3_512_bytes(data))
}

/// Hash several byte slices as one message, without an intermediate buffer.
pub fn sha3_512_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha3_512::new();
    for p in parts {
        hasher.update(p);
    }
    let out = hasher.finalize();
    let mut arr = [0u8; 64];
    arr.copy_from_slice(&out);
    Hash::from_bytes(arr)
}
