//! SHA-256 helpers shared by the control plane and the worker.
//!
//! Capability snapshots, refresh sessions and bearer-token checks all hash
//! through here so every caller produces the same lowercase hex encoding.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compare two secrets without short-circuiting on the first differing byte.
///
/// Both inputs are hashed first so the comparison always runs over 32 bytes
/// regardless of the secret lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn consistent_output() {
        let data = b"hello world";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn constant_time_eq_matches_equality() {
        assert!(constant_time_eq(b"psk-1", b"psk-1"));
        assert!(!constant_time_eq(b"psk-1", b"psk-2"));
        assert!(!constant_time_eq(b"psk-1", b"psk-10"));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
