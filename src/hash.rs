//! Content hashing for ETags and serialized-fetch keys.

use sha2::{Digest, Sha256};

/// Short hex digest of `bytes`. Stable across processes, so a server-side
/// hash matches one computed during client hydration.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_short() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
        assert_eq!(content_hash(b"").len(), 24);
    }
}
