// Sports-media mirroring: origin URLs, existence probes, bounded fetches,
// WebP variant encoding, blob-store writes, and the per-entity cache index.
//
// Stages, in the order a mirror runs them:
//   source -> probe -> fetch -> encode -> store -> index
//
// The orchestration (single entity, bulk conversion, read-path fallback)
// lives in `crate::pipeline`.

pub mod asset;
pub mod encode;
pub mod fetch;
pub mod index;
pub mod probe;
pub mod source;
pub mod store;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of source bytes. Stored on the index row and used as the
/// cache-busting `?v=` suffix on public URLs.
pub fn source_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Short version tag derived from a source hash.
pub fn version_tag(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_hash_is_stable() {
        let a = source_hash(b"crest");
        assert_eq!(a.len(), 64);
        assert_eq!(a, source_hash(b"crest"));
        assert_ne!(a, source_hash(b"crest2"));
        assert_eq!(version_tag(&a).len(), 12);
        assert_eq!(version_tag("abc"), "abc");
    }
}
