//! Request-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request identity.
///
/// The method is case-insensitive and any fragment on the URL is ignored, so
/// `get https://a/x#top` and `GET https://a/x` share a key.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let url = url.split_once('#').map_or(url, |(base, _)| base);
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
