//! Idempotent replay cache for the `payment-identifier` extension.
//!
//! Keyed by the client-minted payment id. Identifiers carry no cryptographic
//! binding, so each entry also records the exact payment header bytes and
//! the verified payer: a byte-identical retry replays without any crypto,
//! and a differing payload replays only when verification yields the same
//! payer. Anything else is processed as a fresh payment.

use dashmap::DashMap;
use http::StatusCode;

/// A settled response retained for replay.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The exact payment header value that settled first.
    pub header_value: String,
    /// The verified payer address.
    pub payer: String,
    /// Response status.
    pub status: StatusCode,
    /// Content type of the cached body.
    pub content_type: Option<String>,
    /// The settlement receipt header value.
    pub receipt: String,
    /// Buffered response body.
    pub body: Vec<u8>,
}

/// In-memory replay store, bounded by entry count.
///
/// TTL and persistence are deployment choices layered on top; the default
/// keeps entries until the bound evicts inserts.
#[derive(Debug)]
pub struct ReplayCache {
    entries: DashMap<String, CachedResponse>,
    capacity: usize,
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ReplayCache {
    /// Creates a cache bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Looks up the settled response for a payment id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<CachedResponse> {
        self.entries.get(id).map(|e| e.clone())
    }

    /// Records the first settled response for a payment id.
    ///
    /// Later inserts under the same id are ignored: the first fully settled
    /// request owns the id. Inserts beyond capacity are dropped.
    pub fn store(&self, id: &str, response: CachedResponse) {
        if self.entries.len() >= self.capacity {
            return;
        }
        self.entries.entry(id.to_owned()).or_insert(response);
    }

    /// Number of cached responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(payer: &str) -> CachedResponse {
        CachedResponse {
            header_value: "abc".into(),
            payer: payer.into(),
            status: StatusCode::OK,
            content_type: Some("application/json".into()),
            receipt: "receipt".into(),
            body: b"{}".to_vec(),
        }
    }

    #[test]
    fn first_settlement_owns_the_id() {
        let cache = ReplayCache::new(10);
        cache.store("pay_1234567890123456", cached("0xfirst"));
        cache.store("pay_1234567890123456", cached("0xsecond"));
        assert_eq!(cache.get("pay_1234567890123456").unwrap().payer, "0xfirst");
    }

    #[test]
    fn capacity_bounds_inserts() {
        let cache = ReplayCache::new(1);
        cache.store("id_aaaaaaaaaaaaaaaa", cached("0xa"));
        cache.store("id_bbbbbbbbbbbbbbbb", cached("0xb"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("id_bbbbbbbbbbbbbbbb").is_none());
    }
}
