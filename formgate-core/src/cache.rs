//! In-memory response cache.
//!
//! Entries live in a bounded LRU map and carry their own expiry. Keys are
//! derived from the endpoint name, the route URI and whichever request
//! parameters actually shape the answer, so the same request always hits
//! the same entry. Writes simply overwrite: recomputing an entry yields the
//! same value.

use formgate_sdk::params::Params;
use formgate_sdk::signature;
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

/// Entry count used when a capacity of zero is configured.
pub const DEFAULT_CAPACITY: usize = 1024;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: OffsetDateTime,
}

pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

/// Derive the cache key: SHA-256 over `"{endpoint}|{route_uri}|{params}"`.
///
/// Only pass the parameters the cached computation reads. Anything else
/// would let arbitrary query strings mint fresh entries.
pub fn cache_key(endpoint: &str, route_uri: &str, params: &Params) -> String {
    let canonical = signature::canonicalize(params).unwrap_or_default();
    let data = format!("{endpoint}|{route_uri}|{canonical}");
    let digest = ring::digest::digest(&ring::digest::SHA256, data.as_bytes());
    fast32::base64::RFC4648_URL_NOPAD.encode(digest.as_ref())
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_at(key, OffsetDateTime::now_utc()).await
    }

    pub async fn insert(&self, key: String, value: serde_json::Value) {
        self.insert_at(key, value, OffsetDateTime::now_utc()).await;
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: String,
        compute: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            tracing::debug!(key = %key, "Response cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn get_at(&self, key: &str, now: OffsetDateTime) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    async fn insert_at(&self, key: String, value: serde_json::Value, now: OffsetDateTime) {
        let mut entries = self.entries.lock().await;
        entries.put(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formgate_sdk::params::parse_query;
    use serde_json::json;

    #[test]
    fn test_key_depends_on_every_part() {
        let params = parse_query("lang=nl");
        let key = cache_key("payment-methods", "/payment/methods", &params);
        assert_eq!(key, cache_key("payment-methods", "/payment/methods", &parse_query("lang=nl")));
        assert_ne!(key, cache_key("other", "/payment/methods", &params));
        assert_ne!(key, cache_key("payment-methods", "/other", &params));
        assert_ne!(key, cache_key("payment-methods", "/payment/methods", &parse_query("lang=en")));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = ResponseCache::new(Duration::seconds(60), 8);
        let t0 = OffsetDateTime::now_utc();
        cache.insert_at("k".into(), json!([1]), t0).await;
        assert_eq!(cache.get_at("k", t0 + Duration::seconds(59)).await, Some(json!([1])));
        assert_eq!(cache.get_at("k", t0 + Duration::seconds(60)).await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped_on_read() {
        let cache = ResponseCache::new(Duration::seconds(10), 8);
        let t0 = OffsetDateTime::now_utc();
        cache.insert_at("old".into(), json!(1), t0).await;
        cache.insert_at("new".into(), json!(2), t0 + Duration::seconds(5)).await;
        assert_eq!(cache.get_at("old", t0 + Duration::seconds(11)).await, None);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_bounds_entry_count() {
        let cache = ResponseCache::new(Duration::minutes(5), 2);
        let t0 = OffsetDateTime::now_utc();
        cache.insert_at("a".into(), json!("a"), t0).await;
        cache.insert_at("b".into(), json!("b"), t0).await;
        // Touch "a" so "b" is the least recently used entry.
        assert!(cache.get_at("a", t0).await.is_some());
        cache.insert_at("c".into(), json!("c"), t0).await;
        assert_eq!(cache.get_at("b", t0).await, None);
        assert_eq!(cache.get_at("a", t0).await, Some(json!("a")));

        for i in 0..100 {
            cache.insert_at(format!("junk-{i}"), json!(i), t0).await;
        }
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get_at("junk-99", t0).await, Some(json!(99)));
    }

    #[tokio::test]
    async fn test_zero_capacity_falls_back_to_default() {
        let cache = ResponseCache::new(Duration::minutes(5), 0);
        cache.insert("k".into(), json!(true)).await;
        assert_eq!(cache.get("k").await, Some(json!(true)));
        assert!(!cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with_computes_once() {
        let cache = ResponseCache::new(Duration::minutes(5), 8);
        let mut calls = 0;
        for _ in 0..2 {
            let value: Result<_, ()> = cache
                .get_or_try_insert_with("k".into(), || {
                    calls += 1;
                    async { Ok(json!({"ok": true})) }
                })
                .await;
            assert_eq!(value, Ok(json!({"ok": true})));
        }
        assert_eq!(calls, 1);

        let failed: Result<serde_json::Value, &str> = cache
            .get_or_try_insert_with("err".into(), || async { Err("upstream down") })
            .await;
        assert_eq!(failed, Err("upstream down"));
        assert_eq!(cache.get("err").await, None);
    }
}
