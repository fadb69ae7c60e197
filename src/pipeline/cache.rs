//! Pipeline output caching.
//!
//! The routing core only computes cache keys (see
//! [`PipelineDescriptor::compute_cache_key`](crate::pipeline::PipelineDescriptor::compute_cache_key)).
//! Storage is a collaborator behind [`PipelineCache`]; the HTTP adapter keeps
//! rendered responses in one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Key/value store with expiry, keyed by cache key plus validity token.
pub trait PipelineCache: Send + Sync {
    /// Cached content for `key` if present, unexpired and stored with the
    /// same `validity` token.
    fn lookup(&self, key: &str, validity: &str) -> Option<Arc<[u8]>>;

    fn store(&self, key: &str, validity: &str, content: Vec<u8>, ttl: Option<Duration>);

    fn invalidate(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CachedEntry {
    validity: String,
    content: Arc<[u8]>,
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A thread-safe in-memory cache.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<DashMap<String, CachedEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_live(now));
        before - self.inner.len()
    }
}

impl PipelineCache for InMemoryCache {
    fn lookup(&self, key: &str, validity: &str) -> Option<Arc<[u8]>> {
        let now = Instant::now();
        let hit = {
            let entry = self.inner.get(key)?;
            if !entry.is_live(now) {
                None
            } else if entry.validity == validity {
                Some(entry.content.clone())
            } else {
                return None;
            }
        };
        if hit.is_none() {
            self.inner.remove(key);
            tracing::trace!(key = %key, "Cache entry expired");
        }
        hit
    }

    fn store(&self, key: &str, validity: &str, content: Vec<u8>, ttl: Option<Duration>) {
        self.inner.insert(
            key.to_string(),
            CachedEntry {
                validity: validity.to_string(),
                content: content.into(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    fn invalidate(&self, key: &str) {
        self.inner.remove(key);
    }
}
