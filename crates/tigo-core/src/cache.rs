use bytes::Bytes;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cached API response with validation headers.
///
/// The body is a [`Bytes`] buffer, so handing it to several consumers only
/// bumps a reference count.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use tigo_core::cache::CachedResponse;
/// use std::time::Instant;
///
/// let response = CachedResponse {
///     body: Bytes::from_static(b"{\"systems\":[]}"),
///     etag: Some("\"abc123\"".into()),
///     last_modified: None,
///     fetched_at: Instant::now(),
/// };
///
/// let cloned = response.clone();
/// assert_eq!(response.body.as_ptr(), cloned.body.as_ptr());
/// ```
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Bytes,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Instant,
}

impl CachedResponse {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// In-memory cache of API GET responses keyed by full request URL.
///
/// Entries younger than the caller's TTL are served directly. Older entries
/// keep their `ETag` / `Last-Modified` validators so the transport can issue a
/// conditional request and reuse the body on `304 Not Modified`, or fall back
/// to it when the API is unreachable.
///
/// The cache is bounded; once `max_entries` is reached the oldest tenth is
/// evicted before the next insert.
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the body if it was fetched less than `ttl` ago.
    pub fn fresh(&self, url: &str, ttl: Duration) -> Option<Bytes> {
        self.entries
            .get(url)
            .filter(|entry| entry.age() < ttl)
            .map(|entry| entry.body.clone())
    }

    /// Returns the entry regardless of age.
    pub fn entry(&self, url: &str) -> Option<CachedResponse> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    pub fn store(
        &self,
        url: &str,
        body: Bytes,
        etag: Option<String>,
        last_modified: Option<String>,
    ) {
        if !self.entries.contains_key(url) && self.entries.len() >= self.max_entries {
            self.evict_entries();
        }

        self.entries.insert(
            url.to_string(),
            CachedResponse {
                body,
                etag,
                last_modified,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Marks an entry as revalidated (after a `304 Not Modified`).
    pub fn touch(&self, url: &str) {
        if let Some(mut entry) = self.entries.get_mut(url) {
            entry.fetched_at = Instant::now();
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts roughly 10% of entries, oldest first.
    fn evict_entries(&self) {
        let target_removals = (self.max_entries / 10).max(1);

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at))
            .collect();
        by_age.sort_by_key(|(_, fetched_at)| *fetched_at);

        let mut removed = 0;
        for (url, _) in by_age.iter().take(target_removals) {
            self.entries.remove(url);
            removed += 1;
        }

        tracing::debug!("evicted {} cache entries", removed);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_creation() {
        let cache = ResponseCache::new(10);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_and_fresh() {
        let cache = ResponseCache::new(10);
        cache.store("https://a/x", Bytes::from_static(b"data"), None, None);

        let body = cache.fresh("https://a/x", Duration::from_secs(60)).unwrap();
        assert_eq!(&body[..], b"data");
        assert!(cache.fresh("https://a/y", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_expired_entry_not_fresh_but_kept() {
        let cache = ResponseCache::new(10);
        cache.store(
            "https://a/x",
            Bytes::from_static(b"old"),
            Some("\"v1\"".into()),
            None,
        );

        assert!(cache.fresh("https://a/x", Duration::ZERO).is_none());
        let entry = cache.entry("https://a/x").unwrap();
        assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
        assert!(entry.last_modified.is_none());
    }

    #[test]
    fn test_touch_refreshes_age() {
        let cache = ResponseCache::new(10);
        cache.store("https://a/x", Bytes::from_static(b"data"), None, None);
        let before = cache.entry("https://a/x").unwrap().fetched_at;

        std::thread::sleep(Duration::from_millis(5));
        cache.touch("https://a/x");

        let after = cache.entry("https://a/x").unwrap().fetched_at;
        assert!(after > before);
    }

    #[test]
    fn test_cache_clear() {
        let cache = ResponseCache::new(10);
        cache.store("a", Bytes::new(), None, None);
        cache.store("b", Bytes::new(), None, None);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let cache = ResponseCache::new(10);
        for i in 0..10 {
            cache.store(&format!("url{}", i), Bytes::new(), None, None);
            std::thread::sleep(Duration::from_millis(2));
        }

        cache.store("fresh", Bytes::new(), None, None);

        assert_eq!(cache.len(), 10);
        assert!(cache.entry("url0").is_none());
        assert!(cache.entry("url1").is_some());
        assert!(cache.entry("fresh").is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = ResponseCache::new(2);
        cache.store("a", Bytes::from_static(b"1"), None, None);
        cache.store("b", Bytes::from_static(b"2"), None, None);
        cache.store("a", Bytes::from_static(b"3"), None, None);

        assert_eq!(cache.len(), 2);
        assert_eq!(&cache.entry("a").unwrap().body[..], b"3");
    }

    #[test]
    fn test_cached_response_clone_shares_body() {
        let response = CachedResponse {
            body: Bytes::from(vec![1, 2, 3]),
            etag: Some("test".into()),
            last_modified: Some("date".into()),
            fetched_at: Instant::now(),
        };
        let cloned = response.clone();
        assert_eq!(response.body.as_ptr(), cloned.body.as_ptr());
        assert_eq!(response.etag, cloned.etag);
    }
}
