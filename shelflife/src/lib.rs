//! A keyed in-memory cache where every entry carries its own time to live.
//!
//! Expired entries are evicted lazily: a lookup which finds a stale entry
//! removes it and reports a miss. [`TtlCache::sweep`] reclaims every expired
//! entry on demand; nothing runs in the background.
//!
//! [`TtlCache::with_cache`] does not coalesce concurrent misses. Two callers
//! which miss the same key at the same time both run their computation and
//! both store the result, and the last writer wins.

use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt,
    future::Future,
    hash::Hash,
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::Instant;

/// A stored value together with when it was stored and when it expires.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    value: V,
    stored_at: Instant,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let stored_at = Instant::now();
        Entry {
            value,
            stored_at,
            expires_at: stored_at + ttl,
        }
    }

    /// The cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// When the value was stored.
    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    /// After this instant the entry is treated as absent.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// A cache of `V` keyed by `K`.
///
/// Clones share the same storage. The lock is only held for map operations,
/// never across an `.await`.
pub struct TtlCache<K, V> {
    entries: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Default::default(),
        }
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The live value for `key`, evicting it if it has expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).map(|entry| entry.value)
    }

    /// The live entry for `key`, with its timestamps.
    pub fn entry<Q>(&self, key: &Q) -> Option<Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.clone()),
            Some(_) => {}
            None => return None,
        }

        tracing::trace!("evicting expired entry");
        entries.remove(key);
        None
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.entries.lock().insert(key, Entry::new(value, ttl));
    }

    /// Drop the entry for `key`, if any.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every entry whose key matches `predicate`, returning how many were dropped.
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Return the live value for `key`, or run `compute` once and cache its result for `ttl`.
    ///
    /// Errors from `compute` are returned to the caller and never cached.
    pub async fn with_cache<F, Fut, E>(&self, key: K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            tracing::trace!("cache hit");
            return Ok(value);
        }

        tracing::trace!("cache miss");
        let value = compute().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn get_within_ttl() {
        let cache = TtlCache::new();
        cache.set("catalog".to_owned(), vec!["app"], TTL);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("catalog"), Some(vec!["app"]));
    }

    #[tokio::test(start_paused = true)]
    async fn visible_at_exact_expiry() {
        let cache = TtlCache::new();
        cache.set("k", 1, TTL);

        tokio::time::advance(TTL).await;
        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_evicted_on_get() {
        let cache = TtlCache::new();
        cache.set("k", 1, TTL);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_resets_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 1, TTL);
        tokio::time::advance(Duration::from_secs(20)).await;
        cache.set("k", 2, TTL);
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(cache.get("k"), Some(2));
        let entry = cache.entry("k").unwrap();
        assert_eq!(entry.expires_at() - entry.stored_at(), TTL);
    }

    #[test]
    fn remove_and_clear() {
        let cache = TtlCache::new();
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);

        cache.set("c", 3, TTL);
        cache.clear();
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_where_matches_prefix() {
        let cache = TtlCache::new();
        cache.set("v2/app/tags/list".to_owned(), 1, TTL);
        cache.set("v2/app/manifests/1".to_owned(), 2, TTL);
        cache.set("v2/web/tags/list".to_owned(), 3, TTL);

        assert_eq!(cache.remove_where(|key| key.starts_with("v2/app/")), 2);
        assert_eq!(cache.get("v2/web/tags/list"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let cache = TtlCache::new();
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn with_cache_computes_once_within_ttl() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .with_cache("k", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL * 2).await;
        cache
            .with_cache("k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(43)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("k"), Some(43));
    }

    #[tokio::test]
    async fn with_cache_does_not_store_errors() {
        let cache: TtlCache<&str, i32> = TtlCache::new();

        let result = cache
            .with_cache("k", TTL, || async { Err::<i32, _>("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_both_compute() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let compute = |value: i32| {
            let calls = &calls;
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(value as u64)).await;
                Ok::<_, ()>(value)
            }
        };

        let (a, b) = tokio::join!(
            cache.with_cache("k", TTL, compute(1)),
            cache.with_cache("k", TTL, compute(2)),
        );

        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("k"), Some(2), "last writer wins");
    }
}
