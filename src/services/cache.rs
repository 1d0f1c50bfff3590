//! Per-kind TTL cache for aggregated Radio Browser responses.
//!
//! Each [`CacheKind`] has its own lifetime. Parameterized kinds (search,
//! genre, nearby) hold one entry per canonical key; the catalog and top kinds
//! hold a single slot.
//!
//! | Kind | TTL (default) | Key |
//! |------|---------------|-----|
//! | `top` | 5 min | single slot |
//! | `genre` | 15 min | `genre:limit` |
//! | `search` | 10 min | `query:limit` |
//! | `nearby` | 30 min | `lat:lon:radius:limit` |
//! | `genres`, `countries` | 60 min | single slot |
//!
//! Entries are never evicted. An expired entry reads as a miss through
//! [`TtlCache::get`] and is overwritten in place by the next
//! [`TtlCache::set`]; [`TtlCache::peek_stale`] still returns it, which is
//! what the stale fallback relies on.
//!
//! Timestamps use `tokio::time::Instant`, so tests drive expiry with
//! `tokio::time::pause` and `advance`.

use moka::future::Cache;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CacheTtls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Top,
    Genre,
    Search,
    Nearby,
    Genres,
    Countries,
}

impl CacheKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Genre => "genre",
            Self::Search => "search",
            Self::Nearby => "nearby",
            Self::Genres => "genres",
            Self::Countries => "countries",
        }
    }

    #[must_use]
    pub fn ttl(self, ttls: &CacheTtls) -> Duration {
        match self {
            Self::Top => ttls.top,
            Self::Genre => ttls.genre,
            Self::Search => ttls.search,
            Self::Nearby => ttls.nearby,
            Self::Genres | Self::Countries => ttls.catalog,
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

#[derive(Clone)]
struct CacheEntry<V> {
    data: V,
    stored_at: Instant,
}

/// Storage for one value type across all kinds that produce it.
///
/// `V` should be cheap to clone (the handlers store `Arc`s).
pub struct TtlCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    ttls: CacheTtls,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(ttls: CacheTtls) -> Self {
        // No capacity or expiry policy: moka only provides the concurrent map,
        // freshness is decided per read against the kind's TTL.
        Self {
            entries: Cache::builder().build(),
            ttls,
        }
    }

    fn slot(kind: CacheKind, key: Option<&str>) -> String {
        match key {
            Some(k) => cache_key(kind.as_str(), &[k]),
            None => kind.as_str().to_string(),
        }
    }

    /// Fresh data for `(kind, key)`, or `None` when absent or expired.
    pub async fn get(&self, kind: CacheKind, key: Option<&str>) -> Option<V> {
        let slot = Self::slot(kind, key);
        let entry = self.entries.get(&slot).await?;

        if entry.stored_at.elapsed() < kind.ttl(&self.ttls) {
            tracing::debug!(kind = %kind, key = %slot, "cache_hit");
            Some(entry.data)
        } else {
            tracing::debug!(kind = %kind, key = %slot, "cache_expired");
            None
        }
    }

    /// Store `data` under `(kind, key)` stamped now, returning it unchanged.
    pub async fn set(&self, kind: CacheKind, key: Option<&str>, data: V) -> V {
        let slot = Self::slot(kind, key);
        self.entries
            .insert(
                slot.clone(),
                CacheEntry {
                    data: data.clone(),
                    stored_at: Instant::now(),
                },
            )
            .await;

        tracing::debug!(kind = %kind, key = %slot, "cache_stored");
        data
    }

    /// Last data written for `(kind, key)`, regardless of age.
    pub async fn peek_stale(&self, kind: CacheKind, key: Option<&str>) -> Option<V> {
        self.entries
            .get(&Self::slot(kind, key))
            .await
            .map(|entry| entry.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache() -> TtlCache<Arc<Vec<&'static str>>> {
        TtlCache::new(CacheTtls::default())
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_returns_same_data() {
        let cache = cache();
        let data = Arc::new(vec!["a", "b"]);

        let returned = cache.set(CacheKind::Search, Some("jazz:20"), data.clone()).await;
        assert_eq!(returned, data);
        assert_eq!(cache.get(CacheKind::Search, Some("jazz:20")).await, Some(data));
        assert_eq!(cache.get(CacheKind::Search, Some("jazz:10")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_at_ttl_but_stays_peekable() {
        let cache = cache();
        let data = Arc::new(vec!["top"]);
        cache.set(CacheKind::Top, None, data.clone()).await;

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get(CacheKind::Top, None).await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(CacheKind::Top, None).await, None);
        assert_eq!(cache.peek_stale(CacheKind::Top, None).await, Some(data));
    }

    #[tokio::test(start_paused = true)]
    async fn kinds_use_their_own_ttl() {
        let cache = cache();
        cache.set(CacheKind::Top, None, Arc::new(vec!["t"])).await;
        cache.set(CacheKind::Nearby, Some("k"), Arc::new(vec!["n"])).await;

        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        assert!(cache.get(CacheKind::Top, None).await.is_none());
        assert!(cache.get(CacheKind::Nearby, Some("k")).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn rewrite_refreshes_timestamp() {
        let cache = cache();
        cache.set(CacheKind::Genres, None, Arc::new(vec!["old"])).await;
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(cache.get(CacheKind::Genres, None).await.is_none());

        cache.set(CacheKind::Genres, None, Arc::new(vec!["new"])).await;
        assert_eq!(
            cache.get(CacheKind::Genres, None).await,
            Some(Arc::new(vec!["new"]))
        );
    }

    #[tokio::test]
    async fn peek_stale_is_none_when_never_written() {
        let cache = cache();
        assert_eq!(cache.peek_stale(CacheKind::Countries, None).await, None);
    }

    #[test]
    fn singleton_and_keyed_slots_do_not_collide() {
        type C = TtlCache<Arc<Vec<&'static str>>>;
        assert_eq!(C::slot(CacheKind::Top, None), "top");
        assert_eq!(C::slot(CacheKind::Search, Some("top")), "search:top");
        assert_ne!(
            C::slot(CacheKind::Genre, Some("")),
            C::slot(CacheKind::Genre, None)
        );
    }
}
