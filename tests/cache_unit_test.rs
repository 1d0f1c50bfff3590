//! Unit tests for the response cache.
//!
//! Run with: cargo test --test cache_unit_test

use radiocast_proxy::config::CacheTtls;
use radiocast_proxy::services::cache::{CacheKind, TtlCache, cache_key};
use std::time::Duration;

#[test]
fn cache_key_builds_correctly() {
    assert_eq!(cache_key("jazz", &[]), "jazz");
    assert_eq!(cache_key("jazz", &["20"]), "jazz:20");

    // Empty components preserved (ensures query uniqueness)
    assert_ne!(cache_key("jazz", &["", "20"]), cache_key("jazz", &["20"]));
}

#[tokio::test(start_paused = true)]
async fn each_kind_expires_on_its_own_ttl() {
    let cache: TtlCache<Vec<u32>> = TtlCache::new(CacheTtls::default());

    cache.set(CacheKind::Top, None, vec![1]).await;
    cache.set(CacheKind::Nearby, Some("48.86:2.35:500:20"), vec![2]).await;

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(cache.get(CacheKind::Top, None).await, None);
    assert_eq!(
        cache.get(CacheKind::Nearby, Some("48.86:2.35:500:20")).await,
        Some(vec![2])
    );

    // Expired entries are still reachable for fallbacks.
    assert_eq!(cache.peek_stale(CacheKind::Top, None).await, Some(vec![1]));
}

#[tokio::test(start_paused = true)]
async fn keys_are_scoped_by_kind() {
    let cache: TtlCache<&'static str> = TtlCache::new(CacheTtls::default());

    cache.set(CacheKind::Search, Some("rock:20"), "search").await;
    cache.set(CacheKind::Genre, Some("rock:20"), "genre").await;

    assert_eq!(cache.get(CacheKind::Search, Some("rock:20")).await, Some("search"));
    assert_eq!(cache.get(CacheKind::Genre, Some("rock:20")).await, Some("genre"));
    assert_eq!(cache.get(CacheKind::Search, Some("rock:10")).await, None);
}
