use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::radio_browser::{CategoryEntry, RadioBrowserClient, Station};
use crate::services::cache::TtlCache;
use crate::services::rate_limit::RateLimiter;
use crate::services::retry::RetryPolicy;

/// Station lists cached for the top, search, genre and nearby kinds.
pub type StationCache = TtlCache<Arc<Vec<Station>>>;

/// A tag or country listing plus the `limit` it was fetched with.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub fetched_limit: usize,
    pub entries: Vec<CategoryEntry>,
}

pub type CatalogCache = TtlCache<Arc<CatalogSnapshot>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub radio_client: Arc<RadioBrowserClient>,
    /// Client for arbitrary station hosts (playlists, streams, URL checks).
    pub stream_client: Client,
    pub stations: Arc<StationCache>,
    pub catalogs: Arc<CatalogCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub retry_policy: RetryPolicy,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let radio_client = RadioBrowserClient::new(&config);

        // No overall timeout: relayed streams are unbounded.
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.stream_connect_timeout_seconds))
            .build()
            .expect("Failed to create stream HTTP client");

        Self {
            radio_client: Arc::new(radio_client),
            stream_client,
            stations: Arc::new(TtlCache::new(config.cache_ttls)),
            catalogs: Arc::new(TtlCache::new(config.cache_ttls)),
            rate_limiter: Arc::new(RateLimiter::with_default_limits(config.rate_limit_window())),
            retry_policy: RetryPolicy::from_config(&config),
            config: Arc::new(config),
        }
    }
}
