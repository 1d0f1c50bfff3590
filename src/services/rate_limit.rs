//! Fixed-window admission control for upstream calls, per logical endpoint.
//!
//! All endpoints share a single window: when it elapses every counter is
//! cleared at once. Bursts straddling a boundary can therefore reach twice
//! the nominal rate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, interval};

/// Logical endpoint names used for admission.
pub mod endpoints {
    pub const TOP: &str = "/api/radio/top";
    pub const RECENT: &str = "/api/radio/recent";
    pub const SEARCH: &str = "/api/radio/search";
    pub const NEARBY: &str = "/api/radio/nearby";
    pub const BY_GENRE: &str = "/api/radio/byGenre";
    pub const GENRES: &str = "/api/radio/genres";
    pub const COUNTRIES: &str = "/api/radio/countries";
    pub const CLICK: &str = "/api/radio/click";
}

/// Ceiling applied to endpoints without a configured limit.
pub const DEFAULT_LIMIT: u32 = 30;

struct Window {
    counts: HashMap<String, u32>,
    started_at: Instant,
}

pub struct RateLimiter {
    window: Duration,
    limits: HashMap<String, u32>,
    state: Mutex<Window>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(window: Duration, limits: HashMap<String, u32>) -> Self {
        Self {
            window,
            limits,
            state: Mutex::new(Window {
                counts: HashMap::new(),
                started_at: Instant::now(),
            }),
        }
    }

    /// Limiter with the per-endpoint ceilings the API is tuned for.
    #[must_use]
    pub fn with_default_limits(window: Duration) -> Self {
        let limits = [
            (endpoints::TOP, 30),
            (endpoints::SEARCH, 60),
            (endpoints::NEARBY, 30),
            (endpoints::BY_GENRE, 40),
            (endpoints::GENRES, 10),
            (endpoints::COUNTRIES, 10),
        ]
        .into_iter()
        .map(|(endpoint, limit)| (endpoint.to_string(), limit))
        .collect();

        Self::new(window, limits)
    }

    #[must_use]
    pub fn limit_for(&self, endpoint: &str) -> u32 {
        self.limits.get(endpoint).copied().unwrap_or(DEFAULT_LIMIT)
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        // Counters stay usable even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `endpoint` is still below its ceiling. Does not count.
    pub fn admit(&self, endpoint: &str) -> bool {
        let count = self.lock().counts.get(endpoint).copied().unwrap_or(0);
        count < self.limit_for(endpoint)
    }

    /// Count one request against `endpoint`.
    pub fn record(&self, endpoint: &str) {
        *self.lock().counts.entry(endpoint.to_string()).or_insert(0) += 1;
    }

    /// `admit` and `record` under one lock, so concurrent callers cannot
    /// both pass on the last free slot.
    pub fn try_acquire(&self, endpoint: &str) -> bool {
        let limit = self.limit_for(endpoint);
        let mut window = self.lock();
        let count = window.counts.entry(endpoint.to_string()).or_insert(0);
        if *count < limit {
            *count += 1;
            true
        } else {
            false
        }
    }

    /// Clear every counter if the window has elapsed. Returns whether it did.
    pub fn sweep(&self) -> bool {
        let mut window = self.lock();
        let now = Instant::now();
        if now.duration_since(window.started_at) >= self.window {
            window.counts.clear();
            window.started_at = now;
            true
        } else {
            false
        }
    }

    /// Run [`sweep`](Self::sweep) every window for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                window_secs = limiter.window.as_secs(),
                "Starting rate limit window sweeper"
            );
            let mut ticker = interval(limiter.window);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if limiter.sweep() {
                    tracing::debug!("Rate limit window reset");
                }
            }
        })
    }
}
