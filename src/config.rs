use std::env;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Frontend origins allowed to call the JSON API.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://radiocast-global-waves.vercel.app",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

/// Per-kind cache lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub top: Duration,
    pub genre: Duration,
    pub search: Duration,
    pub nearby: Duration,
    pub catalog: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            top: Duration::from_secs(5 * 60),
            genre: Duration::from_secs(15 * 60),
            search: Duration::from_secs(10 * 60),
            nearby: Duration::from_secs(30 * 60),
            catalog: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // API settings
    pub api_host: String,
    pub api_port: u16,
    pub cors_allowed_origins: Vec<String>,

    // Radio Browser API
    pub radio_browser_base_url: Url,
    pub radio_browser_user_agent: String,

    // Retry executor
    pub retry_max_attempts: u32,
    pub retry_base_timeout_ms: u64,

    // Per-endpoint upstream admission
    pub rate_limit_window_seconds: u64,

    // Caching
    pub cache_ttls: CacheTtls,

    // Stream relay
    pub stream_connect_timeout_seconds: u64,
    pub playlist_timeout_seconds: u64,
    pub check_url_timeout_seconds: u64,

    // Per-client limiting on the relay routes
    pub disable_rate_limiting: bool,
    pub stream_rate_limit_replenish_seconds: u64,
    pub stream_rate_limit_burst: u32,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 3001,
            cors_allowed_origins: DEFAULT_CORS_ORIGINS
                .iter()
                .map(ToString::to_string)
                .collect(),
            radio_browser_base_url: Url::parse("https://de1.api.radio-browser.info")
                .expect("Default Radio Browser URL is valid"),
            radio_browser_user_agent: "RadioCast/1.0".to_string(),
            retry_max_attempts: 3,
            retry_base_timeout_ms: 10_000,
            rate_limit_window_seconds: 60,
            cache_ttls: CacheTtls::default(),
            stream_connect_timeout_seconds: 10,
            playlist_timeout_seconds: 5,
            check_url_timeout_seconds: 5,
            disable_rate_limiting: false,
            stream_rate_limit_replenish_seconds: 1,
            stream_rate_limit_burst: 20,
            deployment: Deployment::Local,
        }
    }
}

/// Read `name` and parse it, keeping `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_or(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(name, default.as_secs()))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every setting has a default; only a malformed upstream base URL is fatal.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `RADIO_BROWSER_BASE_URL` is not a URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let radio_browser_base_url = match env::var("RADIO_BROWSER_BASE_URL") {
            Ok(raw) => Url::parse(raw.trim())
                .map_err(|_| ConfigError::Invalid("RADIO_BROWSER_BASE_URL", raw))?,
            Err(_) => defaults.radio_browser_base_url,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or(defaults.cors_allowed_origins);

        let ttl = defaults.cache_ttls;

        Ok(Self {
            // API settings
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env::var("PORT")
                .or_else(|_| env::var("API_PORT"))
                .ok()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.api_port),
            cors_allowed_origins,

            // Radio Browser API
            radio_browser_base_url,
            radio_browser_user_agent: env::var("RADIO_BROWSER_USER_AGENT")
                .unwrap_or(defaults.radio_browser_user_agent),

            // Retry executor
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts).max(1),
            retry_base_timeout_ms: env_or("RETRY_BASE_TIMEOUT_MS", defaults.retry_base_timeout_ms),

            rate_limit_window_seconds: env_or(
                "RATE_LIMIT_WINDOW_SECONDS",
                defaults.rate_limit_window_seconds,
            )
            .max(1),

            // Caching
            cache_ttls: CacheTtls {
                top: secs_or("CACHE_TOP_TTL_SECONDS", ttl.top),
                genre: secs_or("CACHE_GENRE_TTL_SECONDS", ttl.genre),
                search: secs_or("CACHE_SEARCH_TTL_SECONDS", ttl.search),
                nearby: secs_or("CACHE_NEARBY_TTL_SECONDS", ttl.nearby),
                catalog: secs_or("CACHE_CATALOG_TTL_SECONDS", ttl.catalog),
            },

            // Stream relay
            stream_connect_timeout_seconds: env_or(
                "STREAM_CONNECT_TIMEOUT_SECONDS",
                defaults.stream_connect_timeout_seconds,
            ),
            playlist_timeout_seconds: env_or(
                "PLAYLIST_TIMEOUT_SECONDS",
                defaults.playlist_timeout_seconds,
            ),
            check_url_timeout_seconds: env_or(
                "CHECK_URL_TIMEOUT_SECONDS",
                defaults.check_url_timeout_seconds,
            ),

            disable_rate_limiting: env_or("DISABLE_RATE_LIMITING", defaults.disable_rate_limiting),
            stream_rate_limit_replenish_seconds: env_or(
                "STREAM_RATE_LIMIT_REPLENISH_SECONDS",
                defaults.stream_rate_limit_replenish_seconds,
            ),
            stream_rate_limit_burst: env_or(
                "STREAM_RATE_LIMIT_BURST",
                defaults.stream_rate_limit_burst,
            ),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
