pub mod catalog;
pub mod health;
pub mod proxy;
pub mod stations;

use axum::{Router, http::HeaderValue, http::Method, routing::get};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        stations::top_stations,
        stations::recent_stations,
        stations::search_stations,
        stations::stations_by_genre,
        stations::nearby_stations,
        stations::track_click,
        stations::check_url,
        catalog::list_genres,
        catalog::list_countries,
        proxy::proxy,
        proxy::proxy_stream,
    ),
    components(
        schemas(
            crate::radio_browser::Station,
            crate::radio_browser::CategoryEntry,
            crate::radio_browser::ClickResult,
            stations::ClickResponse,
            stations::UrlCheckResponse,
            stations::ProbeStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "stations", description = "Cached and merged Radio Browser station lists"),
        (name = "catalog", description = "Genre and country listings"),
        (name = "proxy", description = "Audio stream relay"),
    ),
    info(
        title = "RadioCast Proxy API",
        description = "Caching Radio Browser proxy and audio stream relay",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// JSON API CORS: only the configured frontend origins.
fn api_cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
}

pub fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let radio_routes = Router::new()
        .route("/top", get(stations::top_stations))
        .route("/recent", get(stations::recent_stations))
        .route("/search", get(stations::search_stations))
        .route("/check-url", get(stations::check_url))
        .route("/byGenre", get(stations::stations_by_genre))
        .route("/genres", get(catalog::list_genres))
        .route("/countries", get(catalog::list_countries))
        .route("/click/{stationuuid}", get(stations::track_click))
        .route("/nearby", get(stations::nearby_stations));

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let api_routes = Router::new()
        .nest("/api/radio", radio_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(api_cors(&config));

    // Stream relays set their own wildcard CORS header and are never compressed.
    let proxy_routes_base = Router::new()
        .route("/proxy", get(proxy::proxy))
        .route("/proxy/stream", get(proxy::proxy_stream));

    let proxy_routes = if config.disable_rate_limiting {
        tracing::warn!("Per-client stream rate limiting DISABLED");
        proxy_routes_base
    } else {
        let limiter = GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(config.stream_rate_limit_replenish_seconds)
            .burst_size(config.stream_rate_limit_burst)
            .finish();

        match limiter {
            Some(limiter) => {
                tracing::info!(
                    replenish_secs = config.stream_rate_limit_replenish_seconds,
                    burst = config.stream_rate_limit_burst,
                    "Per-client stream rate limiting configured"
                );
                proxy_routes_base.layer(GovernorLayer {
                    config: Arc::new(limiter),
                })
            }
            None => {
                tracing::error!(
                    replenish_secs = config.stream_rate_limit_replenish_seconds,
                    burst = config.stream_rate_limit_burst,
                    "Invalid stream rate limit, relays left unlimited"
                );
                proxy_routes_base
            }
        }
    };

    Router::new()
        .merge(api_routes)
        .merge(proxy_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
