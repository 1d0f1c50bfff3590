use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;
use std::time::Duration;

use super::types::{
    ClickResponse, GenreQuery, LimitQuery, NearbyQuery, ProbeStatus, SearchQuery, UrlCheckResponse,
    UrlQuery, positive_or,
};
use crate::common::AppState;
use crate::error::{ApiError, AppError};
use crate::radio_browser::{Station, StationSearch};
use crate::services::aggregate::{merge_unique, nearest, rank_by_popularity};
use crate::services::cache::{CacheKind, cache_key};
use crate::services::rate_limit::endpoints;
use crate::services::retry::with_retry;

type StationsResult = Result<Json<Vec<Station>>, ApiError>;

fn first(stations: &[Station], limit: usize) -> Vec<Station> {
    stations.iter().take(limit).cloned().collect()
}

/// Top-voted stations
///
/// Over-fetches and caches at least 100 stations so smaller limits are served
/// from cache. When Radio Browser fails, the last cached list is returned
/// whatever its age.
#[utoipa::path(
    get,
    path = "/api/radio/top",
    params(LimitQuery),
    responses(
        (status = 200, description = "Stations ordered by votes", body = Vec<Station>),
        (status = 429, description = "Upstream rate limit reached"),
        (status = 500, description = "Upstream failure and nothing cached"),
    ),
    tag = "stations"
)]
pub async fn top_stations(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> StationsResult {
    let limit = query.limit();

    if let Some(cached) = state.stations.get(CacheKind::Top, None).await {
        return Ok(Json(first(&cached, limit)));
    }

    let fetch_limit = limit.max(100);
    tracing::info!(limit, fetch_limit, "Fetching top stations from Radio Browser");

    let client = &*state.radio_client;
    let fetched = with_retry(&state.rate_limiter, endpoints::TOP, &state.retry_policy, move || {
        client.top_voted(fetch_limit)
    })
    .await;

    match fetched {
        Ok(stations) => {
            tracing::info!(count = stations.len(), "Fetched top stations");
            let stations = state
                .stations
                .set(CacheKind::Top, None, Arc::new(stations))
                .await;
            Ok(Json(first(&stations, limit)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Error fetching top stations");
            if let Some(stale) = state.stations.peek_stale(CacheKind::Top, None).await {
                tracing::warn!("Returning expired top stations due to upstream error");
                return Ok(Json(first(&stale, limit)));
            }
            Err(e.context("Error fetching top stations from Radio-Browser API"))
        }
    }
}

/// Recently played stations
#[utoipa::path(
    get,
    path = "/api/radio/recent",
    params(LimitQuery),
    responses(
        (status = 200, description = "Stations ordered by last click", body = Vec<Station>),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "stations"
)]
pub async fn recent_stations(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> StationsResult {
    let limit = query.limit();
    let client = &*state.radio_client;

    let stations = with_retry(&state.rate_limiter, endpoints::RECENT, &state.retry_policy, move || {
        client.recently_clicked(limit)
    })
    .await
    .map_err(|e| e.context("Error fetching recently played stations from Radio-Browser API"))?;

    tracing::info!(count = stations.len(), "Fetched recently played stations");
    Ok(Json(stations))
}

/// Search stations by name and tag
///
/// Runs a name search and a tag search concurrently and merges them, most
/// popular first.
#[utoipa::path(
    get,
    path = "/api/radio/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching stations", body = Vec<Station>),
        (status = 400, description = "Missing query"),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "stations"
)]
pub async fn search_stations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> StationsResult {
    const CONTEXT: &str = "Error searching stations from Radio-Browser API";

    let term = query
        .query
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::BadRequest("Search query parameter is required".into()).context(CONTEXT));
    }
    let limit = positive_or(query.limit.as_deref(), 20);

    let key = cache_key(&term, &[&limit.to_string()]);
    if let Some(cached) = state.stations.get(CacheKind::Search, Some(&key)).await {
        return Ok(Json(cached.to_vec()));
    }

    tracing::info!(query = %term, limit, "Searching Radio Browser");

    let fetch_limit = limit.max(50);
    let by_name = StationSearch {
        name: Some(&term),
        limit: fetch_limit,
        hidebroken: true,
        ..StationSearch::default()
    };
    let by_tag = StationSearch {
        tag_list: Some(&term),
        limit: fetch_limit,
        hidebroken: true,
        ..StationSearch::default()
    };

    let client = &*state.radio_client;
    let (by_name, by_tag) = (&by_name, &by_tag);
    let (name_hits, tag_hits) =
        with_retry(&state.rate_limiter, endpoints::SEARCH, &state.retry_policy, move || async move {
            tokio::try_join!(client.search_stations(by_name), client.search_stations(by_tag))
        })
        .await
        .map_err(|e| e.context(CONTEXT))?;

    let stations = rank_by_popularity(merge_unique([name_hits, tag_hits]), limit);
    tracing::info!(query = %term, count = stations.len(), "Search complete");

    let stations = state
        .stations
        .set(CacheKind::Search, Some(&key), Arc::new(stations))
        .await;
    Ok(Json(stations.to_vec()))
}

/// Stations tagged with a genre
#[utoipa::path(
    get,
    path = "/api/radio/byGenre",
    params(GenreQuery),
    responses(
        (status = 200, description = "Stations carrying the tag", body = Vec<Station>),
        (status = 400, description = "Missing genre"),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "stations"
)]
pub async fn stations_by_genre(
    State(state): State<AppState>,
    Query(query): Query<GenreQuery>,
) -> StationsResult {
    const CONTEXT: &str = "Error fetching stations by genre";

    let genre = query.genre.as_deref().map(str::trim).unwrap_or_default();
    if genre.is_empty() {
        return Err(AppError::BadRequest("Genre parameter is required".into()).context(CONTEXT));
    }
    let limit = positive_or(query.limit.as_deref(), 20);

    let key = cache_key(&genre.to_lowercase(), &[&limit.to_string()]);
    if let Some(cached) = state.stations.get(CacheKind::Genre, Some(&key)).await {
        return Ok(Json(cached.to_vec()));
    }

    tracing::info!(genre, limit, "Fetching stations by genre");

    let client = &*state.radio_client;
    let stations = with_retry(&state.rate_limiter, endpoints::BY_GENRE, &state.retry_policy, move || {
        client.by_tag(genre, limit)
    })
    .await
    .map_err(|e| e.context(CONTEXT))?;

    tracing::info!(genre, count = stations.len(), "Fetched stations by genre");
    let stations = state
        .stations
        .set(CacheKind::Genre, Some(&key), Arc::new(stations))
        .await;
    Ok(Json(stations.to_vec()))
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Stations near a point
///
/// Combines stations from the caller's country with geotagged stations,
/// keeps those within `radius` km and orders them by distance.
#[utoipa::path(
    get,
    path = "/api/radio/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Stations with a `distance` in km", body = Vec<Station>),
        (status = 400, description = "Invalid coordinates"),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "stations"
)]
pub async fn nearby_stations(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> StationsResult {
    const CONTEXT: &str = "Error finding nearby stations";

    let (Some(lat), Some(lon)) = (
        parse_coordinate(query.lat.as_deref()),
        parse_coordinate(query.lon.as_deref()),
    ) else {
        return Err(
            AppError::BadRequest("Valid latitude and longitude are required".into()).context(CONTEXT),
        );
    };
    let limit = positive_or(query.limit.as_deref(), 20);
    let radius = positive_or(query.radius.as_deref(), 500);

    // Rounded so nearby map positions share an entry.
    let key = format!("{lat:.2}:{lon:.2}:{radius}:{limit}");
    if let Some(cached) = state.stations.get(CacheKind::Nearby, Some(&key)).await {
        return Ok(Json(cached.to_vec()));
    }

    tracing::info!(lat, lon, radius, limit, "Finding nearby stations");

    let fetch_limit = limit.saturating_mul(2).max(100);
    let by_country = StationSearch {
        countrycode: Some("auto"),
        limit: fetch_limit,
        hidebroken: true,
        ..StationSearch::default()
    };
    let geotagged = StationSearch {
        has_geo_info: Some(true),
        limit: fetch_limit,
        hidebroken: true,
        ..StationSearch::default()
    };

    let client = &*state.radio_client;
    let (by_country, geotagged) = (&by_country, &geotagged);
    let (country_hits, geo_hits) =
        with_retry(&state.rate_limiter, endpoints::NEARBY, &state.retry_policy, move || async move {
            tokio::try_join!(client.search_stations(by_country), client.search_stations(geotagged))
        })
        .await
        .map_err(|e| e.context(CONTEXT))?;

    #[allow(clippy::cast_precision_loss)]
    let radius_km = radius as f64;
    let stations = nearest(merge_unique([country_hits, geo_hits]), (lat, lon), radius_km, limit);
    tracing::info!(lat, lon, count = stations.len(), "Found nearby stations");

    let stations = state
        .stations
        .set(CacheKind::Nearby, Some(&key), Arc::new(stations))
        .await;
    Ok(Json(stations.to_vec()))
}

/// Upstream identifiers are UUIDs; local catalogue ids never contain a hyphen.
fn is_upstream_id(id: &str) -> bool {
    id.contains('-')
}

/// Count a play of a station
#[utoipa::path(
    get,
    path = "/api/radio/click/{stationuuid}",
    params(
        ("stationuuid" = String, Path, description = "Radio Browser station UUID or local station id"),
    ),
    responses(
        (status = 200, description = "Play recorded", body = ClickResponse),
        (status = 400, description = "Missing station id"),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "stations"
)]
pub async fn track_click(
    State(state): State<AppState>,
    Path(stationuuid): Path<String>,
) -> Result<Json<ClickResponse>, ApiError> {
    const CONTEXT: &str = "Error tracking station play";

    let id = stationuuid.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("Station UUID is required".into()).context(CONTEXT));
    }

    if !is_upstream_id(id) {
        tracing::debug!(station = id, "Local station, play not forwarded");
        return Ok(Json(ClickResponse {
            success: true,
            result: None,
        }));
    }

    let client = &*state.radio_client;
    let result = with_retry(&state.rate_limiter, endpoints::CLICK, &state.retry_policy, move || {
        client.click(id)
    })
    .await
    .map_err(|e| e.context(CONTEXT))?;

    tracing::info!(station = id, ok = result.ok, "Tracked station play");
    Ok(Json(ClickResponse {
        success: true,
        result: Some(result),
    }))
}

fn is_playable(status: u16, content_type: &str) -> bool {
    (200..400).contains(&status)
        && ["audio", "stream", "mpegurl", "octet-stream"]
            .iter()
            .any(|marker| content_type.contains(marker))
}

/// Probe whether a stream URL looks playable
///
/// Never fails on upstream problems: they are reported as `isPlayable: false`.
#[utoipa::path(
    get,
    path = "/api/radio/check-url",
    params(UrlQuery),
    responses(
        (status = 200, description = "Probe result", body = UrlCheckResponse),
        (status = 400, description = "Missing url"),
    ),
    tag = "stations"
)]
pub async fn check_url(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<UrlCheckResponse>, ApiError> {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return Err(AppError::BadRequest("URL parameter is required".into())
            .context("Error checking stream URL"));
    };

    tracing::info!(url = %url, "Testing stream URL");

    let probe = state
        .stream_client
        .head(&url)
        .timeout(Duration::from_secs(state.config.check_url_timeout_seconds))
        .send()
        .await;

    let response = match probe {
        Ok(response) => {
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            UrlCheckResponse {
                is_playable: is_playable(status, &content_type),
                url,
                status: ProbeStatus::Code(status),
                content_type,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Error checking URL");
            UrlCheckResponse {
                url,
                status: ProbeStatus::Failed("error".to_string()),
                content_type: "unknown".to_string(),
                is_playable: false,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}
