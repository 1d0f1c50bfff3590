use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;

use crate::common::AppState;
use crate::routes::stations::UrlQuery;
use crate::services::stream::{RelayProfile, open_relay, resolve_stream_url};

fn requested_url(query: UrlQuery) -> Option<String> {
    query
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
}

/// Relay an audio stream, resolving `.pls`/`.m3u` playlists first
#[utoipa::path(
    get,
    path = "/proxy",
    params(UrlQuery),
    responses(
        (status = 200, description = "Audio bytes relayed from the station"),
        (status = 400, description = "Missing url"),
        (status = 500, description = "Station unreachable"),
    ),
    tag = "proxy"
)]
pub async fn proxy(State(state): State<AppState>, Query(query): Query<UrlQuery>) -> Response {
    let Some(url) = requested_url(query) else {
        return (StatusCode::BAD_REQUEST, "URL parameter is required").into_response();
    };

    let config = &state.config;
    let stream_url = resolve_stream_url(
        &state.stream_client,
        &url,
        Duration::from_secs(config.playlist_timeout_seconds),
    )
    .await;

    match open_relay(
        &state.stream_client,
        &stream_url,
        RelayProfile::COMPAT,
        Duration::from_secs(config.stream_connect_timeout_seconds),
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(url = %stream_url, error = %e, "Proxy error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                format!("Error proxying request: {e}"),
            )
                .into_response()
        }
    }
}

/// Relay an audio stream as is
#[utoipa::path(
    get,
    path = "/proxy/stream",
    params(UrlQuery),
    responses(
        (status = 200, description = "Audio bytes relayed from the station"),
        (status = 400, description = "Missing url"),
        (status = 500, description = "Station unreachable"),
    ),
    tag = "proxy"
)]
pub async fn proxy_stream(State(state): State<AppState>, Query(query): Query<UrlQuery>) -> Response {
    let Some(url) = requested_url(query) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Stream URL is required" })),
        )
            .into_response();
    };

    match open_relay(
        &state.stream_client,
        &url,
        RelayProfile::DIRECT,
        Duration::from_secs(state.config.stream_connect_timeout_seconds),
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Stream proxy error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                Json(json!({ "error": "Failed to proxy stream", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_urls_are_missing() {
        assert_eq!(requested_url(UrlQuery { url: None }), None);
        assert_eq!(requested_url(UrlQuery { url: Some("  ".into()) }), None);
        assert_eq!(
            requested_url(UrlQuery {
                url: Some(" http://r/live.mp3 ".into())
            })
            .as_deref(),
            Some("http://r/live.mp3")
        );
    }
}
