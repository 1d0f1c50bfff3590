//! Audio stream relay.
//!
//! Playlist URLs (`.pls`, `.m3u`) are resolved to their first stream entry,
//! the stream is opened with browser-like headers, and its bytes are pumped
//! through a bounded channel into the outgoing body. The channel gives
//! backpressure: a slow listener slows the upstream read, and a disconnected
//! listener stops it.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::Response,
};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{AppError, AppResult};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Chunks buffered between the upstream reader and the listener.
const RELAY_BUFFER_CHUNKS: usize = 32;

/// Headers that describe the upstream connection rather than the content.
const HOP_BY_HOP: &[&str] = &["connection", "keep-alive", "transfer-encoding"];

/// Extension table for streams that arrive without a content type.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("aac", "audio/aac"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("m3u8", "application/vnd.apple.mpegurl"),
];

pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playlist {
    Pls,
    M3u,
}

impl Playlist {
    /// Playlist format implied by the URL suffix, case-insensitively.
    #[must_use]
    pub fn detect(url: &str) -> Option<Self> {
        let lower = url.to_lowercase();
        if lower.ends_with(".pls") {
            Some(Self::Pls)
        } else if lower.ends_with(".m3u") {
            Some(Self::M3u)
        } else {
            None
        }
    }

    /// First stream URL listed in `body`.
    #[must_use]
    pub fn first_entry(self, body: &str) -> Option<String> {
        match self {
            Self::Pls => pls_first_entry(body),
            Self::M3u => m3u_first_entry(body),
        }
    }
}

/// Value of the first `File1=` line.
#[must_use]
pub fn pls_first_entry(body: &str) -> Option<String> {
    let start = body.find("File1=")? + "File1=".len();
    let rest = &body[start..];
    let value = rest.split('\n').next().unwrap_or(rest).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// First line that is neither blank nor a `#` directive.
#[must_use]
pub fn m3u_first_entry(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
}

/// Content type for `url` judged by the extension of its path.
#[must_use]
pub fn infer_content_type(url: &str) -> &'static str {
    let path = reqwest::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());

    let extension = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        // Shoutcast servers append `;` to the mount point.
        .map(|(_, ext)| ext.trim_end_matches(';'));

    extension
        .and_then(|ext| {
            CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, content_type)| *content_type)
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[must_use]
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Upstream headers minus hop-by-hop ones.
#[must_use]
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

async fn fetch_text(client: &Client, url: &str, timeout: Duration) -> reqwest::Result<String> {
    client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Resolve `url` through its playlist if it is one.
///
/// Any failure to fetch or parse the playlist keeps the original URL.
pub async fn resolve_stream_url(client: &Client, url: &str, timeout: Duration) -> String {
    let Some(playlist) = Playlist::detect(url) else {
        return url.to_string();
    };

    tracing::debug!(url = %url, ?playlist, "Fetching playlist");

    match fetch_text(client, url, timeout).await.map(|text| playlist.first_entry(&text)) {
        Ok(Some(stream_url)) => {
            tracing::info!(playlist = %url, stream = %stream_url, "Resolved playlist entry");
            stream_url
        }
        Ok(None) => {
            tracing::warn!(url = %url, "Playlist has no stream entry, relaying it as is");
            url.to_string()
        }
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Failed to fetch playlist");
            url.to_string()
        }
    }
}

/// How the outgoing request looks and which headers the response carries.
#[derive(Debug, Clone, Copy)]
pub struct RelayProfile {
    pub user_agent: &'static str,
    pub accept: &'static str,
    /// Ask for `bytes=0-`; some radio servers only stream to range requests.
    pub range_request: bool,
    /// Forward every non hop-by-hop upstream header instead of content type only.
    pub forward_all_headers: bool,
    /// Fall back to the URL extension when upstream sends no content type.
    pub infer_content_type: bool,
}

impl RelayProfile {
    /// Maximum-compatibility relay behind `/proxy`.
    pub const COMPAT: Self = Self {
        user_agent: BROWSER_USER_AGENT,
        accept: "*/*",
        range_request: true,
        forward_all_headers: true,
        infer_content_type: true,
    };

    /// Plain relay behind `/proxy/stream`.
    pub const DIRECT: Self = Self {
        user_agent: "RadioCast/1.0",
        accept: "audio/mpeg,audio/aac,audio/mp4,application/ogg,audio/*",
        range_request: false,
        forward_all_headers: false,
        infer_content_type: false,
    };
}

/// Open `url` and build a streaming response relaying its body.
///
/// `connect_timeout` bounds the wait for response headers only; the body
/// streams for as long as the station does.
///
/// # Errors
///
/// Returns an `AppError` if upstream cannot be reached in time or answers
/// with a non-success status. Failures after the first byte end the body.
pub async fn open_relay(
    client: &Client,
    url: &str,
    profile: RelayProfile,
    connect_timeout: Duration,
) -> AppResult<Response> {
    let mut request = client
        .get(url)
        .header(header::USER_AGENT, profile.user_agent)
        .header(header::ACCEPT, profile.accept);
    if profile.range_request {
        request = request
            .header(header::ACCEPT_ENCODING, "identity;q=1, *;q=0")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(header::RANGE, "bytes=0-");
    }

    let upstream = tokio::time::timeout(connect_timeout, request.send())
        .await
        .map_err(|_| AppError::Timeout)?
        .map_err(|e| AppError::from_request(&e))?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(AppError::UpstreamStatus {
            status,
            body: format!("stream {url} refused"),
        });
    }

    let upstream_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let mut headers = if profile.forward_all_headers {
        relay_headers(upstream.headers())
    } else {
        HeaderMap::new()
    };

    let content_type = match upstream_type {
        Some(value) => value,
        None if profile.infer_content_type => HeaderValue::from_static(infer_content_type(url)),
        None => HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
    };
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if !profile.forward_all_headers {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }

    tracing::info!(url = %url, status = status.as_u16(), "Relaying stream");

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(RELAY_BUFFER_CHUNKS);
    let source = url.to_string();

    tokio::spawn(async move {
        let mut chunks = upstream.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    if tx.send(Ok(bytes)).await.is_err() {
                        tracing::debug!(url = %source, "Listener disconnected");
                        return;
                    }
                }
                Err(e) => {
                    // Status and headers are already sent; abort the body.
                    tracing::error!(url = %source, error = %e, "Stream error");
                    let _ = tx.send(Err(std::io::Error::other(e))).await;
                    return;
                }
            }
        }
        tracing::debug!(url = %source, "Stream ended");
    });

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    *response.headers_mut() = headers;
    Ok(response)
}
