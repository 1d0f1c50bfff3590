use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::radio_browser::ClickResult;

/// Lenient positive integer parsing: the leading digits count, trailing
/// junk is ignored (`"10.5"` is 10), anything else means "default".
pub(crate) fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.map(str::trim_start)
        .and_then(|s| {
            let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
            s[..digits].parse::<usize>().ok()
        })
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitQuery {
    /// Maximum number of stations (default 20)
    pub limit: Option<String>,
}

impl LimitQuery {
    #[must_use]
    pub fn limit(&self) -> usize {
        positive_or(self.limit.as_deref(), 20)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free-text term matched against station names and tags
    pub query: Option<String>,
    /// Maximum number of stations (default 20)
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GenreQuery {
    /// Tag to list stations for
    pub genre: Option<String>,
    /// Maximum number of stations (default 20)
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyQuery {
    /// Latitude in degrees
    pub lat: Option<String>,
    /// Longitude in degrees
    pub lon: Option<String>,
    /// Maximum number of stations (default 20)
    pub limit: Option<String>,
    /// Search radius in kilometres (default 500)
    pub radius: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UrlQuery {
    /// Absolute URL of the stream
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClickResponse {
    pub success: bool,
    /// Upstream acknowledgement; absent for local stations
    pub result: Option<ClickResult>,
}

/// HTTP status of the probe, or `"error"` when it could not complete.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ProbeStatus {
    Code(u16),
    Failed(String),
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlCheckResponse {
    pub url: String,
    pub status: ProbeStatus,
    pub content_type: String,
    pub is_playable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
