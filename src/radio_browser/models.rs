use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A station as returned by `/json/stations/*`.
///
/// Field names follow the Radio Browser schema so responses can be passed to
/// the frontend unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Station {
    pub stationuuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_resolved: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub favicon: String,
    /// Genre tags in upstream order. Comma-separated on the wire.
    #[serde(default, with = "comma_list")]
    #[schema(value_type = String, example = "jazz,smooth jazz")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub countrycode: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub bitrate: i64,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub clickcount: i64,
    #[serde(default)]
    pub geo_lat: Option<f64>,
    #[serde(default)]
    pub geo_long: Option<f64>,
    /// Kilometres from the query point (nearby results only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Station {
    /// Ranking weight used when merging result sets.
    #[must_use]
    pub fn popularity(&self) -> i64 {
        self.votes.saturating_add(self.clickcount)
    }

    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.geo_lat.zip(self.geo_long)
    }
}

/// Tag or country entry from `/json/tags` and `/json/countries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryEntry {
    pub name: String,
    /// ISO 3166-1 code (countries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_3166_1: Option<String>,
    #[serde(default)]
    pub stationcount: i64,
}

/// Response from `/json/url/{stationuuid}`, which counts a click.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClickResult {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stationuuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Query for `/json/stations/search`. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StationSearch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(rename = "tagList", skip_serializing_if = "Option::is_none")]
    pub tag_list: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_geo_info: Option<bool>,
    pub limit: usize,
    pub hidebroken: bool,
}

/// Serde adapter between `Vec<String>` and the upstream `"a,b,c"` form.
mod comma_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&tags.join(","))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}
