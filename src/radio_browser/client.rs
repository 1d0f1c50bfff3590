use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::radio_browser::models::{CategoryEntry, ClickResult, Station, StationSearch};

/// Category listings served by `/json/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Tags,
    Countries,
}

impl Category {
    fn path(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Countries => "countries",
        }
    }
}

#[derive(Serialize)]
struct ListQuery {
    limit: usize,
    hidebroken: bool,
}

#[derive(Serialize)]
struct CategoryQuery {
    order: &'static str,
    reverse: bool,
    limit: usize,
}

pub struct RadioBrowserClient {
    http_client: Client,
    base_url: Url,
}

impl RadioBrowserClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        // Per-attempt deadlines come from the retry executor; this is a backstop.
        let http_client = Client::builder()
            .user_agent(config.radio_browser_user_agent.as_str())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: config.radio_browser_base_url.clone(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!("Base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T, Q>(&self, segments: &[&str], query: &Q) -> AppResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;

        let response = self
            .http_client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::from_request(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::from_request(&e))?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                url = %url,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse Radio Browser response"
            );
            AppError::Upstream(format!("Failed to parse response: {e}"))
        })
    }

    /// Stations ordered by vote count, broken streams hidden.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn top_voted(&self, limit: usize) -> AppResult<Vec<Station>> {
        self.get_json(
            &["json", "stations", "topvote"],
            &ListQuery {
                limit,
                hidebroken: true,
            },
        )
        .await
    }

    /// Most recently clicked stations.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn recently_clicked(&self, limit: usize) -> AppResult<Vec<Station>> {
        self.get_json(
            &["json", "stations", "lastclick"],
            &ListQuery {
                limit,
                hidebroken: true,
            },
        )
        .await
    }

    /// Stations carrying `tag`.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn by_tag(&self, tag: &str, limit: usize) -> AppResult<Vec<Station>> {
        self.get_json(
            &["json", "stations", "bytag", tag],
            &ListQuery {
                limit,
                hidebroken: true,
            },
        )
        .await
    }

    /// Advanced station search.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn search_stations(&self, search: &StationSearch<'_>) -> AppResult<Vec<Station>> {
        self.get_json(&["json", "stations", "search"], search).await
    }

    /// Category listing ordered by station count, largest first.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn category(&self, category: Category, limit: usize) -> AppResult<Vec<CategoryEntry>> {
        self.get_json(
            &["json", category.path()],
            &CategoryQuery {
                order: "stationcount",
                reverse: true,
                limit,
            },
        )
        .await
    }

    /// Count a play of `stationuuid` upstream.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if the request fails or returns an error status.
    pub async fn click(&self, stationuuid: &str) -> AppResult<ClickResult> {
        self.get_json(&["json", "url", stationuuid], &[] as &[(&str, &str)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RadioBrowserClient {
        let config = Config {
            radio_browser_base_url: Url::parse(base).unwrap(),
            ..Config::default()
        };
        RadioBrowserClient::new(&config)
    }

    #[test]
    fn endpoint_appends_segments_to_base() {
        let c = client("https://de1.api.radio-browser.info");
        assert_eq!(
            c.endpoint(&["json", "stations", "topvote"]).unwrap().as_str(),
            "https://de1.api.radio-browser.info/json/stations/topvote"
        );

        let c = client("http://127.0.0.1:9000/mirror/");
        assert_eq!(
            c.endpoint(&["json", "tags"]).unwrap().as_str(),
            "http://127.0.0.1:9000/mirror/json/tags"
        );
    }

    #[test]
    fn endpoint_escapes_path_values() {
        let c = client("https://de1.api.radio-browser.info");
        assert_eq!(
            c.endpoint(&["json", "stations", "bytag", "drum & bass/dnb"])
                .unwrap()
                .as_str(),
            "https://de1.api.radio-browser.info/json/stations/bytag/drum%20&%20bass%2Fdnb"
        );
    }
}
