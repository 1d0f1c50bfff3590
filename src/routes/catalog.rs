use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::common::{AppState, CatalogSnapshot};
use crate::error::ApiError;
use crate::radio_browser::{Category, CategoryEntry};
use crate::routes::stations::positive_or;
use crate::services::cache::CacheKind;
use crate::services::rate_limit::endpoints;
use crate::services::retry::with_retry;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CatalogQuery {
    /// Maximum number of entries
    pub limit: Option<String>,
}

struct CatalogSpec {
    category: Category,
    kind: CacheKind,
    endpoint: &'static str,
    default_limit: usize,
    context: &'static str,
}

const GENRES: CatalogSpec = CatalogSpec {
    category: Category::Tags,
    kind: CacheKind::Genres,
    endpoint: endpoints::GENRES,
    default_limit: 50,
    context: "Error fetching genres from Radio-Browser API",
};

const COUNTRIES: CatalogSpec = CatalogSpec {
    category: Category::Countries,
    kind: CacheKind::Countries,
    endpoint: endpoints::COUNTRIES,
    default_limit: 100,
    context: "Error fetching countries from Radio-Browser API",
};

/// Serve a single-slot catalog, refetching when the cached listing is stale
/// or was fetched with a smaller limit than requested.
async fn catalog(
    state: &AppState,
    spec: &CatalogSpec,
    query: &CatalogQuery,
) -> Result<Json<Vec<CategoryEntry>>, ApiError> {
    let limit = positive_or(query.limit.as_deref(), spec.default_limit);

    if let Some(cached) = state.catalogs.get(spec.kind, None).await
        && cached.fetched_limit >= limit
    {
        return Ok(Json(cached.entries.iter().take(limit).cloned().collect()));
    }

    tracing::info!(kind = %spec.kind, limit, "Fetching catalog from Radio Browser");

    let client = &*state.radio_client;
    let category = spec.category;
    let entries = with_retry(&state.rate_limiter, spec.endpoint, &state.retry_policy, move || {
        client.category(category, limit)
    })
    .await
    .map_err(|e| e.context(spec.context))?;

    tracing::info!(kind = %spec.kind, count = entries.len(), "Fetched catalog");

    let snapshot = state
        .catalogs
        .set(
            spec.kind,
            None,
            Arc::new(CatalogSnapshot {
                fetched_limit: limit,
                entries,
            }),
        )
        .await;
    Ok(Json(snapshot.entries.clone()))
}

/// Genres (tags) by station count
#[utoipa::path(
    get,
    path = "/api/radio/genres",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Tags, most used first", body = Vec<CategoryEntry>),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "catalog"
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<CategoryEntry>>, ApiError> {
    catalog(&state, &GENRES, &query).await
}

/// Countries by station count
#[utoipa::path(
    get,
    path = "/api/radio/countries",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Countries, most stations first", body = Vec<CategoryEntry>),
        (status = 500, description = "Upstream failure"),
    ),
    tag = "catalog"
)]
pub async fn list_countries(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<CategoryEntry>>, ApiError> {
    catalog(&state, &COUNTRIES, &query).await
}
