mod handlers;
mod types;

pub use handlers::{
    check_url, nearby_stations, recent_stations, search_stations, stations_by_genre, top_stations,
    track_click,
};
pub(crate) use types::positive_or;
pub use types::{
    ClickResponse, GenreQuery, LimitQuery, NearbyQuery, ProbeStatus, SearchQuery, UrlCheckResponse,
    UrlQuery,
};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_check_url, __path_nearby_stations, __path_recent_stations, __path_search_stations,
    __path_stations_by_genre, __path_top_stations, __path_track_click,
};
