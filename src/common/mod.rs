mod state;

pub use state::{AppState, CatalogCache, CatalogSnapshot, StationCache};
