pub mod client;
pub mod models;

pub use client::{Category, RadioBrowserClient};
pub use models::{CategoryEntry, ClickResult, Station, StationSearch};
