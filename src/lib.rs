//! RadioCast proxy - caching Radio Browser gateway and audio stream relay
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod error;
pub mod radio_browser;
pub mod routes;
pub mod services;
