pub mod aggregate;
pub mod cache;
pub mod rate_limit;
pub mod retry;
pub mod stream;
