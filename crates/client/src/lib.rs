//! Client code for urlvault.
//!
//! This crate provides the reqwest-backed transport and the process-wide
//! cache instance shared by the server.

pub mod fetch;
pub mod shared;

pub use fetch::{FetchConfig, HttpTransport};
pub use shared::{SharedCacheError, build_cache, shared_cache, shared_cache_with};
