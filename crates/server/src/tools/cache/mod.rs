//! Cache-related MCP tools.
//!
//! This module provides tools for writing to, purging and inspecting the
//! on-disk URL cache.

pub mod purge;
pub mod put;
pub mod stats;

pub use purge::{CachePurgeParams, purge_impl};
pub use put::{CachePutParams, put_impl};
pub use stats::{CacheStatsParams, stats_impl};
