//! File-backed URL cache.
//!
//! This module provides the storage and fetch pipeline behind [`UrlCache`](crate::UrlCache):
//!
//! - Class-namespaced keys derived with SHA-256 over the normalized URL
//! - One directory per retention class, atomic temp-file writes
//! - Whole-class purge that never exposes partial payloads
//! - At most one transport call in flight per key

pub mod coordinator;
pub mod key;
pub mod store;

pub use crate::Error;

pub use coordinator::{FetchCoordinator, LoadOutcome, LoadResult, PendingLoad, Reply, reply_to};
pub use key::{CacheKey, RetentionClass, normalize_url};
pub use store::{CacheEntry, EntryMeta, EntryStore, StoreStats};
