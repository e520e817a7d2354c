//! Core types and shared functionality for urlvault.
//!
//! This crate provides:
//! - URL-addressed, file-backed cache with session and permanent classes
//! - In-flight fetch deduplication over a pluggable transport
//! - A suspendable work queue with idle notifications
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod facade;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use cache::{
    CacheEntry, CacheKey, EntryStore, FetchCoordinator, LoadOutcome, LoadResult, PendingLoad, RetentionClass, StoreStats,
};
pub use config::{AppConfig, ConfigError};
pub use dispatch::{ChannelDispatcher, Dispatcher, DispatchReceiver, InlineDispatcher, RuntimeDispatcher};
pub use error::Error;
pub use events::{BroadcastEventBus, CACHE_DID_IDLE, EventBus, TracingEventBus};
pub use facade::{Completion, UrlCache, UrlCacheBuilder};
pub use queue::{QueueState, WorkQueue};
pub use transport::{FetchRequest, Transport};
