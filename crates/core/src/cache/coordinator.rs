//! Fetch coordination: cache lookup, in-flight deduplication, persist.
//!
//! A load registers under its [`CacheKey`] the moment it is submitted. The
//! first registration leads: it gets a [`PendingLoad`] to run on a worker.
//! Every later registration for the same key attaches a reply slot to the
//! leader and needs no worker of its own, so at most one transport call is
//! outstanding per key however small the worker pool is.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use url::Url;

use super::key::{CacheKey, RetentionClass};
use super::store::EntryStore;
use crate::Error;
use crate::transport::{FetchRequest, Transport};

/// Bytes delivered to a caller, flagged with where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub bytes: Bytes,
    pub url: Url,
    pub from_cache: bool,
}

pub type LoadResult = Result<LoadOutcome, Error>;

/// Reply slot for one load call. Invoked exactly once.
pub type Reply = Box<dyn FnOnce(LoadResult) + Send + 'static>;

/// Reply slot that forwards into a oneshot channel.
pub fn reply_to(tx: oneshot::Sender<LoadResult>) -> Reply {
    Box::new(move |result| {
        let _ = tx.send(result);
    })
}

struct Waiter {
    reply: Reply,
    use_cache: bool,
}

/// Owns the in-flight load registry for one cache instance.
pub struct FetchCoordinator {
    store: EntryStore,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<CacheKey, Vec<Waiter>>>,
}

impl FetchCoordinator {
    pub fn new(store: EntryStore, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport, in_flight: Mutex::new(HashMap::new()) }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Number of reply slots attached to the load registered for `key`,
    /// or zero when nothing is in flight.
    pub fn waiting_on(&self, key: &CacheKey) -> usize {
        self.in_flight.lock().get(key).map_or(0, Vec::len)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Register a load for `request`.
    ///
    /// Returns `Some` when this call leads: the caller must run (or drop) the
    /// returned [`PendingLoad`]. Returns `None` when a load for the same key is
    /// already registered; `reply` is then invoked when that load resolves.
    pub fn begin(
        self: &Arc<Self>, request: FetchRequest, class: RetentionClass, use_cache: bool, reply: Reply,
    ) -> Option<PendingLoad> {
        let key = CacheKey::derive(&request.url, class);
        let mut in_flight = self.in_flight.lock();

        if let Some(waiters) = in_flight.get_mut(&key) {
            waiters.push(Waiter { reply, use_cache });
            tracing::debug!(%key, waiters = waiters.len(), "attached to in-flight load");
            return None;
        }

        in_flight.insert(key.clone(), vec![Waiter { reply, use_cache }]);
        Some(PendingLoad { coordinator: self.clone(), key: Some(key), request })
    }

    /// Load `request` and wait for the result, leading on the current task
    /// when nothing is in flight for its key.
    pub async fn load(self: &Arc<Self>, request: FetchRequest, class: RetentionClass, use_cache: bool) -> LoadResult {
        let (tx, rx) = oneshot::channel();
        if let Some(pending) = self.begin(request, class, use_cache, reply_to(tx)) {
            pending.run().await;
        }
        rx.await.unwrap_or(Err(Error::Closed))
    }

    /// Cache-hit path. Any store failure counts as a miss.
    async fn lookup(&self, key: &CacheKey, url: &Url) -> Option<LoadOutcome> {
        if !self.store.exists(key).await {
            tracing::debug!(%key, "cache miss");
            return None;
        }

        match self.store.read(key).await {
            Ok(bytes) => {
                tracing::debug!(%key, bytes = bytes.len(), "cache hit");
                Some(LoadOutcome { bytes, url: url.clone(), from_cache: true })
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "cached entry unreadable, fetching instead");
                None
            }
        }
    }

    async fn fetch_and_persist(&self, key: &CacheKey, request: &FetchRequest) -> LoadResult {
        let bytes = self.transport.fetch(request).await.inspect_err(|e| {
            tracing::debug!(%key, url = %request.url, error = %e, "fetch failed");
        })?;

        if let Err(e) = self.store.write(key, &request.url, &bytes).await {
            tracing::warn!(%key, url = %request.url, error = %e, "failed to persist fetched bytes");
        }

        Ok(LoadOutcome { bytes, url: request.url.clone(), from_cache: false })
    }

    fn accepts_cached(&self, key: &CacheKey) -> bool {
        self.in_flight
            .lock()
            .get(key)
            .is_some_and(|waiters| waiters.iter().any(|w| w.use_cache))
    }

    /// Answer every waiter that accepts a cached copy. Returns `true` when no
    /// waiter is left, i.e. the load is finished.
    fn serve_cached(&self, key: &CacheKey, outcome: &LoadOutcome) -> bool {
        let (served, finished) = {
            let mut in_flight = self.in_flight.lock();
            let Some(waiters) = in_flight.remove(key) else { return true };
            let (served, fresh): (Vec<_>, Vec<_>) = waiters.into_iter().partition(|w| w.use_cache);
            let finished = fresh.is_empty();
            if !finished {
                in_flight.insert(key.clone(), fresh);
            }
            (served, finished)
        };

        for waiter in served {
            (waiter.reply)(Ok(outcome.clone()));
        }
        finished
    }

    fn resolve(&self, key: &CacheKey, result: LoadResult) {
        let waiters = self.in_flight.lock().remove(key).unwrap_or_default();
        for waiter in waiters {
            (waiter.reply)(result.clone());
        }
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("store", &self.store)
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

/// The leading load for one key.
///
/// Dropping it before [`PendingLoad::run`] completes (never polled, aborted,
/// or torn down with its runtime) answers every waiter with
/// [`Error::Closed`], so no reply slot is ever left unanswered.
pub struct PendingLoad {
    coordinator: Arc<FetchCoordinator>,
    key: Option<CacheKey>,
    request: FetchRequest,
}

impl PendingLoad {
    /// Serve waiters from the cache where allowed, fetch for the rest, then
    /// answer them all.
    pub async fn run(mut self) {
        let Some(key) = self.key.clone() else { return };
        let coordinator = self.coordinator.clone();

        if coordinator.accepts_cached(&key)
            && let Some(outcome) = coordinator.lookup(&key, &self.request.url).await
            && coordinator.serve_cached(&key, &outcome)
        {
            self.key = None;
            return;
        }

        let result = coordinator.fetch_and_persist(&key, &self.request).await;
        self.key = None;
        coordinator.resolve(&key, result);
    }
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            tracing::warn!(%key, "load abandoned before completion");
            self.coordinator.resolve(&key, Err(Error::Closed));
        }
    }
}
