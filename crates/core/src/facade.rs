//! The cache facade: one handle for loading, storing and purging.
//!
//! A [`UrlCache`] is meant to be built once per process and shared by
//! cloning the handle. Every operation returns immediately. Stores, purges
//! and the leading load for a key run as jobs on the work queue; a load for a
//! key already in flight joins that load instead. Results arrive through a
//! [`Completion`] future or a callback routed through the configured
//! [`Dispatcher`], handed over before the delivering job finishes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::Error;
use crate::cache::coordinator::{FetchCoordinator, LoadOutcome, LoadResult, Reply, reply_to};
use crate::cache::key::{CacheKey, RetentionClass, normalize_url};
use crate::cache::store::{EntryStore, StoreStats};
use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, InlineDispatcher};
use crate::events::{EventBus, TracingEventBus};
use crate::queue::{QueueState, WorkQueue};
use crate::transport::{FetchRequest, Transport};

/// Result of a submitted operation. Resolves exactly once.
#[must_use = "dropping a Completion discards the result, not the operation"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, Error>>,
}

impl<T> Completion<T> {
    fn ready(result: Result<T, Error>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.unwrap_or(Err(Error::Closed)))
    }
}

/// Process-wide URL cache handle.
#[derive(Clone)]
pub struct UrlCache {
    inner: Arc<Inner>,
}

struct Inner {
    coordinator: Arc<FetchCoordinator>,
    queue: WorkQueue,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Builder for [`UrlCache`].
pub struct UrlCacheBuilder {
    root: PathBuf,
    transport: Arc<dyn Transport>,
    bus: Arc<dyn EventBus>,
    dispatcher: Arc<dyn Dispatcher>,
    max_concurrency: usize,
    start_suspended: bool,
    purge_session_on_start: bool,
    handle: Option<Handle>,
}

impl UrlCacheBuilder {
    pub fn event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Context that runs callback-style completions.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn start_suspended(mut self, suspended: bool) -> Self {
        self.start_suspended = suspended;
        self
    }

    pub fn purge_session_on_start(mut self, purge: bool) -> Self {
        self.purge_session_on_start = purge;
        self
    }

    /// Runtime the workers run on. Defaults to the runtime calling `build`.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Open the store and start the queue.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the cache directories cannot be created or the
    /// startup purge of the session class fails.
    pub async fn build(self) -> Result<UrlCache, Error> {
        let handle = self.handle.unwrap_or_else(Handle::current);
        let store = EntryStore::open(&self.root).await?;

        match store.sweep_tombstones().await {
            Ok(0) => {}
            Ok(swept) => tracing::info!(swept, "removed leftovers of interrupted purges"),
            Err(e) => tracing::warn!(error = %e, "failed to sweep purge leftovers"),
        }

        if self.purge_session_on_start {
            store.purge_class(RetentionClass::Session).await?;
        }

        let state = if self.start_suspended { QueueState::Suspended } else { QueueState::Running };
        let queue = WorkQueue::new(handle, self.bus, self.max_concurrency, state);
        let coordinator = Arc::new(FetchCoordinator::new(store, self.transport));

        tracing::info!(
            root = %self.root.display(),
            max_concurrency = self.max_concurrency,
            ?state,
            "url cache ready"
        );

        Ok(UrlCache { inner: Arc::new(Inner { coordinator, queue, dispatcher: self.dispatcher }) })
    }
}

impl UrlCache {
    /// Start building a cache rooted at `root` that fetches through `transport`.
    ///
    /// Defaults: 4 workers, running, session class kept, completions run
    /// inline on the worker, events logged.
    pub fn builder(root: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> UrlCacheBuilder {
        UrlCacheBuilder {
            root: root.into(),
            transport,
            bus: Arc::new(TracingEventBus),
            dispatcher: Arc::new(InlineDispatcher),
            max_concurrency: 4,
            start_suspended: false,
            purge_session_on_start: false,
            handle: None,
        }
    }

    /// Builder preloaded from application configuration.
    pub fn from_config(config: &AppConfig, transport: Arc<dyn Transport>) -> UrlCacheBuilder {
        Self::builder(config.cache_dir.clone(), transport)
            .max_concurrency(config.max_concurrency)
            .start_suspended(config.start_suspended)
            .purge_session_on_start(config.purge_session_on_start)
    }

    pub fn suspend(&self) {
        self.inner.queue.suspend();
    }

    pub fn resume(&self) {
        self.inner.queue.resume();
    }

    pub fn queue_state(&self) -> QueueState {
        self.inner.queue.state()
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.inner.queue
    }

    pub fn store(&self) -> &EntryStore {
        self.inner.coordinator.store()
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.inner.coordinator
    }

    /// Key under which `url` is stored for `class`.
    pub fn key_for(&self, url: &str, class: RetentionClass) -> Result<CacheKey, Error> {
        Ok(CacheKey::derive(&normalize_url(url)?, class))
    }

    /// Load `url`, from the cache when allowed and present, otherwise from
    /// the transport (persisting the result).
    pub fn load_url(&self, url: &str, class: RetentionClass, use_cache: bool) -> Completion<LoadOutcome> {
        match FetchRequest::parse(url) {
            Ok(request) => self.load_request(request, class, use_cache),
            Err(e) => Completion::ready(Err(e)),
        }
    }

    /// Like [`UrlCache::load_url`], with headers and timeout forwarded to the
    /// transport.
    pub fn load_request(&self, request: FetchRequest, class: RetentionClass, use_cache: bool) -> Completion<LoadOutcome> {
        let (tx, rx) = oneshot::channel();
        self.submit_load(request, class, use_cache, reply_to(tx));
        Completion { rx }
    }

    /// Callback form of [`UrlCache::load_url`]. `completion` runs exactly
    /// once, on the configured dispatcher.
    pub fn load_url_with<F>(&self, url: &str, class: RetentionClass, use_cache: bool, completion: F)
    where
        F: FnOnce(LoadResult) + Send + 'static,
    {
        match FetchRequest::parse(url) {
            Ok(request) => self.load_request_with(request, class, use_cache, completion),
            Err(e) => self.inner.dispatcher.dispatch(Box::new(move || completion(Err(e)))),
        }
    }

    /// Callback form of [`UrlCache::load_request`].
    pub fn load_request_with<F>(&self, request: FetchRequest, class: RetentionClass, use_cache: bool, completion: F)
    where
        F: FnOnce(LoadResult) + Send + 'static,
    {
        let dispatcher = self.inner.dispatcher.clone();
        let reply: Reply = Box::new(move |result| dispatcher.dispatch(Box::new(move || completion(result))));
        self.submit_load(request, class, use_cache, reply);
    }

    /// Only the leading load for a key takes a queue job; later loads for the
    /// same key are answered by it.
    fn submit_load(&self, request: FetchRequest, class: RetentionClass, use_cache: bool, reply: Reply) {
        if let Some(pending) = self.inner.coordinator.begin(request, class, use_cache, reply) {
            self.inner.queue.submit(pending.run());
        }
    }

    /// Persist bytes the caller already holds, bypassing the transport.
    pub fn cache_data(&self, bytes: impl Into<Bytes>, url: &str, class: RetentionClass) -> Completion<()> {
        let url = match normalize_url(url) {
            Ok(url) => url,
            Err(e) => return Completion::ready(Err(e)),
        };
        let key = CacheKey::derive(&url, class);
        let bytes = bytes.into();
        let store = self.store().clone();

        let (tx, rx) = oneshot::channel();
        self.inner.queue.submit(async move {
            let _ = tx.send(store.write(&key, &url, &bytes).await);
        });
        Completion { rx }
    }

    /// Delete every entry of `class`. Failures are reported, never hidden.
    pub fn purge_cache(&self, class: RetentionClass) -> Completion<()> {
        let store = self.store().clone();
        let (tx, rx) = oneshot::channel();
        self.inner.queue.submit(async move {
            let _ = tx.send(store.purge_class(class).await);
        });
        Completion { rx }
    }

    /// Entry count and size of `class`. Reads the store directly.
    pub async fn stats(&self, class: RetentionClass) -> Result<StoreStats, Error> {
        self.store().stats(class).await
    }

    /// Wait until the work queue has nothing running or held.
    pub async fn wait_idle(&self) {
        self.inner.queue.wait_idle().await;
    }
}

impl std::fmt::Debug for UrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlCache")
            .field("store", self.store())
            .field("queue", &self.inner.queue)
            .finish_non_exhaustive()
    }
}
