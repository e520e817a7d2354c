//! Completion delivery contexts.
//!
//! Callback-style completions are never invoked straight from a worker; they
//! go through a [`Dispatcher`] chosen by the embedding application.

use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A completion ready to run.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Runs completions on a chosen execution context.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, callback: Callback);
}

/// Runs the callback on whichever worker finished the operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, callback: Callback) {
        callback();
    }
}

/// Spawns each callback as its own task on a tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeDispatcher {
    handle: Handle,
}

impl RuntimeDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Dispatcher for RuntimeDispatcher {
    fn dispatch(&self, callback: Callback) {
        self.handle.spawn(async move { callback() });
    }
}

/// Hands callbacks to a single consumer, in submission order.
///
/// The consumer side ([`DispatchReceiver`]) is typically owned by a UI or
/// event-loop thread that drains it between frames.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Callback>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, DispatchReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DispatchReceiver { rx })
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            tracing::warn!("completion dropped: dispatch receiver is gone");
        }
    }
}

/// Consumer half of a [`ChannelDispatcher`].
pub struct DispatchReceiver {
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl DispatchReceiver {
    /// Run every callback already queued without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Wait for the next callback and run it. Returns `false` once every
    /// dispatcher handle is gone.
    pub async fn run_one(&mut self) -> bool {
        match self.rx.recv().await {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run callbacks until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while self.run_one().await {}
    }
}

impl std::fmt::Debug for DispatchReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchReceiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inline_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        InlineDispatcher.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_preserves_order() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = seen.clone();
            dispatcher.dispatch(Box::new(move || seen.lock().push(i)));
        }

        assert!(seen.lock().is_empty());
        assert_eq!(receiver.drain(), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_runtime_dispatcher_spawns() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        RuntimeDispatcher::current().dispatch(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_dropped() {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        dispatcher.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        drop(dispatcher);

        receiver.run().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
