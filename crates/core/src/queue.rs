//! Suspendable work queue.
//!
//! Every load, store and purge runs as a job on this queue. At most
//! `max_concurrency` jobs execute at once; while suspended, submitted jobs
//! are held in FIFO order and jobs already running finish normally.
//!
//! When the queue goes from busy to empty (nothing running, nothing held) it
//! publishes [`CACHE_DID_IDLE`] once.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::events::{CACHE_DID_IDLE, EventBus};

type Job = BoxFuture<'static, ()>;

/// Whether newly submitted work may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Running,
    Suspended,
}

/// Bounded, pausable job runner on a tokio runtime.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    handle: Handle,
    bus: Arc<dyn EventBus>,
    max_concurrency: usize,
    idle_tx: watch::Sender<bool>,
}

struct Inner {
    state: QueueState,
    queued: VecDeque<Job>,
    running: usize,
    idle: bool,
}

impl WorkQueue {
    pub fn new(handle: Handle, bus: Arc<dyn EventBus>, max_concurrency: usize, state: QueueState) -> Self {
        let (idle_tx, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { state, queued: VecDeque::new(), running: 0, idle: true }),
                handle,
                bus,
                max_concurrency: max_concurrency.max(1),
                idle_tx,
            }),
        }
    }

    /// Enqueue `job`. Never blocks; the job starts as soon as the queue is
    /// running and a worker slot is free.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ready = {
            let mut inner = self.shared.inner.lock();
            inner.queued.push_back(job.boxed());
            if inner.idle {
                inner.idle = false;
                self.shared.idle_tx.send_replace(false);
            }
            take_ready(&self.shared, &mut inner)
        };
        launch(&self.shared, ready);
    }

    /// Stop starting new jobs. Running jobs are not interrupted.
    pub fn suspend(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state != QueueState::Suspended {
            inner.state = QueueState::Suspended;
            tracing::debug!(queued = inner.queued.len(), running = inner.running, "work queue suspended");
        }
    }

    /// Start every held job, up to the concurrency limit.
    pub fn resume(&self) {
        let ready = {
            let mut inner = self.shared.inner.lock();
            if inner.state != QueueState::Running {
                inner.state = QueueState::Running;
                tracing::debug!(queued = inner.queued.len(), "work queue resumed");
            }
            take_ready(&self.shared, &mut inner)
        };
        launch(&self.shared, ready);
    }

    pub fn state(&self) -> QueueState {
        self.shared.inner.lock().state
    }

    /// Jobs waiting to start.
    pub fn queued(&self) -> usize {
        self.shared.inner.lock().queued.len()
    }

    /// Jobs currently executing.
    pub fn running(&self) -> usize {
        self.shared.inner.lock().running
    }

    pub fn is_idle(&self) -> bool {
        self.shared.inner.lock().idle
    }

    /// Wait until nothing is running or held.
    ///
    /// Never returns while suspended with held jobs.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle_tx.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("WorkQueue")
            .field("state", &inner.state)
            .field("queued", &inner.queued.len())
            .field("running", &inner.running)
            .field("max_concurrency", &self.shared.max_concurrency)
            .finish()
    }
}

fn take_ready(shared: &Shared, inner: &mut Inner) -> Vec<Job> {
    let mut ready = Vec::new();
    while inner.state == QueueState::Running && inner.running < shared.max_concurrency {
        let Some(job) = inner.queued.pop_front() else { break };
        inner.running += 1;
        ready.push(job);
    }
    ready
}

fn launch(shared: &Arc<Shared>, jobs: Vec<Job>) {
    for job in jobs {
        let slot = WorkerSlot { shared: shared.clone() };
        shared.handle.spawn(async move {
            let _slot = slot;
            job.await;
        });
    }
}

/// Marks one worker busy; frees the slot (and starts the next job) when the
/// job finishes, panics or is dropped by a shutting-down runtime.
struct WorkerSlot {
    shared: Arc<Shared>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let (ready, went_idle) = {
            let mut inner = self.shared.inner.lock();
            inner.running -= 1;
            let ready = take_ready(&self.shared, &mut inner);
            let went_idle = inner.running == 0 && inner.queued.is_empty() && !inner.idle;
            if went_idle {
                inner.idle = true;
            }
            (ready, went_idle)
        };

        launch(&self.shared, ready);

        if went_idle {
            self.shared.idle_tx.send_replace(true);
            tracing::debug!("work queue idle");
            self.shared.bus.notify(CACHE_DID_IDLE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastEventBus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, oneshot};

    fn queue(max: usize, state: QueueState) -> (WorkQueue, broadcast::Receiver<String>) {
        let bus = BroadcastEventBus::default();
        let rx = bus.subscribe();
        (WorkQueue::new(Handle::current(), Arc::new(bus), max, state), rx)
    }

    async fn expect_idle(rx: &mut broadcast::Receiver<String>) {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, CACHE_DID_IDLE);
    }

    async fn expect_quiet(rx: &mut broadcast::Receiver<String>) {
        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err(), "unexpected event: {result:?}");
    }

    #[tokio::test]
    async fn test_runs_submitted_job() {
        let (queue, mut events) = queue(2, QueueState::Running);
        let (tx, rx) = oneshot::channel();
        queue.submit(async move {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
        expect_idle(&mut events).await;
    }

    #[tokio::test]
    async fn test_suspended_queue_holds_jobs() {
        let (queue, _events) = queue(2, QueueState::Running);
        queue.suspend();
        assert_eq!(queue.state(), QueueState::Suspended);

        let ran = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let r = ran.clone();
        queue.submit(async move {
            r.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.queued(), 1);

        queue.resume();
        rx.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_suspend_does_not_interrupt_running_job() {
        let (queue, _events) = queue(1, QueueState::Running);
        let (started_tx, started_rx) = oneshot::channel();
        let (finish_tx, finish_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();

        queue.submit(async move {
            let _ = started_tx.send(());
            let _ = finish_rx.await;
            let _ = done_tx.send(());
        });
        started_rx.await.unwrap();

        queue.suspend();
        let _ = finish_tx.send(());
        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let (queue, mut events) = queue(2, QueueState::Running);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let active = active.clone();
            let peak = peak.clone();
            queue.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        expect_idle(&mut events).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.running(), 0);
    }

    #[tokio::test]
    async fn test_idle_fires_once_per_busy_period() {
        let (queue, mut events) = queue(4, QueueState::Running);

        for _ in 0..3 {
            queue.submit(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
        expect_idle(&mut events).await;
        expect_quiet(&mut events).await;

        // Toggling state while empty is not a busy period.
        queue.suspend();
        queue.resume();
        expect_quiet(&mut events).await;

        queue.submit(async {});
        expect_idle(&mut events).await;
        expect_quiet(&mut events).await;
    }

    #[tokio::test]
    async fn test_not_idle_while_holding_jobs() {
        let (queue, mut events) = queue(1, QueueState::Suspended);
        queue.submit(async {});

        expect_quiet(&mut events).await;
        assert!(!queue.is_idle());

        queue.resume();
        expect_idle(&mut events).await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_panicking_job_frees_slot() {
        let (queue, mut events) = queue(1, QueueState::Running);
        queue.submit(async { panic!("job failed") });

        let (tx, rx) = oneshot::channel();
        queue.submit(async move {
            let _ = tx.send(());
        });

        rx.await.unwrap();
        expect_idle(&mut events).await;
    }

    #[tokio::test]
    async fn test_wait_idle() {
        let (queue, _events) = queue(1, QueueState::Running);
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        queue.submit(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            d.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle()).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
