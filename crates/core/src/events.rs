//! Event bus collaborator.

use tokio::sync::broadcast;

/// Published once each time the work queue drains.
pub const CACHE_DID_IDLE: &str = "cache did idle";

/// Process-wide notification sink.
pub trait EventBus: Send + Sync {
    fn notify(&self, event: &str);
}

/// Logs events and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn notify(&self, event: &str) {
        tracing::debug!(event, "cache event");
    }
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag rather than block the publisher.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    tx: broadcast::Sender<String>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus for BroadcastEventBus {
    fn notify(&self, event: &str) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.to_string());
        tracing::debug!(event, "cache event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let bus = BroadcastEventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.notify(CACHE_DID_IDLE);

        assert_eq!(rx1.recv().await.unwrap(), CACHE_DID_IDLE);
        assert_eq!(rx2.recv().await.unwrap(), CACHE_DID_IDLE);
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let bus = BroadcastEventBus::new(1);
        bus.notify(CACHE_DID_IDLE);
    }
}
