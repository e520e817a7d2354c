//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::Error;
use crate::transport::{FetchRequest, Transport};

/// Transport that counts calls and answers from a fixed script.
pub struct FakeTransport {
    response: Result<Bytes, Error>,
    calls: AtomicUsize,
    gate: Option<watch::Sender<bool>>,
    seen: parking_lot::Mutex<Vec<FetchRequest>>,
}

impl FakeTransport {
    pub fn serving(body: &'static [u8]) -> Self {
        Self::new(Ok(Bytes::from_static(body)), None)
    }

    pub fn failing(error: Error) -> Self {
        Self::new(Err(error), None)
    }

    /// Holds every fetch until [`FakeTransport::release`] is called.
    pub fn gated(body: &'static [u8]) -> Self {
        let (tx, _) = watch::channel(false);
        Self::new(Ok(Bytes::from_static(body)), Some(tx))
    }

    fn new(response: Result<Bytes, Error>, gate: Option<watch::Sender<bool>>) -> Self {
        Self { response, calls: AtomicUsize::new(0), gate, seen: parking_lot::Mutex::new(Vec::new()) }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(true);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.clone());

        if let Some(gate) = &self.gate {
            let mut rx = gate.subscribe();
            let _ = rx.wait_for(|open| *open).await;
        }

        self.response.clone()
    }
}
