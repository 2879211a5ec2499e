//! In-memory [`Transport`] for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::Transport;

pub(crate) struct MemoryTransport {
    sent: Mutex<Vec<String>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

/// Test-side handle for pushing frames at the client.
pub(crate) struct Peer {
    tx: mpsc::UnboundedSender<String>,
}

impl Peer {
    pub(crate) fn push(&self, frame: Value) {
        self.push_raw(frame.to_string());
    }

    pub(crate) fn push_raw(&self, frame: impl Into<String>) {
        let _ = self.tx.send(frame.into());
    }
}

impl MemoryTransport {
    pub(crate) fn new() -> (Self, Peer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent: Mutex::new(Vec::new()),
            inbound: tokio::sync::Mutex::new(rx),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        (transport, Peer { tx })
    }

    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Every frame sent so far, parsed as JSON.
    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::WebSocket("broken pipe".into()));
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn receive(&self) -> Option<Result<String, TransportError>> {
        self.inbound.lock().await.recv().await.map(Ok)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
