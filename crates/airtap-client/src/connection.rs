//! A live session with the server: one transport plus its dispatcher.

use std::sync::Arc;
use std::time::Duration;

use airtap_protocol::{codec, RequestBody, RequestId, Response};

use crate::dispatch::{Dispatcher, PendingRequest};
use crate::error::{ClientError, TransportError};
use crate::transport::Transport;

/// An inbound envelope plus the request it answers, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub response: Response,
    pub request: Option<PendingRequest>,
}

/// Owns the transport, the identifier allocator and the pending-request map
/// for one persistent connection.
///
/// Create via [`ClientBuilder`](crate::builder::ClientBuilder).
pub struct Connection {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    receive_timeout: Duration,
    max_frame_bytes: usize,
}

impl Connection {
    /// Wrap an already-open transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        receive_timeout: Duration,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(),
            receive_timeout,
            max_frame_bytes,
        }
    }

    /// Send a request and return its id.  Does not wait for the reply.
    pub async fn send(&self, body: RequestBody) -> Result<RequestId, ClientError> {
        self.dispatcher.send(self.transport.as_ref(), body).await
    }

    /// Wait for the next decodable envelope.
    ///
    /// Oversized and undecodable frames are logged and skipped; the session
    /// carries on.  Transport failures, a closed stream and the receive
    /// timeout are returned as [`ClientError::Transport`].
    pub async fn recv(&self) -> Result<Inbound, ClientError> {
        loop {
            let frame = tokio::time::timeout(self.receive_timeout, self.transport.receive())
                .await
                .map_err(|_| TransportError::Timeout(self.receive_timeout))?;

            let text = match frame {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed.into()),
            };

            // ── Pre-parse size limit ─────────────────────────────────
            if text.len() > self.max_frame_bytes {
                tracing::warn!(
                    bytes = text.len(),
                    max = self.max_frame_bytes,
                    "inbound frame exceeds max_frame_bytes, dropping"
                );
                continue;
            }

            match codec::decode(&text) {
                Ok(response) => {
                    tracing::debug!(
                        kind = response.kind.name(),
                        id = ?response.id,
                        "received envelope"
                    );
                    let request = self.dispatcher.settle(&response);
                    return Ok(Inbound { response, request });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding undecodable frame");
                }
            }
        }
    }

    /// Number of requests still awaiting a final reply.
    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Close the underlying transport.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}
