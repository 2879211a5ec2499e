//! Request dispatcher: id assignment, transmission, and reply correlation.

use std::collections::HashMap;

use airtap_protocol::{codec, Request, RequestBody, RequestId, Response, ResponseKind};
use parking_lot::Mutex;

use crate::error::ClientError;
use crate::ids::IdAllocator;
use crate::transport::Transport;

/// A request that has been sent and not yet answered with a final reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    /// Wire `type` of the request (`list_tools`, `run_tool`, ...).
    pub kind: String,
    /// Tool name for `run_tool` requests.
    pub tool: Option<String>,
    /// A `request_received` acknowledgement has arrived for this id.
    pub acknowledged: bool,
}

/// Sends requests and tracks which id expects which reply.
///
/// Does not wait for replies; callers correlate through
/// [`settle`](Self::settle) as envelopes arrive.
#[derive(Debug, Default)]
pub struct Dispatcher {
    ids: IdAllocator,
    /// Map of request id → what was asked.
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an id, encode, and transmit one frame.  No retry: a transport
    /// failure is returned as-is and the request is forgotten.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        body: RequestBody,
    ) -> Result<RequestId, ClientError> {
        let id = self.ids.next()?;
        let pending = PendingRequest {
            id: id.clone(),
            kind: body.kind().to_owned(),
            tool: body.tool().map(str::to_owned),
            acknowledged: false,
        };
        let request = Request {
            id: id.clone(),
            body,
        };
        let frame = codec::encode(&request);

        // Record first: the reply may be read before `send` returns.
        self.pending.lock().insert(id.clone(), pending);

        if let Err(e) = transport.send(frame).await {
            self.pending.lock().remove(&id);
            return Err(e.into());
        }

        tracing::debug!(
            id = %id,
            kind = request.body.kind(),
            tool = ?request.body.tool(),
            "sent request"
        );
        Ok(id)
    }

    /// Correlate an inbound envelope with the request it answers.
    ///
    /// Acknowledgements mark the entry and keep it; any other reply kind
    /// removes it.  Replies without an `id` settle the oldest pending
    /// request for the same tool (or the oldest `list_tools` for a
    /// `tools_list`).  Returns `None` when nothing matches, including for
    /// ids this dispatcher never issued.
    pub fn settle(&self, response: &Response) -> Option<PendingRequest> {
        let mut pending = self.pending.lock();
        let id = match &response.id {
            Some(id) => id.clone(),
            None => oldest_match(&pending, &response.kind)?,
        };

        let settled = if response.kind.is_final() {
            pending.remove(&id)
        } else {
            pending.get_mut(&id).map(|entry| {
                entry.acknowledged = true;
                entry.clone()
            })
        };

        if settled.is_none() {
            tracing::warn!(
                id = %id,
                kind = response.kind.name(),
                "received reply for unknown request"
            );
        }
        settled
    }

    /// Number of requests still waiting for a final reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// The earliest pending request an id-less reply of `kind` can answer.
fn oldest_match(
    pending: &HashMap<RequestId, PendingRequest>,
    kind: &ResponseKind,
) -> Option<RequestId> {
    let matches = |entry: &PendingRequest| match kind {
        ResponseKind::ToolResponse { tool, .. } | ResponseKind::RequestReceived { tool } => {
            !tool.is_empty() && entry.tool.as_deref() == Some(tool.as_str())
        }
        ResponseKind::ToolsList { .. } => entry.kind == "list_tools",
        _ => false,
    };

    pending
        .values()
        .filter(|entry| matches(entry))
        .min_by_key(|entry| entry.id.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .map(|entry| entry.id.clone())
}
