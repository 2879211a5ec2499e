//! Airtap tool protocol: request/response envelopes and the JSON codec.
//!
//! Every frame on the wire is one JSON object with a `type` discriminator.
//! Requests always carry a client-assigned `id`; responses carry the `id`
//! only when they answer a specific request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod codec;

pub use codec::{decode, decode_request, encode, DecodeError};

/// Tool that submits a new task to the remote agent.
pub const SUBMIT_TASK: &str = "submit_task";

/// Tool that reports the status of a previously submitted task.
pub const GET_TASK_STATUS: &str = "get_task_status";

// ── Identifiers ──────────────────────────────────────────────────────

/// Correlation token attached to every outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Requests (client → server) ───────────────────────────────────────

/// An outgoing request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub body: RequestBody,
}

/// Kind-specific part of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Ask the server for its tool catalogue.
    ListTools,

    /// Invoke a named tool.  `params` is always present on the wire, even
    /// when empty.
    RunTool {
        tool: String,
        params: Map<String, Value>,
    },

    /// Any other request kind.  `fields` are flattened into the envelope
    /// next to `id` and `type`.
    Other {
        kind: String,
        fields: Map<String, Value>,
    },
}

impl RequestBody {
    /// Build a `run_tool` body.  Non-object `params` are treated as empty.
    pub fn run_tool(tool: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        RequestBody::RunTool {
            tool: tool.into(),
            params,
        }
    }

    /// The wire `type` of this request.
    pub fn kind(&self) -> &str {
        match self {
            RequestBody::ListTools => "list_tools",
            RequestBody::RunTool { .. } => "run_tool",
            RequestBody::Other { kind, .. } => kind,
        }
    }

    /// Tool name for `run_tool` requests.
    pub fn tool(&self) -> Option<&str> {
        match self {
            RequestBody::RunTool { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

// ── Responses (server → client) ──────────────────────────────────────

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Present only when the server correlates this reply to a request.
    pub id: Option<RequestId>,
    pub kind: ResponseKind,
}

/// One entry of a `tools_list` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Classified payload of an inbound envelope.
///
/// Built field by field from the raw JSON (see [`codec::decode`]): payload
/// fields of the wrong shape fall back to defaults instead of rejecting
/// the envelope.  Unrecognized `type` values are preserved as
/// [`ResponseKind::Unknown`] so newer servers can add message kinds
/// without breaking older clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseKind {
    /// Sent once by the server after the connection opens.
    ServerInfo {
        server: Option<String>,
        version: Option<String>,
        protocol: Option<String>,
    },

    /// Reply to `list_tools`.
    ToolsList { tools: Vec<ToolInfo> },

    /// Acknowledgement that a `run_tool` request was accepted.
    RequestReceived { tool: String },

    /// Result of a `run_tool` request.
    ToolResponse { tool: String, result: Value },

    /// Server-side failure.
    Error { message: String },

    Unknown {
        kind: String,
        /// The complete envelope as received.
        raw: Value,
    },
}

impl ResponseKind {
    /// The wire `type` this payload was classified from.
    pub fn name(&self) -> &str {
        match self {
            ResponseKind::ServerInfo { .. } => "server_info",
            ResponseKind::ToolsList { .. } => "tools_list",
            ResponseKind::RequestReceived { .. } => "request_received",
            ResponseKind::ToolResponse { .. } => "tool_response",
            ResponseKind::Error { .. } => "error",
            ResponseKind::Unknown { kind, .. } => kind,
        }
    }

    /// Whether this reply closes out the request it answers.
    ///
    /// `request_received` is only an acknowledgement; the result follows
    /// in a later envelope with the same `id`.
    pub fn is_final(&self) -> bool {
        !matches!(self, ResponseKind::RequestReceived { .. })
    }
}
