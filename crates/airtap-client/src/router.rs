//! Response router: maps each decoded envelope to what the client should do
//! with it.

use airtap_protocol::{Response, ResponseKind, ToolInfo};
use serde_json::Value;

/// What a response asks of the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ShowServerInfo {
        server: Option<String>,
        version: Option<String>,
        protocol: Option<String>,
    },
    ShowToolList(Vec<ToolInfo>),
    NoteRequestReceived { tool: String },
    HandleToolResponse { tool: String, result: Value },
    ShowError { message: String },
    HandleUnknown { kind: String, raw: Value },
}

/// Total and side-effect free: every response, including kinds this client
/// has never seen, maps to exactly one action.
pub fn classify(response: &Response) -> Action {
    match &response.kind {
        ResponseKind::ServerInfo {
            server,
            version,
            protocol,
        } => Action::ShowServerInfo {
            server: server.clone(),
            version: version.clone(),
            protocol: protocol.clone(),
        },
        ResponseKind::ToolsList { tools } => Action::ShowToolList(tools.clone()),
        ResponseKind::RequestReceived { tool } => Action::NoteRequestReceived { tool: tool.clone() },
        ResponseKind::ToolResponse { tool, result } => Action::HandleToolResponse {
            tool: tool.clone(),
            result: result.clone(),
        },
        ResponseKind::Error { message } => Action::ShowError {
            message: message.clone(),
        },
        ResponseKind::Unknown { kind, raw } => Action::HandleUnknown {
            kind: kind.clone(),
            raw: raw.clone(),
        },
    }
}
