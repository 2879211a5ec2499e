//! Console rendering of inbound envelopes.

use std::fmt::Write as _;

use airtap_client::{Action, Inbound, WorkflowOutcome};

/// Human-readable lines for one inbound envelope.
pub fn inbound(inbound: &Inbound, action: &Action) -> String {
    let response = &inbound.response;
    let mut out = format!("< Received {} message", response.kind.name());
    if let Some(id) = &response.id {
        let _ = write!(out, " (ID: {id})");
    }
    out.push('\n');

    match action {
        Action::ShowServerInfo {
            server,
            version,
            protocol,
        } => {
            let _ = writeln!(
                out,
                "Server: {} ({})",
                server.as_deref().unwrap_or("unknown"),
                version.as_deref().unwrap_or("unknown")
            );
            let _ = writeln!(out, "Protocol: {}", protocol.as_deref().unwrap_or("unknown"));
        }
        Action::ShowToolList(tools) => {
            out.push_str("Available tools:\n");
            for tool in tools {
                let _ = writeln!(out, "- {}: {}", tool.name, tool.description);
            }
        }
        Action::NoteRequestReceived { tool } => {
            let _ = writeln!(out, "Request received for tool: {tool}");
        }
        Action::HandleToolResponse { tool, result } => {
            let _ = writeln!(out, "Tool execution completed: {tool}");
            let _ = writeln!(out, "Result: {}", pretty(result));
        }
        Action::ShowError { message } => {
            let _ = writeln!(out, "Error: {message}");
        }
        Action::HandleUnknown { kind, raw } => {
            let _ = writeln!(out, "Unknown message type: {kind}");
            let _ = writeln!(out, "Message: {}", pretty(raw));
        }
    }
    out
}

/// Final summary line for a finished run.
pub fn outcome(outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::Completed { task_id, status } => {
            format!("Task {task_id} status: {}", pretty(status))
        }
        WorkflowOutcome::Cancelled => "Exiting...".into(),
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
