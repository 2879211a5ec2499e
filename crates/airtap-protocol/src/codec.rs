//! JSON codec for envelopes.
//!
//! Encoding builds the envelope object by hand so extension request kinds
//! can flatten arbitrary fields next to `id` and `type`.  Decoding is
//! strict only about the JSON itself and the presence of a string `type`;
//! payload fields that are missing or oddly shaped fall back to defaults.

use serde_json::{Map, Value};

use crate::{Request, RequestBody, RequestId, Response, ResponseKind, ToolInfo};

/// Why an inbound frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not valid JSON.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// No string `type` field to classify the envelope by.
    #[error("envelope has no `type` field")]
    MissingType,
}

/// Serialize a request envelope to its wire form.
pub fn encode(request: &Request) -> String {
    let mut envelope = Map::new();
    envelope.insert("id".into(), Value::String(request.id.to_string()));
    envelope.insert("type".into(), Value::String(request.body.kind().to_owned()));

    match &request.body {
        RequestBody::ListTools => {}
        RequestBody::RunTool { tool, params } => {
            envelope.insert("tool".into(), Value::String(tool.clone()));
            envelope.insert("params".into(), Value::Object(params.clone()));
        }
        RequestBody::Other { fields, .. } => {
            for (key, value) in fields {
                // `id` and `type` belong to the envelope, never the payload.
                if key != "id" && key != "type" {
                    envelope.insert(key.clone(), value.clone());
                }
            }
        }
    }

    Value::Object(envelope).to_string()
}

/// Parse and classify an inbound envelope.
pub fn decode(text: &str) -> Result<Response, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();
    let id = value.get("id").and_then(id_from_value);

    let kind = match kind.as_str() {
        "server_info" => ResponseKind::ServerInfo {
            server: text_field(&value, "server"),
            version: text_field(&value, "version"),
            protocol: text_field(&value, "protocol"),
        },
        "tools_list" => ResponseKind::ToolsList {
            tools: tools_field(&value),
        },
        "request_received" => ResponseKind::RequestReceived {
            tool: tool_field(&value),
        },
        "tool_response" => ResponseKind::ToolResponse {
            tool: tool_field(&value),
            result: value.get("result").cloned().unwrap_or(Value::Null),
        },
        "error" => ResponseKind::Error {
            message: text_field(&value, "message").unwrap_or_default(),
        },
        _ => ResponseKind::Unknown { kind, raw: value },
    };

    Ok(Response { id, kind })
}

/// Parse a request envelope.  Inverse of [`encode`].
pub fn decode_request(text: &str) -> Result<Request, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let mut map = match value {
        Value::Object(map) => map,
        _ => return Err(DecodeError::MissingType),
    };

    let kind = match map.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingType),
    };
    let id = map
        .remove("id")
        .as_ref()
        .and_then(id_from_value)
        .ok_or_else(|| DecodeError::Malformed("request has no usable `id`".into()))?;

    let body = match kind.as_str() {
        "list_tools" => RequestBody::ListTools,
        "run_tool" => {
            let tool = match map.remove("tool") {
                Some(Value::String(tool)) => tool,
                _ => return Err(DecodeError::Malformed("run_tool without `tool`".into())),
            };
            let params = match map.remove("params") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(params)) => params,
                Some(_) => {
                    return Err(DecodeError::Malformed(
                        "run_tool `params` must be an object".into(),
                    ))
                }
            };
            RequestBody::RunTool { tool, params }
        }
        _ => RequestBody::Other { kind, fields: map },
    };

    Ok(Request { id, body })
}

/// A display field: strings as-is, other non-null values as their JSON text.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn tool_field(value: &Value) -> String {
    value
        .get("tool")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Entries without a string `name` are skipped.
fn tools_field(value: &Value) -> Vec<ToolInfo> {
    let Some(entries) = value.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?.to_owned();
            let description = entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            Some(ToolInfo { name, description })
        })
        .collect()
}

/// Servers may echo ids as strings or numbers.
fn id_from_value(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::new(s.clone())),
        Value::Number(n) => Some(RequestId::new(n.to_string())),
        _ => None,
    }
}
