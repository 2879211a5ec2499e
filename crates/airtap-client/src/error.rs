//! Error types for the client.

use std::time::Duration;

/// Failures of the underlying connection.  Fatal to the session.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
    #[error("websocket: {0}")]
    WebSocket(String),
    #[error("no frame received within {0:?}")]
    Timeout(Duration),
}

/// Protocol-level failures.  Terminal for the current workflow run, but the
/// connection itself stays usable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("submit_task response carried no taskId")]
    NoTaskId,
    #[error("server error: {message}")]
    Server { message: String },
    #[error("task not finished after {attempts} status checks")]
    PollAttemptsExhausted { attempts: u32 },
}

/// Top-level client error.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("request identifiers exhausted")]
    IdentifierExhausted,
}

impl ClientError {
    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::IdentifierExhausted
        )
    }
}
