//! Builder pattern for opening a [`Connection`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::transport::WsTransport;

/// Fluent builder for [`Connection`].
///
/// # Example
///
/// ```rust,no_run
/// # use airtap_client::ClientBuilder;
/// # async fn demo() -> Result<(), airtap_client::ClientError> {
/// let conn = ClientBuilder::new()
///     .endpoint("ws://localhost:3000")
///     .token("secret")
///     .receive_timeout(std::time::Duration::from_secs(30))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    endpoint: String,
    token: Option<String>,
    receive_timeout: Duration,
    max_frame_bytes: usize,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    /// Take endpoint, token and limits from a loaded config.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            receive_timeout: config.receive_timeout(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Set the server WebSocket URL (e.g. `ws://localhost:3000`).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Set the API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the per-frame receive timeout (default 30s).
    pub fn receive_timeout(mut self, d: Duration) -> Self {
        self.receive_timeout = d;
        self
    }

    /// Maximum inbound frame size (default 1 MB).
    pub fn max_frame_bytes(mut self, n: usize) -> Self {
        self.max_frame_bytes = n;
        self
    }

    /// Open the WebSocket and wrap it in a [`Connection`].
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] for an empty or non-WebSocket endpoint,
    /// [`ClientError::Transport`] if the connection cannot be opened.
    pub async fn connect(self) -> Result<Connection, ClientError> {
        self.validate()?;
        let url = self.connection_url();
        tracing::info!(endpoint = %self.endpoint, "connecting to server");

        let transport = WsTransport::connect(&url).await?;
        tracing::info!(endpoint = %self.endpoint, "connected");

        Ok(Connection::new(
            Arc::new(transport),
            self.receive_timeout,
            self.max_frame_bytes,
        ))
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Config("endpoint is required".into()));
        }
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "endpoint must be a ws:// or wss:// URL, got {}",
                self.endpoint
            )));
        }
        if self.max_frame_bytes == 0 {
            return Err(ClientError::Config("max_frame_bytes must be positive".into()));
        }
        Ok(())
    }

    /// Build the full connection URL with the auth param.
    fn connection_url(&self) -> String {
        let base = &self.endpoint;
        match &self.token {
            Some(token) if !token.is_empty() => {
                let sep = if base.contains('?') { "&" } else { "?" };
                format!("{base}{sep}token={}", urlencoding::encode(token))
            }
            _ => base.clone(),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
