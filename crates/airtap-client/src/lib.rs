//! `airtap-client`: client for the Airtap tool server.
//!
//! Talks to the server over one persistent WebSocket, assigns request ids,
//! correlates replies, and drives the discover → submit → poll workflow.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  Step   ┌────────┐ send(body) ┌────────────┐ frame ┌───────────┐
//! │  Workflow  │───────▶│ driver │──────────▶│ Connection │─────▶│ Transport │
//! │ (sans-IO)  │◀───────│        │◀──────────│ Dispatcher │◀─────│ (WS)      │
//! └────────────┘ Inbound └────────┘   recv()   └────────────┘       └───────────┘
//!                           │
//!                           ▼ classify()
//!                        Action ─▶ observer
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # use airtap_client::{driver, ClientBuilder, Workflow, WorkflowSettings};
//! # use tokio_util::sync::CancellationToken;
//! # async fn demo() -> Result<(), airtap_client::ClientError> {
//! let conn = ClientBuilder::new()
//!     .endpoint("ws://localhost:3000")
//!     .token("secret")
//!     .connect()
//!     .await?;
//!
//! let mut workflow = Workflow::new(WorkflowSettings::default());
//! let outcome = driver::run(&conn, &mut workflow, &CancellationToken::new(), |_, action| {
//!     println!("{action:?}");
//! })
//! .await?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod ids;
pub mod router;
pub mod transport;
pub mod workflow;

#[cfg(test)]
mod testing;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::ClientBuilder;
pub use config::{ClientConfig, WorkflowConfig};
pub use connection::{Connection, Inbound};
pub use dispatch::{Dispatcher, PendingRequest};
pub use driver::WorkflowOutcome;
pub use error::{ClientError, ProtocolError, TransportError};
pub use ids::IdAllocator;
pub use router::{classify, Action};
pub use transport::{Transport, WsTransport};
pub use workflow::{PollPolicy, Step, TaskId, Workflow, WorkflowSettings, WorkflowState};

// Re-export protocol types so callers never need to import airtap-protocol directly.
pub use airtap_protocol::{RequestBody, RequestId, Response, ResponseKind, ToolInfo};
