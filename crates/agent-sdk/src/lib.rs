//! `xy-agent-sdk`: client SDK for agents served over a pair of redundant
//! WebSocket endpoints.
//!
//! An agent keeps one signed WebSocket to each endpoint.  User requests
//! may arrive on either; every reply goes back over the endpoint that most
//! recently carried traffic for that session.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your Agent                                               │
//! │                                                           │
//! │   let client = AgentClient::new(config)?;                 │
//! │   client.set_handler(MyHandler);                          │
//! │   client.connect().await?;                                │
//! │   ...                                                     │
//! │   client.reply(task, session, "hi").await?;               │
//! └──────────────────────────┬────────────────────────────────┘
//!                            │
//!                 ConnectionManager ── SessionRouter
//!                   │              │
//!             endpoint-1      endpoint-2
//!        (read + keepalive) (read + keepalive)
//! ```
//!
//! # Connection flow
//!
//! 1. Connect WS with `x-access-key`, `x-sign`, `x-ts`, `x-agent-id` headers
//! 2. Send `clawd_bot_init`; the endpoint is now ready
//! 3. Main loop:
//!    - On a request: record the session route, dispatch to the handler
//!    - On `clearContext` / `tasks/cancel`: notify the handler and acknowledge
//!    - Ping every 30s; drop the connection after 90s without inbound traffic
//!    - Send an application `heartbeat` to both endpoints every 20s
//! 4. On disconnect: reconnect with capped exponential back-off; the attempt
//!    counter resets only after the new connection stays up for 10s

pub mod auth;
pub mod builder;
pub mod client;
pub mod config;
mod endpoint;
pub mod handler;
pub mod manager;
pub mod reconnect;
pub mod router;
pub mod tls;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use auth::{Credentials, Signer};
pub use builder::ClientConfigBuilder;
pub use client::AgentClient;
pub use config::{ClientConfig, DEFAULT_WS_URL_1, DEFAULT_WS_URL_2};
pub use handler::{AgentHandler, Message};
pub use manager::ConnectionManager;
pub use reconnect::ReconnectPolicy;
pub use router::SessionRouter;
pub use types::{ConnectionSnapshot, EndpointId, EndpointSnapshot, SdkError};

// Re-export protocol types so agents never need to import xy-protocol directly.
pub use xy_protocol::{FileContent, InboundRequest, Part, TaskState};
