//! Endpoint identity, connection snapshots, and the SDK error type.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use xy_protocol::ProtocolError;

/// One of the two fixed upstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EndpointId {
    #[serde(rename = "endpoint-1")]
    First,
    #[serde(rename = "endpoint-2")]
    Second,
}

impl EndpointId {
    pub const ALL: [EndpointId; 2] = [EndpointId::First, EndpointId::Second];

    pub fn index(self) -> usize {
        match self {
            EndpointId::First => 0,
            EndpointId::Second => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointId::First => "endpoint-1",
            EndpointId::Second => "endpoint-2",
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub id: EndpointId,
    pub connected: bool,
    pub ready: bool,
    pub reconnect_attempts: u32,
    /// Time since the last inbound frame or pong; `None` before the first
    /// connection.
    pub since_heartbeat: Option<Duration>,
}

/// Point-in-time view of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    /// At least one endpoint is connected.
    pub connected: bool,
    /// Highest attempt counter across endpoints.
    pub reconnect_attempts: u32,
    pub endpoints: Vec<EndpointSnapshot>,
}

impl ConnectionSnapshot {
    pub fn endpoint(&self, id: EndpointId) -> Option<&EndpointSnapshot> {
        self.endpoints.iter().find(|e| e.id == id)
    }
}

/// Top-level SDK error.
#[derive(thiserror::Error, Debug)]
pub enum SdkError {
    #[error("invalid config: {0}")]
    ConfigInvalid(String),
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("not connected")]
    NotConnected,
    #[error("{0} not ready")]
    ServerNotReady(EndpointId),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("websocket: {0}")]
    WebSocket(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reconnect exhausted after {0} attempts")]
    ReconnectExhausted(u32),
    #[error("shutdown")]
    Shutdown,
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SdkError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SdkError::ConfigInvalid(_) => "CONFIG_INVALID",
            SdkError::ConnectFailed(_) => "CONNECT_FAILED",
            SdkError::NotConnected => "NOT_CONNECTED",
            SdkError::ServerNotReady(_) => "SERVER_NOT_READY",
            SdkError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            SdkError::SendFailed(_) => "SEND_FAILED",
            SdkError::WebSocket(_) => "WEBSOCKET",
            SdkError::Timeout(_) => "TIMEOUT",
            SdkError::Protocol(_) | SdkError::Json(_) => "PROTOCOL",
            SdkError::ReconnectExhausted(_) => "RECONNECT_EXHAUSTED",
            SdkError::Shutdown => "SHUTDOWN",
            SdkError::Other(_) => "INTERNAL",
        }
    }
}
