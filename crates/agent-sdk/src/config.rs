use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::Uri;

use crate::builder::ClientConfigBuilder;
use crate::reconnect::ReconnectPolicy;
use crate::types::{EndpointId, SdkError};

pub const DEFAULT_WS_URL_1: &str = "wss://hag.cloud.huawei.com/openclaw/v1/ws/link";
pub const DEFAULT_WS_URL_2: &str = "wss://116.63.174.231/openclaw/v1/ws/link";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub agent_id: String,
    #[serde(default = "d_ws_url_1")]
    pub ws_url_1: String,
    #[serde(default = "d_ws_url_2")]
    pub ws_url_2: String,
    /// Connect `endpoint-1` only.
    #[serde(default)]
    pub single_server: bool,
    /// Drop inbound requests addressed to a different agent.
    #[serde(default = "d_true")]
    pub verify_agent_id: bool,
    /// Transport-level ping cadence per endpoint.
    #[serde(default = "d_protocol_ping")]
    pub protocol_ping_interval_ms: u64,
    /// Application `heartbeat` envelope cadence, sent to every endpoint.
    #[serde(default = "d_app_heartbeat")]
    pub app_heartbeat_interval_ms: u64,
    /// An endpoint with no inbound frame or pong for this long is dropped.
    #[serde(default = "d_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "d_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "d_write_timeout")]
    pub write_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("ws_url_1", &self.ws_url_1)
            .field("ws_url_2", &self.ws_url_2)
            .field("single_server", &self.single_server)
            .field("verify_agent_id", &self.verify_agent_id)
            .field("protocol_ping_interval_ms", &self.protocol_ping_interval_ms)
            .field("app_heartbeat_interval_ms", &self.app_heartbeat_interval_ms)
            .field("heartbeat_timeout_ms", &self.heartbeat_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            agent_id: agent_id.into(),
            ws_url_1: d_ws_url_1(),
            ws_url_2: d_ws_url_2(),
            single_server: false,
            verify_agent_id: true,
            protocol_ping_interval_ms: d_protocol_ping(),
            app_heartbeat_interval_ms: d_app_heartbeat(),
            heartbeat_timeout_ms: d_heartbeat_timeout(),
            connect_timeout_ms: d_connect_timeout(),
            write_timeout_ms: d_write_timeout(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Replace empty URLs with the built-in endpoints.
    pub fn apply_defaults(&mut self) {
        if self.ws_url_1.trim().is_empty() {
            self.ws_url_1 = d_ws_url_1();
        }
        if self.ws_url_2.trim().is_empty() {
            self.ws_url_2 = d_ws_url_2();
        }
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        for (name, value) in [
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("agent_id", &self.agent_id),
        ] {
            if value.trim().is_empty() {
                return Err(SdkError::ConfigInvalid(format!("{name} is required")));
            }
        }
        for id in self.endpoints() {
            let url = self.url(*id);
            let uri: Uri = url
                .parse()
                .map_err(|e| SdkError::ConfigInvalid(format!("{id} url {url:?}: {e}")))?;
            if !matches!(uri.scheme_str(), Some("ws" | "wss")) || uri.host().is_none() {
                return Err(SdkError::ConfigInvalid(format!(
                    "{id} url {url:?} must be ws:// or wss:// with a host"
                )));
            }
        }
        for (name, ms) in [
            ("protocol_ping_interval_ms", self.protocol_ping_interval_ms),
            ("app_heartbeat_interval_ms", self.app_heartbeat_interval_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
        ] {
            if ms == 0 {
                return Err(SdkError::ConfigInvalid(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Endpoints used in the current mode.
    pub fn endpoints(&self) -> &'static [EndpointId] {
        if self.single_server {
            &[EndpointId::First]
        } else {
            &EndpointId::ALL
        }
    }

    pub fn url(&self, id: EndpointId) -> &str {
        match id {
            EndpointId::First => &self.ws_url_1,
            EndpointId::Second => &self.ws_url_2,
        }
    }

    pub fn protocol_ping_interval(&self) -> Duration {
        Duration::from_millis(self.protocol_ping_interval_ms)
    }

    pub fn app_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.app_heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_ws_url_1() -> String {
    DEFAULT_WS_URL_1.into()
}
fn d_ws_url_2() -> String {
    DEFAULT_WS_URL_2.into()
}
fn d_true() -> bool {
    true
}
fn d_protocol_ping() -> u64 {
    30_000
}
fn d_app_heartbeat() -> u64 {
    20_000
}
fn d_heartbeat_timeout() -> u64 {
    90_000
}
fn d_connect_timeout() -> u64 {
    30_000
}
fn d_write_timeout() -> u64 {
    10_000
}
