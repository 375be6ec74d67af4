//! Builder pattern for constructing a [`ClientConfig`].

use std::time::Duration;

use crate::config::ClientConfig;
use crate::reconnect::ReconnectPolicy;
use crate::types::SdkError;

/// Fluent builder for [`ClientConfig`].
///
/// # Example
///
/// ```rust,no_run
/// # use xy_agent_sdk::ClientConfig;
/// let config = ClientConfig::builder()
///     .access_key("ak")
///     .secret_key("sk")
///     .agent_id("agent-42")
///     .single_server(true)
///     .build()
///     .unwrap();
/// ```
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::new("", "", ""),
        }
    }

    // ── Credentials ──────────────────────────────────────────────────

    pub fn access_key(mut self, ak: impl Into<String>) -> Self {
        self.config.access_key = ak.into();
        self
    }

    pub fn secret_key(mut self, sk: impl Into<String>) -> Self {
        self.config.secret_key = sk.into();
        self
    }

    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.config.agent_id = id.into();
        self
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Override the first endpoint URL.  Empty means the built-in default.
    pub fn ws_url_1(mut self, url: impl Into<String>) -> Self {
        self.config.ws_url_1 = url.into();
        self
    }

    /// Override the second endpoint URL.  Empty means the built-in default.
    pub fn ws_url_2(mut self, url: impl Into<String>) -> Self {
        self.config.ws_url_2 = url.into();
        self
    }

    pub fn single_server(mut self, on: bool) -> Self {
        self.config.single_server = on;
        self
    }

    pub fn verify_agent_id(mut self, on: bool) -> Self {
        self.config.verify_agent_id = on;
        self
    }

    // ── Timing ───────────────────────────────────────────────────────

    pub fn protocol_ping_interval(mut self, d: Duration) -> Self {
        self.config.protocol_ping_interval_ms = millis(d);
        self
    }

    pub fn app_heartbeat_interval(mut self, d: Duration) -> Self {
        self.config.app_heartbeat_interval_ms = millis(d);
        self
    }

    pub fn heartbeat_timeout(mut self, d: Duration) -> Self {
        self.config.heartbeat_timeout_ms = millis(d);
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.config.connect_timeout_ms = millis(d);
        self
    }

    pub fn write_timeout(mut self, d: Duration) -> Self {
        self.config.write_timeout_ms = millis(d);
        self
    }

    /// Override the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Apply URL defaults and validate.
    pub fn build(mut self) -> Result<ClientConfig, SdkError> {
        self.config.apply_defaults();
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
