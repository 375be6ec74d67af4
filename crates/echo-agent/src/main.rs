//! Reference echo agent.
//!
//! Connects to both endpoints and answers every message:
//!
//! - `/long <text>` - reports `working`, then streams the reply in two
//!                    chunks after a delay from a background task
//! - `/fail`        - replies with a JSON-RPC error
//! - anything else  - replies `Echo: <text>`
//!
//! Usage:
//!   XIAOYI_AK=ak XIAOYI_SK=sk XIAOYI_AGENT_ID=agent xy-echo-agent
//!
//! Env vars:
//!   XIAOYI_AK, XIAOYI_SK, XIAOYI_AGENT_ID - credentials (required)
//!   XIAOYI_WS_URL_1, XIAOYI_WS_URL_2      - endpoint overrides
//!   XIAOYI_SINGLE_SERVER                  - `1`/`true` to use endpoint-1 only
//!   XIAOYI_PUSH_SESSION                   - session to push periodic updates to
//!   XIAOYI_PUSH_INTERVAL_SECS             - push cadence (default: 60)

use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::EnvFilter;
use xy_agent_sdk::{AgentClient, AgentHandler, ClientConfig, EndpointId, Message, SdkError, TaskState};

const LONG_PREFIX: &str = "/long";
const LONG_DELAY: Duration = Duration::from_secs(3);

struct EchoHandler;

#[async_trait::async_trait]
impl AgentHandler for EchoHandler {
    async fn on_message(&self, client: &AgentClient, msg: Message) -> Result<(), SdkError> {
        let text = msg.text().trim().to_string();
        let task_id = msg.task_id().to_string();
        let session_id = msg.session_id().to_string();
        tracing::info!(session_id = %session_id, task_id = %task_id, text = %text, "message");

        if let Some(rest) = text.strip_prefix(LONG_PREFIX) {
            client
                .send_status(&task_id, &session_id, "Working on it...", TaskState::Working)
                .await?;
            // Reply from a background task so the read loop keeps going.
            let client = client.clone();
            let body = rest.trim().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(LONG_DELAY).await;
                let result = async {
                    client
                        .reply_stream(&task_id, &session_id, "Done thinking. ", false, false)
                        .await?;
                    client
                        .reply_stream(&task_id, &session_id, &format!("Echo: {body}"), true, true)
                        .await
                }
                .await;
                if let Err(e) = result {
                    tracing::warn!(task_id = %task_id, error = %e, "delayed reply failed");
                }
            });
            return Ok(());
        }

        if text == "/fail" {
            return client
                .send_error(&task_id, &session_id, "ECHO_FAIL", "failure requested")
                .await;
        }

        client
            .reply(&task_id, &session_id, &format!("Echo: {text}"))
            .await
    }

    fn on_clear(&self, session_id: &str) {
        tracing::info!(session_id, "context cleared");
    }

    fn on_cancel(&self, session_id: &str, task_id: &str) {
        tracing::info!(session_id, task_id, "task cancelled");
    }

    fn on_error(&self, endpoint: EndpointId, error: &SdkError) {
        tracing::warn!(endpoint = %endpoint, code = error.code(), error = %error, "client error");
    }

    fn on_state(&self, endpoint: EndpointId, connected: bool) {
        tracing::info!(endpoint = %endpoint, connected, "endpoint state");
    }
}

fn env_required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} is required"))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn config_from_env() -> anyhow::Result<ClientConfig> {
    let config = ClientConfig::builder()
        .access_key(env_required("XIAOYI_AK")?)
        .secret_key(env_required("XIAOYI_SK")?)
        .agent_id(env_required("XIAOYI_AGENT_ID")?)
        .ws_url_1(std::env::var("XIAOYI_WS_URL_1").unwrap_or_default())
        .ws_url_2(std::env::var("XIAOYI_WS_URL_2").unwrap_or_default())
        .single_server(env_flag("XIAOYI_SINGLE_SERVER"))
        .build()?;
    Ok(config)
}

async fn push_loop(client: AgentClient, session_id: String, every: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        interval.tick().await;
        let text = format!("Scheduled update at {}", Utc::now().format("%H:%M:%S"));
        match client.push(&session_id, &text).await {
            Ok(()) => tracing::info!(session_id = %session_id, "push sent"),
            Err(e) => tracing::warn!(session_id = %session_id, code = e.code(), error = %e, "push failed"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from_env()?;
    tracing::info!(
        agent_id = %config.agent_id,
        ws_url_1 = %config.ws_url_1,
        ws_url_2 = %config.ws_url_2,
        single_server = config.single_server,
        "starting echo agent"
    );

    let client = AgentClient::new(config)?;
    client.set_handler(EchoHandler);
    client.connect().await?;
    tracing::info!(state = ?client.state(), "connected");

    let pusher = match std::env::var("XIAOYI_PUSH_SESSION") {
        Ok(session) if !session.is_empty() => {
            let secs = std::env::var("XIAOYI_PUSH_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(60);
            Some(tokio::spawn(push_loop(
                client.clone(),
                session,
                Duration::from_secs(secs),
            )))
        }
        _ => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    if let Some(pusher) = pusher {
        pusher.abort();
    }
    client.close().await;
    tracing::info!("agent exiting");
    Ok(())
}
