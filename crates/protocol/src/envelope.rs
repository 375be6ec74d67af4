//! Outer transport envelope written by the agent.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::response::JsonRpcResponse;

/// Envelope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    /// First frame after the socket opens.
    #[serde(rename = "clawd_bot_init")]
    Init,
    /// Application-level liveness, sent to every endpoint on a fixed cadence.
    #[serde(rename = "heartbeat")]
    Heartbeat,
    /// Wraps a serialized [`JsonRpcResponse`] in `msgDetail`.
    #[serde(rename = "agent_response")]
    AgentResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    #[serde(rename = "msgType")]
    pub msg_type: MsgType,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(default, rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, rename = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, rename = "msgDetail", skip_serializing_if = "Option::is_none")]
    pub msg_detail: Option<String>,
}

impl OutboundEnvelope {
    pub fn init(agent_id: impl Into<String>) -> Self {
        Self::bare(MsgType::Init, agent_id.into())
    }

    pub fn heartbeat(agent_id: impl Into<String>) -> Self {
        Self::bare(MsgType::Heartbeat, agent_id.into())
    }

    /// Wrap `response` for delivery; the inner response is serialized into
    /// `msgDetail` as a JSON string.
    pub fn agent_response(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        task_id: impl Into<String>,
        response: &JsonRpcResponse,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            msg_type: MsgType::AgentResponse,
            agent_id: agent_id.into(),
            session_id: Some(session_id.into()),
            task_id: Some(task_id.into()),
            msg_detail: Some(serde_json::to_string(response)?),
        })
    }

    fn bare(msg_type: MsgType, agent_id: String) -> Self {
        Self {
            msg_type,
            agent_id,
            session_id: None,
            task_id: None,
            msg_detail: None,
        }
    }

    /// Decode the inner response, if this envelope carries one.
    pub fn detail(&self) -> Option<Result<JsonRpcResponse, ProtocolError>> {
        self.msg_detail.as_deref().map(JsonRpcResponse::from_json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_omits_optional_fields() {
        let v = serde_json::to_value(OutboundEnvelope::init("agent-1")).unwrap();
        assert_eq!(v, json!({"msgType": "clawd_bot_init", "agentId": "agent-1"}));
    }

    #[test]
    fn heartbeat_shape() {
        let v = serde_json::to_value(OutboundEnvelope::heartbeat("agent-1")).unwrap();
        assert_eq!(v, json!({"msgType": "heartbeat", "agentId": "agent-1"}));
    }

    #[test]
    fn agent_response_detail_is_a_json_string() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: "m1".into(),
            result: None,
            error: None,
        };
        let env = OutboundEnvelope::agent_response("a", "s", "t", &resp).unwrap();
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["msgType"], "agent_response");
        assert!(v["msgDetail"].is_string());
        assert_eq!(env.detail().unwrap().unwrap(), resp);
    }
}
