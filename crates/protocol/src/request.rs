//! Inbound request envelope sent by the server.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::part::{lenient_parts, Part};
use crate::{METHOD_CLEAR_CONTEXT, METHOD_TASKS_CANCEL};

/// Legacy spelling of `clearContext`, carried in `action`.
const ACTION_CLEAR: &str = "clear";

/// A JSON-RPC-shaped request delivered over an endpoint.
///
/// The session ID may appear at the top level, inside `params`, or both;
/// [`session_id`](Self::session_id) resolves it.
///
/// `clearContext` and `tasks/cancel` frames usually carry no `params`.
/// For those the task ID comes from the top-level `taskId`, falling back to
/// the request `id`.  Every other request must carry `params.message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct InboundRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub params: RequestParams,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    jsonrpc: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "agentId")]
    agent_id: String,
    #[serde(default, rename = "deviceId")]
    device_id: Option<String>,
    #[serde(default, rename = "conversationId")]
    conversation_id: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
    #[serde(default, rename = "taskId")]
    task_id: Option<String>,
    #[serde(default)]
    params: Option<RequestParams>,
}

impl TryFrom<RawRequest> for InboundRequest {
    type Error = ProtocolError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let control = is_control(&raw.method, raw.action.as_deref());
        let params = match raw.params {
            Some(p) => p,
            None if control => RequestParams {
                id: raw
                    .task_id
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| raw.id.clone()),
                ..RequestParams::default()
            },
            None => return Err(ProtocolError::MissingField("params")),
        };
        Ok(Self {
            jsonrpc: raw.jsonrpc,
            id: raw.id,
            method: raw.method,
            action: raw.action,
            agent_id: raw.agent_id,
            device_id: raw.device_id,
            conversation_id: raw.conversation_id,
            session_id: raw.session_id,
            params,
        })
    }
}

fn is_control(method: &str, action: Option<&str>) -> bool {
    matches!(method, METHOD_CLEAR_CONTEXT | METHOD_TASKS_CANCEL)
        || matches!(action, Some(ACTION_CLEAR | METHOD_TASKS_CANCEL))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(
        default,
        rename = "agentLoginSessionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_login_session_id: Option<String>,
    pub message: MessageBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(deserialize_with = "lenient_parts")]
    pub parts: Vec<Part>,
}

impl MessageBody {
    pub fn agent(parts: Vec<Part>) -> Self {
        Self {
            kind: None,
            message_id: None,
            role: "agent".into(),
            parts,
        }
    }
}

impl InboundRequest {
    pub fn task_id(&self) -> &str {
        &self.params.id
    }

    /// Non-empty `params.sessionId`, else the top-level `sessionId`, else "".
    pub fn session_id(&self) -> &str {
        match self.params.session_id.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => self.session_id.as_deref().unwrap_or(""),
        }
    }

    /// Text of the first text part, or "".
    pub fn text(&self) -> &str {
        self.params
            .message
            .parts
            .iter()
            .find_map(Part::as_text)
            .unwrap_or("")
    }

    pub fn parts(&self) -> &[Part] {
        &self.params.message.parts
    }

    pub fn is_clear_context(&self) -> bool {
        self.method == METHOD_CLEAR_CONTEXT || self.action.as_deref() == Some(ACTION_CLEAR)
    }

    pub fn is_tasks_cancel(&self) -> bool {
        self.method == METHOD_TASKS_CANCEL || self.action.as_deref() == Some(METHOD_TASKS_CANCEL)
    }
}
