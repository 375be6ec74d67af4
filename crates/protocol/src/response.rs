//! Inner JSON-RPC response carried (as a JSON string) in an
//! `agent_response` envelope's `msgDetail`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::part::{lenient_parts, Part};
use crate::request::MessageBody;

pub const KIND_ARTIFACT_UPDATE: &str = "artifact-update";
pub const KIND_STATUS_UPDATE: &str = "status-update";
pub const KIND_PUSH: &str = "task";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Decode a response from its JSON text (e.g. an envelope's `msgDetail`).
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// JSON-RPC error object.  `code` is opaque: servers use both numbers and
/// strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: Value,
    pub message: String,
}

/// The five disjoint `result` shapes.
///
/// Three carry a `kind` discriminator (`artifact-update`, `status-update`,
/// `task`).  The clear-context and tasks-cancel acknowledgements carry none
/// and are told apart by the presence of `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    ArtifactUpdate(ArtifactUpdate),
    StatusUpdate(StatusUpdate),
    ClearContext(ClearContextResult),
    TasksCancel(TasksCancelResult),
    Push(PushUpdate),
}

impl ResultPayload {
    /// Wire `kind`, if this shape carries one.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            ResultPayload::ArtifactUpdate(_) => Some(KIND_ARTIFACT_UPDATE),
            ResultPayload::StatusUpdate(_) => Some(KIND_STATUS_UPDATE),
            ResultPayload::Push(_) => Some(KIND_PUSH),
            ResultPayload::ClearContext(_) | ResultPayload::TasksCancel(_) => None,
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    kind: &'static str,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for ResultPayload {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultPayload::ArtifactUpdate(inner) => Tagged {
                kind: KIND_ARTIFACT_UPDATE,
                inner,
            }
            .serialize(s),
            ResultPayload::StatusUpdate(inner) => Tagged {
                kind: KIND_STATUS_UPDATE,
                inner,
            }
            .serialize(s),
            ResultPayload::Push(inner) => Tagged {
                kind: KIND_PUSH,
                inner,
            }
            .serialize(s),
            ResultPayload::ClearContext(inner) => inner.serialize(s),
            ResultPayload::TasksCancel(inner) => inner.serialize(s),
        }
    }
}

impl<'de> Deserialize<'de> for ResultPayload {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        let kind = value.get("kind").and_then(Value::as_str).map(str::to_owned);
        let decoded = match kind.as_deref() {
            Some(KIND_ARTIFACT_UPDATE) => {
                serde_json::from_value(value).map(ResultPayload::ArtifactUpdate)
            }
            Some(KIND_STATUS_UPDATE) => serde_json::from_value(value).map(ResultPayload::StatusUpdate),
            Some(KIND_PUSH) => serde_json::from_value(value).map(ResultPayload::Push),
            Some(other) => return Err(D::Error::custom(format!("unknown result kind: {other}"))),
            None if value.get("id").is_some() => {
                serde_json::from_value(value).map(ResultPayload::TasksCancel)
            }
            None => serde_json::from_value(value).map(ResultPayload::ClearContext),
        };
        decoded.map_err(D::Error::custom)
    }
}

// ── Result shapes ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactUpdate {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(default)]
    pub append: bool,
    #[serde(default, rename = "lastChunk")]
    pub last_chunk: bool,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub artifact: ArtifactPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    #[serde(deserialize_with = "lenient_parts")]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub status: StatusPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub message: MessageBody,
    pub state: TaskState,
}

/// Lifecycle state reported in a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
}

/// `{ "state": "…" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOnly {
    pub state: String,
}

impl StateOnly {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearContextResult {
    pub status: StateOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksCancelResult {
    pub id: String,
    pub status: StateOnly,
}

/// Unsolicited push: not a reply to any inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushUpdate {
    pub id: String,
    #[serde(rename = "pushId")]
    pub push_id: String,
    #[serde(rename = "pushText")]
    pub push_text: String,
    pub artifacts: Vec<ArtifactPayload>,
    pub status: StateOnly,
}
