//! Wire protocol for the agent link: the outbound envelope, the inner
//! JSON-RPC response carried in `msgDetail`, and the inbound request with
//! its polymorphic part list.
//!
//! Everything here is pure data + serde.  Connection handling lives in
//! `xy-agent-sdk`.
//!
//! ```text
//! outbound  { msgType, agentId, sessionId?, taskId?, msgDetail? }
//!                                                      │
//!                                  JSON string of ─────┘
//!                                  { jsonrpc, id, result? | error? }
//!
//! inbound   { jsonrpc, id, method, agentId, sessionId?, params: {
//!               id, sessionId?, message: { role, parts: [Part] } } }
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod part;
pub mod request;
pub mod response;

pub use codec::{
    artifact_response, clear_context_response, error_response, generate_id,
    parse_inbound_request, push_response, status_response, tasks_cancel_response,
};
pub use envelope::{MsgType, OutboundEnvelope};
pub use error::ProtocolError;
pub use part::{FileContent, Part};
pub use request::{InboundRequest, MessageBody, RequestParams};
pub use response::{
    ArtifactPayload, ArtifactUpdate, ClearContextResult, JsonRpcError, JsonRpcResponse,
    PushUpdate, ResultPayload, StateOnly, StatusPayload, StatusUpdate, TaskState,
    TasksCancelResult,
};

/// JSON-RPC version string stamped on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Inbound method asking the agent to drop a session's context.
pub const METHOD_CLEAR_CONTEXT: &str = "clearContext";

/// Inbound method asking the agent to cancel a running task.
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";

/// Prefix of the synthetic task ID generated for unsolicited pushes.
pub const PUSH_TASK_PREFIX: &str = "push_";
