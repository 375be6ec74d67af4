//! Application-facing client.  Cheap to clone; every clone drives the same
//! [`ConnectionManager`].

use std::sync::Arc;

use serde_json::Value;
use xy_protocol::{
    artifact_response, error_response, generate_id, push_response, status_response, Part,
    TaskState, PUSH_TASK_PREFIX,
};

use crate::config::ClientConfig;
use crate::handler::AgentHandler;
use crate::manager::ConnectionManager;
use crate::types::{ConnectionSnapshot, SdkError};

#[derive(Clone)]
pub struct AgentClient {
    manager: Arc<ConnectionManager>,
}

impl AgentClient {
    /// Validate `config` and build an idle client.
    pub fn new(config: ClientConfig) -> Result<Self, SdkError> {
        Ok(Self {
            manager: ConnectionManager::new(config)?,
        })
    }

    pub(crate) fn from_manager(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn set_handler(&self, handler: impl AgentHandler) {
        self.manager.set_handler(Arc::new(handler));
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub async fn connect(&self) -> Result<(), SdkError> {
        self.manager.connect().await
    }

    pub async fn close(&self) {
        self.manager.close().await
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    pub fn state(&self) -> ConnectionSnapshot {
        self.manager.state()
    }

    // ── Replies ──────────────────────────────────────────────────────

    /// Final, non-append text artifact.
    pub async fn reply(&self, task_id: &str, session_id: &str, text: &str) -> Result<(), SdkError> {
        self.reply_stream(task_id, session_id, text, true, false).await
    }

    pub async fn reply_stream(
        &self,
        task_id: &str,
        session_id: &str,
        text: &str,
        is_final: bool,
        append: bool,
    ) -> Result<(), SdkError> {
        self.reply_parts(task_id, session_id, vec![Part::text(text)], is_final, append)
            .await
    }

    /// Artifact with arbitrary parts (files, structured data).
    pub async fn reply_parts(
        &self,
        task_id: &str,
        session_id: &str,
        parts: Vec<Part>,
        is_final: bool,
        append: bool,
    ) -> Result<(), SdkError> {
        self.ensure_ready()?;
        let resp = artifact_response(&generate_id(), task_id, parts, is_final, append);
        self.manager.send_response(task_id, session_id, &resp).await
    }

    pub async fn send_status(
        &self,
        task_id: &str,
        session_id: &str,
        text: &str,
        state: TaskState,
    ) -> Result<(), SdkError> {
        self.ensure_ready()?;
        let resp = status_response(&generate_id(), task_id, text, state);
        self.manager.send_response(task_id, session_id, &resp).await
    }

    /// JSON-RPC error reply.  `code` is passed through verbatim.
    pub async fn send_error(
        &self,
        task_id: &str,
        session_id: &str,
        code: impl Into<Value>,
        message: &str,
    ) -> Result<(), SdkError> {
        self.ensure_ready()?;
        let resp = error_response(&generate_id(), code.into(), message);
        self.manager.send_response(task_id, session_id, &resp).await
    }

    /// Unsolicited message for a session.  The task ID is synthesised as
    /// `push_<message id>`.
    pub async fn push(&self, session_id: &str, text: &str) -> Result<(), SdkError> {
        self.ensure_ready()?;
        let message_id = generate_id();
        let task_id = format!("{PUSH_TASK_PREFIX}{message_id}");
        let resp = push_response(&message_id, &task_id, text, vec![Part::text(text)]);
        self.manager.send_response(&task_id, session_id, &resp).await
    }

    fn ensure_ready(&self) -> Result<(), SdkError> {
        if self.manager.is_ready() {
            Ok(())
        } else {
            Err(SdkError::NotConnected)
        }
    }
}
