//! Application callbacks.

use async_trait::async_trait;

use crate::client::AgentClient;
use crate::types::{EndpointId, SdkError};

/// An inbound user request as seen by the application.
pub type Message = xy_protocol::InboundRequest;

/// Callbacks invoked by the connection manager.
///
/// All callbacks run inside the read loop of the endpoint that received
/// the frame.  `on_message` is awaited before the next frame from that
/// endpoint is read, so long-running work belongs in a spawned task that
/// replies through a cloned [`AgentClient`].
///
/// # Example
///
/// ```rust,no_run
/// use xy_agent_sdk::{AgentClient, AgentHandler, Message, SdkError};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl AgentHandler for Echo {
///     async fn on_message(&self, client: &AgentClient, msg: Message) -> Result<(), SdkError> {
///         let text = format!("Echo: {}", msg.text());
///         client.reply(msg.task_id(), msg.session_id(), &text).await
///     }
/// }
/// ```
#[async_trait]
pub trait AgentHandler: Send + Sync + 'static {
    /// A request that is neither `clearContext` nor `tasks/cancel`.
    /// An `Err` is logged and forwarded to [`on_error`](Self::on_error).
    async fn on_message(&self, client: &AgentClient, message: Message) -> Result<(), SdkError>;

    /// The session's context was cleared upstream.  The acknowledgement is
    /// sent by the SDK.
    fn on_clear(&self, _session_id: &str) {}

    /// A task was cancelled upstream.  The acknowledgement is sent by the
    /// SDK.
    fn on_cancel(&self, _session_id: &str, _task_id: &str) {}

    fn on_error(&self, _endpoint: EndpointId, _error: &SdkError) {}

    /// `connected` flips to `true` on every successful (re)connect and to
    /// `false` on every drop.
    fn on_state(&self, _endpoint: EndpointId, _connected: bool) {}
}

/// Installed until the application registers its own handler.
pub(crate) struct NoopHandler;

#[async_trait]
impl AgentHandler for NoopHandler {
    async fn on_message(&self, _client: &AgentClient, message: Message) -> Result<(), SdkError> {
        tracing::debug!(
            session_id = %message.session_id(),
            task_id = %message.task_id(),
            "no handler registered, message ignored"
        );
        Ok(())
    }
}
