//! One upstream WebSocket endpoint: its flags, liveness clock, attempt
//! counter, and the write half of the socket.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::types::{EndpointId, EndpointSnapshot, SdkError};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;

/// Mutable per-endpoint state.  Invariant: `ready` implies `connected`.
///
/// Every successful connect bumps `generation`; transitions carrying a
/// stale generation are ignored.
#[derive(Debug, Default)]
pub(crate) struct EndpointState {
    pub connected: bool,
    pub ready: bool,
    pub last_heartbeat: Option<Instant>,
    pub reconnect_attempts: u32,
    pub generation: u64,
    conn_cancel: Option<CancellationToken>,
}

impl EndpointState {
    /// Start a new connection.  Returns its generation and a token that is
    /// cancelled when the connection ends (or when `parent` is cancelled).
    pub fn mark_connected(
        &mut self,
        now: Instant,
        parent: &CancellationToken,
    ) -> (u64, CancellationToken) {
        if let Some(old) = self.conn_cancel.take() {
            old.cancel();
        }
        self.generation += 1;
        self.connected = true;
        self.ready = false;
        self.last_heartbeat = Some(now);
        let token = parent.child_token();
        self.conn_cancel = Some(token.clone());
        (self.generation, token)
    }

    pub fn mark_ready(&mut self, generation: u64) -> bool {
        if generation == self.generation && self.connected {
            self.ready = true;
            true
        } else {
            false
        }
    }

    /// Returns `false` if this generation was already torn down.
    pub fn mark_disconnected(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.connected {
            return false;
        }
        self.connected = false;
        self.ready = false;
        if let Some(token) = self.conn_cancel.take() {
            token.cancel();
        }
        true
    }

    pub fn touch(&mut self, generation: u64, now: Instant) {
        if generation == self.generation {
            self.last_heartbeat = Some(now);
        }
    }

    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.last_heartbeat
            .is_some_and(|t| now.saturating_duration_since(t) > timeout)
    }

    /// Reset the attempt counter if `generation` is still the live
    /// connection.
    pub fn reset_if_stable(&mut self, generation: u64) -> bool {
        if generation == self.generation && self.connected {
            self.reconnect_attempts = 0;
            true
        } else {
            false
        }
    }
}

pub(crate) struct Endpoint {
    pub id: EndpointId,
    pub url: String,
    pub state: Mutex<EndpointState>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
}

impl Endpoint {
    pub fn new(id: EndpointId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            state: Mutex::new(EndpointState::default()),
            sink: tokio::sync::Mutex::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        let st = self.state.lock();
        EndpointSnapshot {
            id: self.id,
            connected: st.connected,
            ready: st.ready,
            reconnect_attempts: st.reconnect_attempts,
            since_heartbeat: st.last_heartbeat.map(|t| t.elapsed()),
        }
    }

    pub async fn install_sink(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    /// Detach and close the write half, if any.
    pub async fn close_sink(&self, timeout: Duration) {
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match tokio::time::timeout(timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(endpoint = %self.id, error = %e, "close frame failed"),
                Err(_) => tracing::debug!(endpoint = %self.id, "close frame timed out"),
            }
        }
    }

    /// Write one frame.  Writers queue on the sink mutex, so frames from
    /// concurrent callers never interleave.
    pub async fn send(&self, frame: Message, timeout: Duration) -> Result<(), SdkError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(SdkError::ServerNotReady(self.id))?;
        match tokio::time::timeout(timeout, sink.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SdkError::SendFailed(format!("{}: {e}", self.id))),
            Err(_) => Err(SdkError::SendFailed(format!(
                "{}: write timed out after {}ms",
                self.id,
                timeout.as_millis()
            ))),
        }
    }

    pub async fn send_text(&self, text: String, timeout: Duration) -> Result<(), SdkError> {
        self.send(Message::Text(text), timeout).await
    }
}
