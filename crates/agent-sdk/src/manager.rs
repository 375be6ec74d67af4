//! Connection manager: owns both endpoints, the session router, and every
//! background loop.
//!
//! Per connected endpoint two loops run: a read loop that dispatches
//! inbound requests and a keepalive loop that pings and watches for
//! staleness.  One app-heartbeat loop serves both endpoints.  A dropped
//! endpoint gets its own reconnect task and, once back, a stability timer.
//! Every task is spawned on one [`TaskTracker`] so [`close`] can join them.
//!
//! [`close`]: ConnectionManager::close

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::stream::SplitStream;
use futures_util::{FutureExt, StreamExt};
use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use xy_protocol::{
    clear_context_response, parse_inbound_request, tasks_cancel_response, JsonRpcResponse,
    OutboundEnvelope,
};

use crate::auth::Signer;
use crate::client::AgentClient;
use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, WsStream};
use crate::handler::{AgentHandler, NoopHandler};
use crate::router::SessionRouter;
use crate::tls;
use crate::types::{ConnectionSnapshot, EndpointId, SdkError};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ConnectionManager {
    config: ClientConfig,
    signer: Signer,
    endpoints: [Endpoint; 2],
    router: SessionRouter,
    handler: RwLock<Arc<dyn AgentHandler>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    heartbeat_started: AtomicBool,
}

impl ConnectionManager {
    /// Apply URL defaults and validate.  No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(mut config: ClientConfig) -> Result<Arc<Self>, SdkError> {
        config.apply_defaults();
        config.validate()?;
        let signer = Signer::new(&config.access_key, &config.secret_key, &config.agent_id);
        let endpoints = EndpointId::ALL.map(|id| Endpoint::new(id, config.url(id)));
        Ok(Arc::new(Self {
            config,
            signer,
            endpoints,
            router: SessionRouter::new(),
            handler: RwLock::new(Arc::new(NoopHandler)),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            heartbeat_started: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn routes(&self) -> &SessionRouter {
        &self.router
    }

    pub fn set_handler(&self, handler: Arc<dyn AgentHandler>) {
        *self.handler.write() = handler;
    }

    fn handler(&self) -> Arc<dyn AgentHandler> {
        self.handler.read().clone()
    }

    fn endpoint(&self, id: EndpointId) -> &Endpoint {
        &self.endpoints[id.index()]
    }

    // ── Public contract ──────────────────────────────────────────────

    /// Connect every endpoint of the current mode concurrently.
    ///
    /// Succeeds if at least one endpoint connects.  Endpoints that fail
    /// here are not retried; only endpoints that drop after connecting are
    /// reconnected automatically.
    pub async fn connect(self: &Arc<Self>) -> Result<(), SdkError> {
        self.config.validate()?;
        if self.shutdown.is_cancelled() {
            return Err(SdkError::Shutdown);
        }

        let targets = self.config.endpoints();
        let results = join_all(targets.iter().map(|&id| self.connect_endpoint(id))).await;

        let mut failures = Vec::new();
        for (id, result) in targets.iter().zip(results) {
            if let Err(e) = result {
                failures.push(format!("{id}: {e}"));
            }
        }
        if failures.len() == targets.len() {
            return Err(SdkError::ConnectFailed(failures.join("; ")));
        }

        self.start_app_heartbeat();
        Ok(())
    }

    /// At least one endpoint is connected and has sent its init envelope.
    pub fn is_ready(&self) -> bool {
        self.endpoints.iter().any(Endpoint::is_ready)
    }

    pub fn state(&self) -> ConnectionSnapshot {
        let endpoints: Vec<_> = self.endpoints.iter().map(Endpoint::snapshot).collect();
        ConnectionSnapshot {
            connected: endpoints.iter().any(|e| e.connected),
            reconnect_attempts: endpoints
                .iter()
                .map(|e| e.reconnect_attempts)
                .max()
                .unwrap_or(0),
            endpoints,
        }
    }

    /// Wrap `response` in an `agent_response` envelope and write it to the
    /// endpoint that last carried `session_id`.
    pub async fn send_response(
        &self,
        task_id: &str,
        session_id: &str,
        response: &JsonRpcResponse,
    ) -> Result<(), SdkError> {
        let id = self
            .router
            .route(session_id)
            .ok_or_else(|| SdkError::SessionNotFound(session_id.to_owned()))?;
        self.send_to(id, session_id, task_id, response).await
    }

    /// Stop every loop, close both sockets, and wait for all tasks to
    /// exit.  Idempotent.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handler = self.handler();
        for endpoint in &self.endpoints {
            let was_connected = {
                let mut st = endpoint.state.lock();
                let generation = st.generation;
                st.mark_disconnected(generation)
            };
            endpoint.close_sink(CLOSE_TIMEOUT).await;
            if was_connected {
                handler.on_state(endpoint.id, false);
            }
        }
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!("connection manager closed");
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open one endpoint, send init, and start its loops.  Returns the new
    /// connection generation.
    async fn connect_endpoint(self: &Arc<Self>, id: EndpointId) -> Result<u64, SdkError> {
        let endpoint = self.endpoint(id);
        {
            let st = endpoint.state.lock();
            if st.connected {
                return Ok(st.generation);
            }
        }
        if self.shutdown.is_cancelled() {
            return Err(SdkError::Shutdown);
        }

        let ws = match self.open(endpoint).await {
            Ok(ws) => ws,
            Err(SdkError::Shutdown) => return Err(SdkError::Shutdown),
            Err(e) => {
                tracing::warn!(endpoint = %id, url = %endpoint.url, error = %e, "connect failed");
                self.handler().on_error(id, &e);
                return Err(e);
            }
        };
        let (sink, stream) = ws.split();
        endpoint.install_sink(sink).await;
        let (generation, conn_token) = endpoint
            .state
            .lock()
            .mark_connected(Instant::now(), &self.shutdown);

        if self.shutdown.is_cancelled() {
            endpoint.state.lock().mark_disconnected(generation);
            endpoint.close_sink(CLOSE_TIMEOUT).await;
            return Err(SdkError::Shutdown);
        }

        tracing::info!(endpoint = %id, generation, "connected");
        let handler = self.handler();
        handler.on_state(id, true);

        let init = OutboundEnvelope::init(&self.config.agent_id);
        match self.send_envelope(id, &init).await {
            Ok(()) => {
                endpoint.state.lock().mark_ready(generation);
                tracing::info!(endpoint = %id, generation, "init sent, endpoint ready");
            }
            Err(e) => {
                tracing::warn!(endpoint = %id, error = %e, "init failed, endpoint not ready");
                handler.on_error(id, &e);
            }
        }

        let this = Arc::clone(self);
        let token = conn_token.clone();
        self.tasks
            .spawn(async move { this.read_loop(id, generation, stream, token).await });
        let this = Arc::clone(self);
        self.tasks
            .spawn(async move { this.keepalive_loop(id, generation, conn_token).await });

        Ok(generation)
    }

    /// Signed WebSocket handshake, bounded by the connect timeout.
    async fn open(&self, endpoint: &Endpoint) -> Result<WsStream, SdkError> {
        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SdkError::WebSocket(e.to_string()))?;
        for (name, value) in self.signer.headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| SdkError::ConfigInvalid(format!("header {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        let connector = tls::connector_for(&endpoint.url)?;

        tracing::info!(endpoint = %endpoint.id, url = %endpoint.url, "connecting");
        let timeout = self.config.connect_timeout();
        let handshake =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector);
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(SdkError::Shutdown),
            result = tokio::time::timeout(timeout, handshake) => match result {
                Ok(Ok((ws, _response))) => Ok(ws),
                Ok(Err(e)) => Err(SdkError::WebSocket(e.to_string())),
                Err(_) => Err(SdkError::Timeout(format!(
                    "handshake exceeded {}ms",
                    timeout.as_millis()
                ))),
            },
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        id: EndpointId,
        generation: u64,
        mut stream: SplitStream<WsStream>,
        token: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                _ = token.cancelled() => return,
                frame = stream.next() => frame,
            };
            match frame {
                Some(Ok(Frame::Text(text))) => {
                    self.touch(id, generation);
                    self.handle_inbound(id, text.as_bytes()).await;
                }
                Some(Ok(Frame::Binary(bytes))) => {
                    self.touch(id, generation);
                    self.handle_inbound(id, &bytes).await;
                }
                Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => {
                    self.touch(id, generation);
                }
                Some(Ok(Frame::Close(close))) => {
                    tracing::info!(endpoint = %id, ?close, "server closed connection");
                    break;
                }
                Some(Ok(Frame::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(endpoint = %id, error = %e, "read error");
                    break;
                }
                None => {
                    tracing::info!(endpoint = %id, "stream ended");
                    break;
                }
            }
        }
        self.handle_disconnect(id, generation).await;
    }

    async fn keepalive_loop(
        self: Arc<Self>,
        id: EndpointId,
        generation: u64,
        token: CancellationToken,
    ) {
        let period = self.config.protocol_ping_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let ping = Frame::Ping(Vec::new());
            if let Err(e) = self
                .endpoint(id)
                .send(ping, self.config.write_timeout())
                .await
            {
                tracing::warn!(endpoint = %id, error = %e, "ping failed");
                break;
            }
            tracing::trace!(endpoint = %id, "ping sent");

            let stale = self
                .endpoint(id)
                .state
                .lock()
                .is_stale(Instant::now(), self.config.heartbeat_timeout());
            if stale {
                tracing::warn!(
                    endpoint = %id,
                    timeout_ms = self.config.heartbeat_timeout_ms,
                    "heartbeat stale"
                );
                break;
            }
        }
        self.handle_disconnect(id, generation).await;
    }

    fn touch(&self, id: EndpointId, generation: u64) {
        self.endpoint(id)
            .state
            .lock()
            .touch(generation, Instant::now());
    }

    /// Tear down `generation` of endpoint `id` and hand it to the
    /// reconnect supervisor.  Only the first caller per generation acts.
    async fn handle_disconnect(self: &Arc<Self>, id: EndpointId, generation: u64) {
        let endpoint = self.endpoint(id);
        if !endpoint.state.lock().mark_disconnected(generation) {
            return;
        }
        endpoint.close_sink(CLOSE_TIMEOUT).await;
        tracing::warn!(endpoint = %id, generation, "disconnected");
        self.handler().on_state(id, false);

        if self.shutdown.is_cancelled() {
            return;
        }
        let this = Arc::clone(self);
        self.tasks.spawn(this.supervise(id));
    }

    // ── Reconnection ─────────────────────────────────────────────────

    /// Reconnect `id` with capped exponential back-off until it succeeds,
    /// the attempt budget runs out, or shutdown.
    fn supervise(self: Arc<Self>, id: EndpointId) -> BoxFuture<'static, ()> {
        async move {
            let policy = &self.config.reconnect;
            loop {
                let attempt = {
                    let mut st = self.endpoint(id).state.lock();
                    if policy.should_give_up(st.reconnect_attempts) {
                        None
                    } else {
                        st.reconnect_attempts += 1;
                        Some(st.reconnect_attempts - 1)
                    }
                };
                let Some(attempt) = attempt else {
                    let attempts = self.endpoint(id).state.lock().reconnect_attempts;
                    tracing::error!(endpoint = %id, attempts, "max reconnect attempts exhausted");
                    self.handler()
                        .on_error(id, &SdkError::ReconnectExhausted(attempts));
                    return;
                };

                let delay = policy.delay_for_attempt(attempt);
                tracing::info!(
                    endpoint = %id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.cancelled() => return,
                }

                match self.connect_endpoint(id).await {
                    Ok(generation) => {
                        self.spawn_stability_timer(id, generation);
                        return;
                    }
                    Err(SdkError::Shutdown) => return,
                    Err(_) => continue,
                }
            }
        }
        .boxed()
    }

    /// Reset the attempt counter once `generation` has stayed up for the
    /// stability threshold.
    fn spawn_stability_timer(self: &Arc<Self>, id: EndpointId, generation: u64) {
        let this = Arc::clone(self);
        let threshold = self.config.reconnect.stable_threshold();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(threshold) => {}
                _ = this.shutdown.cancelled() => return,
            }
            if this.endpoint(id).state.lock().reset_if_stable(generation) {
                tracing::info!(endpoint = %id, generation, "connection stable, attempts reset");
            }
        });
    }

    // ── Inbound dispatch ─────────────────────────────────────────────

    async fn handle_inbound(self: &Arc<Self>, id: EndpointId, bytes: &[u8]) {
        let handler = self.handler();
        let request = match parse_inbound_request(bytes) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(endpoint = %id, bytes = bytes.len(), error = %e, "dropping undecodable frame");
                handler.on_error(id, &SdkError::Protocol(e));
                return;
            }
        };

        if self.config.verify_agent_id
            && !request.agent_id.is_empty()
            && request.agent_id != self.config.agent_id
        {
            tracing::warn!(
                endpoint = %id,
                expected = %self.config.agent_id,
                got = %request.agent_id,
                "dropping request for another agent"
            );
            return;
        }

        let session_id = request.session_id().to_owned();
        if !session_id.is_empty() {
            self.router.record(&session_id, id);
        }
        tracing::debug!(
            endpoint = %id,
            method = %request.method,
            session_id = %session_id,
            task_id = %request.task_id(),
            "request received"
        );

        let control = request.is_clear_context() || request.is_tasks_cancel();
        if control && session_id.is_empty() {
            tracing::warn!(endpoint = %id, method = %request.method, "control request without session, dropped");
            return;
        }

        if request.is_clear_context() {
            handler.on_clear(&session_id);
            let ack = clear_context_response(&request.id, true);
            self.acknowledge(id, &session_id, &request.id, &ack).await;
            self.router.forget(&session_id);
        } else if request.is_tasks_cancel() {
            handler.on_cancel(&session_id, request.task_id());
            let ack = tasks_cancel_response(&request.id, true);
            self.acknowledge(id, &session_id, &request.id, &ack).await;
        } else {
            let client = AgentClient::from_manager(Arc::clone(self));
            if let Err(e) = handler.on_message(&client, request).await {
                tracing::warn!(endpoint = %id, session_id = %session_id, error = %e, "message handler failed");
                handler.on_error(id, &e);
            }
        }
    }

    /// Reply on the endpoint the request arrived on; failures are reported,
    /// not returned.
    async fn acknowledge(
        &self,
        id: EndpointId,
        session_id: &str,
        request_id: &str,
        ack: &JsonRpcResponse,
    ) {
        if let Err(e) = self.send_to(id, session_id, request_id, ack).await {
            tracing::warn!(endpoint = %id, session_id, error = %e, "acknowledgement failed");
            self.handler().on_error(id, &e);
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    async fn send_to(
        &self,
        id: EndpointId,
        session_id: &str,
        task_id: &str,
        response: &JsonRpcResponse,
    ) -> Result<(), SdkError> {
        let envelope =
            OutboundEnvelope::agent_response(&self.config.agent_id, session_id, task_id, response)?;
        self.send_envelope(id, &envelope).await
    }

    async fn send_envelope(&self, id: EndpointId, envelope: &OutboundEnvelope) -> Result<(), SdkError> {
        let text = envelope.to_json()?;
        tracing::trace!(endpoint = %id, bytes = text.len(), "sending");
        self.endpoint(id)
            .send_text(text, self.config.write_timeout())
            .await
    }

    fn start_app_heartbeat(self: &Arc<Self>) {
        if self.heartbeat_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            let period = this.config.app_heartbeat_interval();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            let heartbeat = OutboundEnvelope::heartbeat(&this.config.agent_id);
            loop {
                tokio::select! {
                    _ = this.shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                for &id in this.config.endpoints() {
                    match this.send_envelope(id, &heartbeat).await {
                        Ok(()) => tracing::trace!(endpoint = %id, "heartbeat sent"),
                        // No socket: the endpoint is down or reconnecting.
                        Err(SdkError::ServerNotReady(_)) => {}
                        Err(e) => tracing::debug!(endpoint = %id, error = %e, "heartbeat failed"),
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<ConnectionManager> {
        ConnectionManager::new(ClientConfig::new("ak", "sk", "agent")).unwrap()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = ConnectionManager::new(ClientConfig::new("ak", "", "agent"))
            .err()
            .unwrap();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn fresh_manager_is_idle() {
        let m = manager();
        assert!(!m.is_ready());
        let snap = m.state();
        assert!(!snap.connected);
        assert_eq!(snap.reconnect_attempts, 0);
        assert_eq!(snap.endpoints.len(), 2);
        assert!(snap.endpoint(EndpointId::Second).unwrap().since_heartbeat.is_none());
    }

    #[test]
    fn ready_if_any_endpoint_ready() {
        let m = manager();
        let token = CancellationToken::new();
        let gen = {
            let mut st = m.endpoint(EndpointId::Second).state.lock();
            let (gen, _) = st.mark_connected(Instant::now(), &token);
            gen
        };
        assert!(!m.is_ready());
        m.endpoint(EndpointId::Second).state.lock().mark_ready(gen);
        assert!(m.is_ready());
        assert!(m.state().connected);
        m.endpoint(EndpointId::Second)
            .state
            .lock()
            .mark_disconnected(gen);
        assert!(!m.is_ready());
    }

    #[tokio::test]
    async fn send_to_unknown_session_fails() {
        let m = manager();
        let resp = xy_protocol::status_response("m", "t", "x", xy_protocol::TaskState::Working);
        let err = m.send_response("t", "nope", &resp).await.unwrap_err();
        assert!(matches!(err, SdkError::SessionNotFound(ref s) if s == "nope"));
    }

    #[tokio::test]
    async fn routed_session_without_socket_is_not_ready() {
        let m = manager();
        m.routes().record("s1", EndpointId::Second);
        let resp = xy_protocol::status_response("m", "t", "x", xy_protocol::TaskState::Working);
        let err = m.send_response("t", "s1", &resp).await.unwrap_err();
        assert!(matches!(err, SdkError::ServerNotReady(EndpointId::Second)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_connect() {
        let m = manager();
        m.close().await;
        m.close().await;
        assert!(matches!(m.connect().await, Err(SdkError::Shutdown)));
    }
}
