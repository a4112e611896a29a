//! Session Core
//!
//! The bidirectional dispatcher and correlator both peers run: one logical
//! inbound loop that routes requests to a [`RequestDispatcher`], feeds
//! notifications to lifecycle handling and the broadcast stream, and settles
//! outbound waiters when responses arrive.
//!
//! # Shared state
//!
//! Four concurrent structures carry a session, each local and finite:
//! pending-outbound (correlation manager), in-flight-inbound (cancellation
//! flags), the task registry (server side), and the transport writer mutex
//! inside the transport. No lock is ever held across an await on another
//! lock or on I/O.
//!
//! # Cancellation
//!
//! `notifications/cancelled` flips the in-flight flag for its request id.
//! The dispatcher reads-and-removes that flag atomically right before
//! emitting a response; a flagged request's response is suppressed entirely.
//! Running handler code is never interrupted; handlers that want early
//! abort poll [`is_cancelled`] (ambient) or [`Session::request_cancelled`].

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};
use crate::correlation::{CorrelationConfig, CorrelationManager};
use crate::protocol::constants::{defaults, notifications};
use crate::protocol::messages::{CancelledParams, LoggingMessageParams, ProgressParams};
use crate::protocol::{
    ClientCapabilities, Implementation, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, LogLevel, RequestId, ServerCapabilities,
};
use crate::transport::{MessageReceiver, Transport};

tokio::task_local! {
    /// Per-request context established by the dispatcher around every
    /// handler invocation. Carries the progress token and the cancellation
    /// flag so handler code needs no explicit session plumbing.
    static REQUEST_SCOPE: RequestScope;
}

#[derive(Clone)]
struct RequestScope {
    cancelled: Arc<AtomicBool>,
    progress_token: Option<Value>,
    session: Arc<Session>,
}

/// Emit `notifications/progress` for the request currently being served.
///
/// No-ops outside a handler invocation or when the request carried no
/// `_meta.progressToken`.
///
/// # Errors
///
/// Returns the transport error when the notification cannot be sent.
pub async fn send_progress(
    progress: f64,
    total: Option<f64>,
    message: Option<String>,
) -> McpResult<()> {
    let scope = match REQUEST_SCOPE.try_with(|scope| scope.clone()) {
        Ok(scope) => scope,
        Err(_) => return Ok(()),
    };
    let Some(token) = scope.progress_token else {
        return Ok(());
    };

    let params = ProgressParams {
        progress_token: token,
        progress,
        total,
        message,
    };
    scope
        .session
        .notify(notifications::PROGRESS, Some(serde_json::to_value(params)?))
        .await
}

/// Whether the request currently being served was cancelled by the peer.
///
/// Returns `false` outside a handler invocation.
pub fn is_cancelled() -> bool {
    REQUEST_SCOPE
        .try_with(|scope| scope.cancelled.load(Ordering::Acquire))
        .unwrap_or(false)
}

/// Peer-specific request handling plugged into the session's inbound loop.
///
/// Servers dispatch feature methods; clients dispatch server-initiated
/// sampling/elicitation/roots requests. Extension methods hang off the same
/// hook. Errors returned here are mapped to wire errors at the boundary;
/// implementations never build responses themselves.
#[async_trait]
pub trait RequestDispatcher: Send + Sync + 'static {
    async fn dispatch(
        &self,
        method: String,
        params: Option<Value>,
        session: Arc<Session>,
    ) -> McpResult<Value>;

    /// Hook for extension notifications; unhandled ones are ignored.
    async fn dispatch_notification(
        &self,
        method: String,
        params: Option<Value>,
        session: Arc<Session>,
    ) {
        let _ = (method, params, session);
    }
}

/// Negotiated lifecycle state, filled in by the initialize handshake
#[derive(Debug, Clone, Default)]
pub struct NegotiatedState {
    /// The handshake completed on this side
    pub initialized: bool,
    /// `notifications/initialized` observed from the peer
    pub peer_ready: bool,
    /// Version both sides agreed on
    pub protocol_version: Option<String>,
    /// Peer's identity
    pub peer_info: Option<Implementation>,
    /// Capabilities a client peer advertised (server side)
    pub client_capabilities: Option<ClientCapabilities>,
    /// Capabilities a server peer advertised (client side)
    pub server_capabilities: Option<ServerCapabilities>,
    /// Server instructions surfaced during initialization (client side)
    pub instructions: Option<String>,
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound request deadline before a cancellation is issued
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: defaults::REQUEST_TIMEOUT,
        }
    }
}

/// One connected peer pair's session state and machinery
///
/// Symmetric: servers and clients embed the same type and differ only in the
/// [`RequestDispatcher`] they plug in.
pub struct Session {
    transport: Arc<dyn Transport>,
    pending: CorrelationManager,
    in_flight: DashMap<RequestId, Arc<AtomicBool>>,
    state: RwLock<NegotiatedState>,
    log_threshold: RwLock<LogLevel>,
    notifications_tx: broadcast::Sender<JsonRpcNotification>,
    config: SessionConfig,
}

impl Session {
    /// Create a session over the given transport
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Arc<Self> {
        let (notifications_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            pending: CorrelationManager::new(CorrelationConfig::default()),
            in_flight: DashMap::new(),
            state: RwLock::new(NegotiatedState::default()),
            log_threshold: RwLock::new(LogLevel::Debug),
            notifications_tx,
            config,
        })
    }

    /// Spawn the inbound dispatch loop.
    ///
    /// The loop runs until the transport's inbound channel closes. Handler
    /// invocations are spawned per request, so responses may leave out of
    /// arrival order while dispatch itself stays ordered.
    pub fn run(
        self: Arc<Self>,
        mut inbound: MessageReceiver,
        dispatcher: Arc<dyn RequestDispatcher>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                match message {
                    JsonRpcMessage::Request(request) => {
                        Arc::clone(&self).spawn_request(Arc::clone(&dispatcher), request);
                    }
                    JsonRpcMessage::Notification(notification) => {
                        Arc::clone(&self)
                            .handle_notification(Arc::clone(&dispatcher), notification)
                            .await;
                    }
                    JsonRpcMessage::Response(response) => {
                        self.handle_response(response);
                    }
                }
            }
            debug!("session inbound stream ended");
            self.pending.drain();
        })
    }

    fn spawn_request(self: Arc<Self>, dispatcher: Arc<dyn RequestDispatcher>, request: JsonRpcRequest) {
        let id = request.id.clone();

        // A request id may not repeat while its predecessor is in flight.
        if self.in_flight.contains_key(&id) {
            let session = self;
            tokio::spawn(async move {
                let error = McpError::invalid_request("duplicate request id").to_json_rpc_error();
                let response = JsonRpcResponse::error(error, Some(id));
                if let Err(e) = session.transport.send(JsonRpcMessage::Response(response)).await {
                    warn!("failed to send duplicate-id response: {e}");
                }
            });
            return;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        self.in_flight.insert(id.clone(), Arc::clone(&cancelled));

        let session = self;
        tokio::spawn(async move {
            let scope = RequestScope {
                cancelled,
                progress_token: progress_token_of(request.params.as_ref()),
                session: Arc::clone(&session),
            };
            trace!(id = %id, method = %request.method, "dispatching request");

            // The handler runs in its own task so a panic is contained and
            // surfaces as a join error instead of tearing the session down.
            let handler_session = Arc::clone(&session);
            let method = request.method;
            let params = request.params;
            let handler = tokio::spawn(REQUEST_SCOPE.scope(scope, async move {
                dispatcher.dispatch(method, params, handler_session).await
            }));

            let outcome: McpResult<Value> = match handler.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    warn!(id = %id, "handler task failed: {join_error}");
                    Err(McpError::internal("handler task failed"))
                }
            };

            // Atomic read-and-remove: if the peer cancelled this request at
            // any point before now, the response is suppressed entirely.
            let was_cancelled = match session.in_flight.remove(&id) {
                Some((_, flag)) => flag.load(Ordering::Acquire),
                None => false,
            };
            if was_cancelled {
                debug!(id = %id, "suppressing response for cancelled request");
                return;
            }

            let response = match outcome {
                Ok(value) => JsonRpcResponse::success(value, id),
                Err(error) => JsonRpcResponse::error(error.to_json_rpc_error(), Some(id)),
            };
            if let Err(e) = session.transport.send(JsonRpcMessage::Response(response)).await {
                warn!("failed to send response: {e}");
            }
        });
    }

    async fn handle_notification(
        self: Arc<Self>,
        dispatcher: Arc<dyn RequestDispatcher>,
        notification: JsonRpcNotification,
    ) {
        match notification.method.as_str() {
            notifications::INITIALIZED => {
                self.state.write().await.peer_ready = true;
                debug!("peer reported ready");
            }
            notifications::CANCELLED | notifications::CANCELLED_LEGACY => {
                let params = notification
                    .params
                    .clone()
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                match params {
                    Some(params) => {
                        // Unknown or already-completed ids are ignored.
                        if let Some(flag) = self.in_flight.get(&params.request_id) {
                            debug!(id = %params.request_id, reason = ?params.reason, "request cancelled by peer");
                            flag.store(true, Ordering::Release);
                        }
                    }
                    None => trace!("ignoring malformed cancellation"),
                }
            }
            other => {
                dispatcher
                    .dispatch_notification(
                        other.to_string(),
                        notification.params.clone(),
                        Arc::clone(&self),
                    )
                    .await;
            }
        }

        // Every inbound notification also feeds the reactive stream.
        let _ = self.notifications_tx.send(notification);
    }

    fn handle_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id else {
            trace!("dropping response without id");
            return;
        };
        let settled = match response.error {
            Some(error) => self.pending.settle(&id, Err(error)),
            None => self
                .pending
                .settle(&id, Ok(response.result.unwrap_or(Value::Null))),
        };
        if !settled {
            trace!(%id, "response had no pending waiter");
        }
    }

    /// Issue an outbound request and await its response.
    ///
    /// # Errors
    ///
    /// [`McpError::Timeout`] after the configured deadline (a cancellation
    /// notification is sent for the abandoned id), [`McpError::Peer`] for an
    /// error response, or the underlying transport failure.
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        self.request_with_timeout(method, params, self.config.request_timeout)
            .await
    }

    /// Issue an outbound request with an explicit deadline
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> McpResult<Value> {
        let (id, receiver) = self.pending.register()?;
        let request = JsonRpcRequest::new(method, params, id.clone());

        if let Err(e) = self.transport.send(JsonRpcMessage::Request(request)).await {
            self.pending.forget(&id);
            return Err(e.into());
        }

        let started = Instant::now();
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Ok(settled))) => settled.map_err(McpError::Peer),
            Ok(Ok(Err(correlation_error))) => Err(correlation_error.into()),
            Ok(Err(_)) => Err(McpError::internal("settlement channel dropped")),
            Err(_) => {
                self.pending.forget(&id);
                let params = CancelledParams {
                    request_id: id.clone(),
                    reason: Some("timeout".to_string()),
                };
                if let Err(e) = self
                    .notify(notifications::CANCELLED, Some(serde_json::to_value(params)?))
                    .await
                {
                    debug!("failed to send timeout cancellation: {e}");
                }
                Err(McpError::Timeout {
                    elapsed_ms: started.elapsed().as_millis(),
                })
            }
        }
    }

    /// Send a notification to the peer
    ///
    /// # Errors
    ///
    /// Returns the transport failure, reported to the caller only; the
    /// session's read loop is unaffected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport
            .send(JsonRpcMessage::Notification(notification))
            .await?;
        Ok(())
    }

    /// Whether the given in-flight inbound request has been cancelled
    pub fn request_cancelled(&self, id: &RequestId) -> bool {
        self.in_flight
            .get(id)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Emit a log notification, honoring the session threshold.
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the notification cannot be sent.
    pub async fn log(&self, level: LogLevel, logger: Option<String>, data: Value) -> McpResult<()> {
        if level < *self.log_threshold.read().await {
            return Ok(());
        }
        let params = LoggingMessageParams {
            level,
            logger,
            data,
        };
        self.notify(notifications::MESSAGE, Some(serde_json::to_value(params)?))
            .await
    }

    /// Update the minimum level at which log notifications are emitted
    pub async fn set_log_threshold(&self, level: LogLevel) {
        *self.log_threshold.write().await = level;
    }

    /// Current logging threshold
    pub async fn log_threshold(&self) -> LogLevel {
        *self.log_threshold.read().await
    }

    /// Snapshot of the negotiated lifecycle state
    pub async fn state(&self) -> NegotiatedState {
        self.state.read().await.clone()
    }

    /// Mutate the negotiated lifecycle state (initialize handshake)
    pub async fn update_state<F: FnOnce(&mut NegotiatedState)>(&self, update: F) {
        update(&mut *self.state.write().await);
    }

    /// Subscribe to the broadcast stream of inbound notifications
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.notifications_tx.subscribe()
    }

    /// The transport this session writes to
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Requests currently awaiting a peer response
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Close the transport and break every outstanding waiter
    ///
    /// # Errors
    ///
    /// Returns the transport's close failure; waiters are drained regardless.
    pub async fn close(&self) -> McpResult<()> {
        let result = self.transport.close().await;
        self.pending.drain();
        result.map_err(Into::into)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending.pending_count())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

/// Extract `_meta.progressToken` from request params.
fn progress_token_of(params: Option<&Value>) -> Option<Value> {
    params?.get("_meta")?.get("progressToken").cloned()
}
