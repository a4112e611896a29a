//! Streamable HTTP Server Transport
//!
//! One endpoint, three methods:
//!
//! - **POST** carries a JSON-RPC message. Requests open a completion handle
//!   keyed by their id and answer with the matching response as
//!   `application/json`; notifications and responses return 202.
//! - **GET** opens a server-to-client SSE stream, resuming with replay when
//!   the request carries `Last-Event-ID`.
//! - **DELETE** terminates the session (when enabled).
//!
//! Every request passes the same validation chain, in order, short-circuiting
//! on the first failure: endpoint path (the router's 404), Origin,
//! `MCP-Protocol-Version`, session id, Accept/Content-Type gates, and the
//! optional bearer validator.
//!
//! Session ids are minted here, on a successful `initialize` response; the
//! session core never learns about HTTP sessions.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::config::HttpServerConfig;
use super::streams::StreamRegistry;
use crate::protocol::constants::{headers as mcp_headers, methods, versions};
use crate::protocol::{
    JsonRpcMessage, JsonRpcMessageTrait, JsonRpcResponse, RequestId,
};
use crate::transport::sse::parse_event_id;
use crate::transport::{MessageReceiver, Transport, TransportError, INBOUND_CHANNEL_CAPACITY};

/// HTTP session lifecycle on this transport
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionSlot {
    /// No session established yet
    Unassigned,
    /// Session established with this id
    Active(String),
    /// Session explicitly terminated; old ids answer 404
    Terminated,
}

/// Shared state behind the axum handlers
pub struct HttpServerState {
    config: HttpServerConfig,
    inbound_tx: mpsc::Sender<JsonRpcMessage>,
    session: RwLock<SessionSlot>,
    pending_posts: DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>,
    streams: StreamRegistry,
    closed: AtomicBool,
}

/// Server-side Streamable HTTP transport
///
/// Construct with [`HttpServerTransport::new`], hand the returned inbound
/// receiver to a session, mount [`HttpServerTransport::router`] into the
/// host's axum app, and serve it however the host serves HTTP.
#[derive(Clone)]
pub struct HttpServerTransport {
    state: Arc<HttpServerState>,
}

impl HttpServerTransport {
    /// Create the transport and its inbound message stream
    pub fn new(config: HttpServerConfig) -> (Self, MessageReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let state = Arc::new(HttpServerState {
            streams: StreamRegistry::new(config.replay_buffer),
            config,
            inbound_tx,
            session: RwLock::new(SessionSlot::Unassigned),
            pending_posts: DashMap::new(),
            closed: AtomicBool::new(false),
        });
        (Self { state }, inbound_rx)
    }

    /// Router serving the configured endpoint
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                &self.state.config.endpoint,
                post(handle_post).get(handle_get).delete(handle_delete),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Currently established session id, if any
    pub async fn session_id(&self) -> Option<String> {
        match &*self.state.session.read().await {
            SessionSlot::Active(id) => Some(id.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl Transport for HttpServerTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        // A response to an ongoing POST exchange completes that exchange.
        if let JsonRpcMessage::Response(response) = &message {
            if let Some(id) = &response.id {
                if let Some((_, sender)) = self.state.pending_posts.remove(id) {
                    let _ = sender.send(response.clone());
                    return Ok(());
                }
            }
        }

        // Everything else steers round-robin onto an open SSE stream; with
        // no stream open the message is dropped (the peer is not listening).
        let payload = message.to_json()?;
        if !self.state.streams.steer(&payload).await {
            debug!("dropping outbound message: no open sse stream");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.closed.store(true, Ordering::Release);
        self.state.streams.clear().await;
        self.state.pending_posts.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.state.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for HttpServerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerTransport")
            .field("endpoint", &self.state.config.endpoint)
            .finish_non_exhaustive()
    }
}

/// Which Accept/Content-Type gates apply
#[derive(Clone, Copy, PartialEq)]
enum MethodKind {
    Post,
    Get,
    Delete,
}

/// Validation chain steps 2-6 (the router already matched the path).
async fn validate(
    state: &HttpServerState,
    headers: &HeaderMap,
    kind: MethodKind,
) -> Result<(), Response> {
    // 2. Origin allow-list (anti-DNS-rebinding: empty list rejects any
    //    Origin header).
    if let Some(origin) = header_str(headers, header::ORIGIN.as_str()) {
        if !state.config.allowed_origins.iter().any(|o| o == origin) {
            return Err(plain(StatusCode::FORBIDDEN, "origin not allowed"));
        }
    }

    // 3. Protocol version, with the default fallback when absent.
    let version = header_str(headers, mcp_headers::MCP_PROTOCOL_VERSION)
        .unwrap_or(versions::DEFAULT);
    if !state.config.protocol_versions.iter().any(|v| v == version) {
        return Err(plain(StatusCode::BAD_REQUEST, "unsupported protocol version"));
    }

    // 4. Session check.
    if state.config.require_session {
        let slot = state.session.read().await.clone();
        let presented = header_str(headers, mcp_headers::MCP_SESSION_ID)
            .filter(|s| !s.is_empty());
        match (&slot, presented) {
            (SessionSlot::Active(_), None) => {
                return Err(plain(StatusCode::BAD_REQUEST, "missing session id"));
            }
            (SessionSlot::Active(current), Some(id)) if id != current.as_str() => {
                return Err(plain(StatusCode::NOT_FOUND, "unknown session id"));
            }
            (SessionSlot::Terminated, Some(_)) => {
                return Err(plain(StatusCode::NOT_FOUND, "session terminated"));
            }
            _ => {}
        }
    }

    // 5. Accept / Content-Type gates.
    let accept = header_str(headers, header::ACCEPT.as_str()).unwrap_or("");
    let accepts = |mime: &str| accept.contains(mime) || accept.contains("*/*");
    match kind {
        MethodKind::Post => {
            if !(accepts("application/json") && accepts("text/event-stream")) {
                return Err(plain(
                    StatusCode::NOT_ACCEPTABLE,
                    "Accept must include application/json and text/event-stream",
                ));
            }
            let content_type = header_str(headers, header::CONTENT_TYPE.as_str())
                .unwrap_or("")
                .split(';')
                .next()
                .unwrap_or("")
                .trim();
            if content_type != "application/json" {
                return Err(plain(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Content-Type must be application/json",
                ));
            }
        }
        MethodKind::Get => {
            if !accepts("text/event-stream") {
                return Err(plain(
                    StatusCode::NOT_ACCEPTABLE,
                    "Accept must include text/event-stream",
                ));
            }
        }
        MethodKind::Delete => {}
    }

    // 6. Bearer validation.
    if let Some(auth) = &state.config.auth {
        let verdict = auth
            .validator
            .validate(header_str(headers, header::AUTHORIZATION.as_str()));
        if !verdict.valid {
            let challenge = auth
                .requirements
                .unauthenticated_challenge(verdict.message.as_deref());
            return Err((
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, challenge)],
                "unauthorized",
            )
                .into_response());
        }
        if !auth.requirements.scopes_satisfied(&verdict.scopes) {
            let challenge = auth.requirements.insufficient_scope_challenge();
            return Err((
                StatusCode::FORBIDDEN,
                [(header::WWW_AUTHENTICATE, challenge)],
                "insufficient scope",
            )
                .into_response());
        }
    }

    Ok(())
}

async fn handle_post(
    State(state): State<Arc<HttpServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.closed.load(Ordering::Acquire) {
        return plain(StatusCode::SERVICE_UNAVAILABLE, "transport closed");
    }
    if let Err(response) = validate(&state, &headers, MethodKind::Post).await {
        return response;
    }

    let message = match JsonRpcMessage::parse(&body) {
        Ok(message) => message,
        Err(e) => {
            let response = JsonRpcResponse::parse_error(e.recovered_id().cloned());
            return json_response(StatusCode::BAD_REQUEST, &response, None);
        }
    };

    match message {
        JsonRpcMessage::Request(request) => {
            let id = request.id.clone();
            let is_initialize = request.method == methods::INITIALIZE;

            let (sender, receiver) = oneshot::channel();
            state.pending_posts.insert(id.clone(), sender);

            if state
                .inbound_tx
                .send(JsonRpcMessage::Request(request))
                .await
                .is_err()
            {
                state.pending_posts.remove(&id);
                return plain(StatusCode::SERVICE_UNAVAILABLE, "session stopped");
            }

            let response = match receiver.await {
                Ok(response) => response,
                // The exchange was torn down (session terminated mid-flight).
                Err(_) => return plain(StatusCode::NOT_FOUND, "session terminated"),
            };

            let session_header = if is_initialize
                && response.error.is_none()
                && state.config.require_session
            {
                let session_id = Uuid::new_v4().simple().to_string();
                *state.session.write().await = SessionSlot::Active(session_id.clone());
                debug!(session = %session_id, "http session established");
                Some(session_id)
            } else {
                None
            };

            json_response(StatusCode::OK, &response, session_header)
        }
        other => {
            // Notifications and responses are accepted without a body.
            if state.inbound_tx.send(other).await.is_err() {
                return plain(StatusCode::SERVICE_UNAVAILABLE, "session stopped");
            }
            StatusCode::ACCEPTED.into_response()
        }
    }
}

async fn handle_get(State(state): State<Arc<HttpServerState>>, headers: HeaderMap) -> Response {
    if state.closed.load(Ordering::Acquire) {
        return plain(StatusCode::SERVICE_UNAVAILABLE, "transport closed");
    }
    if let Err(response) = validate(&state, &headers, MethodKind::Get).await {
        return response;
    }

    let receiver = match header_str(&headers, mcp_headers::LAST_EVENT_ID) {
        Some(last_event_id) => {
            let Some((stream_id, seq)) = parse_event_id(last_event_id) else {
                return plain(StatusCode::BAD_REQUEST, "malformed Last-Event-ID");
            };
            match state.streams.resume(&stream_id, seq).await {
                Some(receiver) => receiver,
                // Replay window gone: the client reinitializes cleanly.
                None => return StatusCode::NO_CONTENT.into_response(),
            }
        }
        None => {
            let (_stream, receiver) = state.streams.open().await;
            receiver
        }
    };

    let stream = UnboundedReceiverStream::new(receiver).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_delete(State(state): State<Arc<HttpServerState>>, headers: HeaderMap) -> Response {
    if state.closed.load(Ordering::Acquire) {
        return plain(StatusCode::SERVICE_UNAVAILABLE, "transport closed");
    }
    if let Err(response) = validate(&state, &headers, MethodKind::Delete).await {
        return response;
    }
    if !state.config.allow_session_delete {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "session delete disabled");
    }

    *state.session.write().await = SessionSlot::Terminated;
    state.streams.clear().await;
    state.pending_posts.clear();
    debug!("http session terminated by client");
    StatusCode::NO_CONTENT.into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn json_response(
    status: StatusCode,
    response: &JsonRpcResponse,
    session_id: Option<String>,
) -> Response {
    let body = match response.to_json() {
        Ok(body) => body,
        Err(e) => {
            warn!("response serialization failed: {e}");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "serialization failure");
        }
    };

    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(session_id) = session_id {
        builder = builder.header(mcp_headers::MCP_SESSION_ID, session_id);
    }
    builder
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
