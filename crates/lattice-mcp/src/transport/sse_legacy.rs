//! Legacy SSE Transport
//!
//! The two-endpoint HTTP+SSE variant retained for compatibility with older
//! peers. GET on the SSE path opens the stream; its first event is
//! `event: endpoint` whose data is the absolute POST URL the client must use
//! for JSON-RPC messages. All server-to-client traffic flows as
//! `event: message` events on the stream.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

// Layer 3: Internal module imports
use super::sse::SseParser;
use super::{MessageReceiver, Transport, TransportError, INBOUND_CHANNEL_CAPACITY};
use crate::protocol::constants::defaults;
use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait};

/// Legacy SSE server settings
#[derive(Debug, Clone)]
pub struct SseServerConfig {
    /// Path serving the SSE stream
    pub sse_path: String,
    /// Path accepting JSON-RPC POSTs
    pub message_path: String,
    /// Absolute base prepended to `message_path` in the endpoint event
    pub base_url: String,
}

impl Default for SseServerConfig {
    fn default() -> Self {
        Self {
            sse_path: "/sse".to_string(),
            message_path: "/messages".to_string(),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

struct SseServerState {
    config: SseServerConfig,
    inbound_tx: mpsc::Sender<JsonRpcMessage>,
    clients: DashMap<String, mpsc::UnboundedSender<Event>>,
    order: Mutex<Vec<String>>,
    rr_index: AtomicUsize,
    closed: AtomicBool,
}

/// Server side of the legacy SSE transport
#[derive(Clone)]
pub struct SseServerTransport {
    state: Arc<SseServerState>,
}

impl SseServerTransport {
    /// Create the transport and its inbound message stream
    pub fn new(config: SseServerConfig) -> (Self, MessageReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let state = Arc::new(SseServerState {
            config,
            inbound_tx,
            clients: DashMap::new(),
            order: Mutex::new(Vec::new()),
            rr_index: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        (Self { state }, inbound_rx)
    }

    /// Router serving both endpoints
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.sse_path, get(handle_sse))
            .route(&self.state.config.message_path, post(handle_message))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }
}

#[async_trait]
impl Transport for SseServerTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let payload = message.to_json()?;
        let event = || Event::default().event("message").data(&payload);

        let order = self.state.order.lock().await.clone();
        if order.is_empty() {
            debug!("dropping outbound message: no sse client connected");
            return Ok(());
        }

        let start = self.state.rr_index.fetch_add(1, Ordering::Relaxed);
        for i in 0..order.len() {
            let id = &order[(start + i) % order.len()];
            if let Some(sender) = self.state.clients.get(id) {
                if sender.send(event()).is_ok() {
                    trace!(client = %id, "sse message emitted");
                    return Ok(());
                }
                drop(sender);
                self.state.clients.remove(id);
            }
        }
        debug!("dropping outbound message: all sse clients gone");
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.closed.store(true, Ordering::Release);
        self.state.clients.clear();
        self.state.order.lock().await.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.state.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SseServerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseServerTransport")
            .field("sse_path", &self.state.config.sse_path)
            .finish_non_exhaustive()
    }
}

async fn handle_sse(State(state): State<Arc<SseServerState>>) -> Response {
    if state.closed.load(Ordering::Acquire) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let client_id = Uuid::new_v4().simple().to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    // The first event teaches the client where to POST.
    let endpoint = format!(
        "{}{}?sessionId={client_id}",
        state.config.base_url, state.config.message_path
    );
    let _ = tx.send(Event::default().event("endpoint").data(endpoint));

    state.clients.insert(client_id.clone(), tx);
    state.order.lock().await.push(client_id.clone());
    debug!(client = %client_id, "legacy sse client connected");

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_message(State(state): State<Arc<SseServerState>>, body: Bytes) -> Response {
    if state.closed.load(Ordering::Acquire) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let message = match JsonRpcMessage::parse(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!("rejecting malformed legacy post: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if state.inbound_tx.send(message).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    StatusCode::ACCEPTED.into_response()
}

/// Legacy SSE client settings
#[derive(Debug, Clone)]
pub struct SseClientConfig {
    /// Absolute URL of the server's SSE endpoint
    pub sse_url: String,
    /// Delay between reconnect attempts
    pub retry_delay: Duration,
}

impl SseClientConfig {
    /// Config for the given SSE URL with the default retry delay
    pub fn new(sse_url: impl Into<String>) -> Self {
        Self {
            sse_url: sse_url.into(),
            retry_delay: defaults::SSE_RETRY_DELAY,
        }
    }
}

struct SseClientInner {
    http: reqwest::Client,
    config: SseClientConfig,
    post_url_tx: watch::Sender<Option<String>>,
    inbound_tx: mpsc::Sender<JsonRpcMessage>,
    closed: AtomicBool,
}

/// Client side of the legacy SSE transport
pub struct SseClientTransport {
    inner: Arc<SseClientInner>,
    post_url_rx: watch::Receiver<Option<String>>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
}

impl SseClientTransport {
    /// Connect: spawns the SSE read loop immediately. Sends block until the
    /// endpoint event has taught us the POST URL.
    pub fn connect(config: SseClientConfig) -> (Self, MessageReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (post_url_tx, post_url_rx) = watch::channel(None);
        let inner = Arc::new(SseClientInner {
            http: reqwest::Client::new(),
            config,
            post_url_tx,
            inbound_tx,
            closed: AtomicBool::new(false),
        });

        let task = tokio::spawn(sse_read_loop(Arc::clone(&inner)));
        let transport = Self {
            inner,
            post_url_rx,
            stream_task: Mutex::new(Some(task)),
        };
        (transport, inbound_rx)
    }

    /// POST URL learned from the endpoint event, if connected
    pub fn post_url(&self) -> Option<String> {
        self.post_url_rx.borrow().clone()
    }
}

#[async_trait]
impl Transport for SseClientTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        // Wait for the endpoint event before the first send.
        let mut post_url_rx = self.post_url_rx.clone();
        let post_url = tokio::time::timeout(
            Duration::from_secs(10),
            post_url_rx.wait_for(|url| url.is_some()),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            message: "endpoint event not received".to_string(),
        })?
        .map_err(|_| TransportError::Closed)?
        .clone();

        // wait_for guarantees Some
        let Some(post_url) = post_url else {
            return Err(TransportError::Closed);
        };

        let response = self
            .inner
            .http
            .post(&post_url)
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_json()?)
            .send()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(task) = self.stream_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SseClientTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseClientTransport")
            .field("sse_url", &self.inner.config.sse_url)
            .finish_non_exhaustive()
    }
}

async fn sse_read_loop(inner: Arc<SseClientInner>) {
    while !inner.closed.load(Ordering::Acquire) {
        let request = inner
            .http
            .get(&inner.config.sse_url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await;

        match request {
            Ok(response) if response.status().is_success() => {
                let mut parser = SseParser::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let Ok(chunk) = chunk else { break };
                    for event in parser.feed(&chunk) {
                        match event.event.as_deref() {
                            Some("endpoint") => {
                                match resolve_endpoint(&inner.config.sse_url, &event.data) {
                                    Ok(url) => {
                                        debug!(%url, "post endpoint learned");
                                        let _ = inner.post_url_tx.send(Some(url));
                                    }
                                    Err(e) => warn!("unresolvable endpoint event: {e}"),
                                }
                            }
                            None | Some("message") if !event.data.is_empty() => {
                                match JsonRpcMessage::parse(event.data.as_bytes()) {
                                    Ok(message) => {
                                        if inner.inbound_tx.send(message).await.is_err() {
                                            return;
                                        }
                                    }
                                    Err(e) => warn!("discarding malformed sse message: {e}"),
                                }
                            }
                            _ => {}
                        }
                    }
                }
                debug!("legacy sse stream disconnected");
            }
            Ok(response) => debug!(status = %response.status(), "sse connect rejected"),
            Err(e) => debug!("sse connect failed: {e}"),
        }

        tokio::time::sleep(inner.config.retry_delay).await;
    }
}

/// Resolve the endpoint event's data (absolute or relative) against the SSE
/// URL.
fn resolve_endpoint(sse_url: &str, endpoint: &str) -> Result<String, String> {
    let base = Url::parse(sse_url).map_err(|e| e.to_string())?;
    let resolved = base.join(endpoint).map_err(|e| e.to_string())?;
    Ok(resolved.to_string())
}
