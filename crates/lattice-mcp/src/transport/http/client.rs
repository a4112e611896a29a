//! Streamable HTTP Client Transport
//!
//! Mirrors the server surface: messages go out as POSTs against the single
//! endpoint (carrying the cached `MCP-Session-Id`), inline
//! `text/event-stream` response bodies are parsed until the matching
//! response arrives, and a background GET loop carries server-initiated
//! traffic, reconnecting with `Last-Event-ID` after drops. A 404 discards
//! the cached session id so the host can reinitialize.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::config::HttpClientConfig;
use crate::protocol::constants::{headers as mcp_headers, methods};
use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait, RequestId};
use crate::transport::sse::SseParser;
use crate::transport::{MessageReceiver, Transport, TransportError, INBOUND_CHANNEL_CAPACITY};

struct ClientInner {
    http: reqwest::Client,
    config: HttpClientConfig,
    session_id: RwLock<Option<String>>,
    last_event_id: Mutex<Option<String>>,
    inbound_tx: mpsc::Sender<JsonRpcMessage>,
    closed: AtomicBool,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    bearer: Option<String>,
}

/// Client-side Streamable HTTP transport
pub struct StreamableHttpClient {
    inner: Arc<ClientInner>,
}

impl StreamableHttpClient {
    /// Create the transport and its inbound message stream
    pub fn new(config: HttpClientConfig) -> (Self, MessageReceiver) {
        Self::with_bearer(config, None)
    }

    /// Create the transport with a bearer credential attached to every
    /// request
    pub fn with_bearer(
        config: HttpClientConfig,
        bearer: Option<String>,
    ) -> (Self, MessageReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let inner = Arc::new(ClientInner {
            http: reqwest::Client::new(),
            config,
            session_id: RwLock::new(None),
            last_event_id: Mutex::new(None),
            inbound_tx,
            closed: AtomicBool::new(false),
            stream_task: Mutex::new(None),
            bearer,
        });
        (Self { inner }, inbound_rx)
    }

    /// Session id cached from the initialize response
    pub async fn session_id(&self) -> Option<String> {
        self.inner.session_id.read().await.clone()
    }
}

#[async_trait]
impl Transport for StreamableHttpClient {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let request_id = match &message {
            JsonRpcMessage::Request(r) => Some(r.id.clone()),
            _ => None,
        };
        let is_initialize = matches!(
            &message,
            JsonRpcMessage::Request(r) if r.method == methods::INITIALIZE
        );

        let mut builder = self
            .inner
            .http
            .post(&self.inner.config.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .header(
                mcp_headers::MCP_PROTOCOL_VERSION,
                &self.inner.config.protocol_version,
            )
            .body(message.to_json()?);
        if let Some(session_id) = &*self.inner.session_id.read().await {
            builder = builder.header(mcp_headers::MCP_SESSION_ID, session_id);
        }
        if let Some(bearer) = &self.inner.bearer {
            builder = builder.header(AUTHORIZATION, bearer);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(()),
            StatusCode::OK => {
                if is_initialize {
                    if let Some(session_id) = response
                        .headers()
                        .get(mcp_headers::MCP_SESSION_ID)
                        .and_then(|v| v.to_str().ok())
                    {
                        debug!(session = %session_id, "http session established");
                        *self.inner.session_id.write().await = Some(session_id.to_string());
                    }
                    if self.inner.config.open_stream {
                        self.ensure_stream_task().await;
                    }
                }

                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                if content_type.starts_with("text/event-stream") {
                    consume_inline_stream(&self.inner, response, request_id).await
                } else {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| TransportError::connection(e.to_string()))?;
                    let parsed = JsonRpcMessage::parse(&body)
                        .map_err(|e| TransportError::format(e.to_string()))?;
                    self.inner
                        .inbound_tx
                        .send(parsed)
                        .await
                        .map_err(|_| TransportError::Closed)
                }
            }
            StatusCode::NOT_FOUND => {
                // Session expired server-side: drop the id and make the host
                // reinitialize.
                *self.inner.session_id.write().await = None;
                *self.inner.last_event_id.lock().await = None;
                Err(TransportError::SessionExpired)
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(TransportError::Http {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(task) = self.inner.stream_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }
}

impl StreamableHttpClient {
    async fn ensure_stream_task(&self) {
        let mut slot = self.inner.stream_task.lock().await;
        if slot.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(get_stream_loop(inner)));
    }
}

impl std::fmt::Debug for StreamableHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpClient")
            .field("endpoint", &self.inner.config.endpoint)
            .finish_non_exhaustive()
    }
}

/// Parse an inline SSE response body until the response matching
/// `request_id` arrives (or the stream ends).
async fn consume_inline_stream(
    inner: &Arc<ClientInner>,
    response: reqwest::Response,
    request_id: Option<RequestId>,
) -> Result<(), TransportError> {
    let mut parser = SseParser::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::connection(e.to_string()))?;
        for event in parser.feed(&chunk) {
            if !event.is_message() {
                continue;
            }
            let message = match JsonRpcMessage::parse(event.data.as_bytes()) {
                Ok(message) => message,
                Err(e) => {
                    warn!("discarding malformed inline sse message: {e}");
                    continue;
                }
            };

            let is_answer = matches!(
                (&message, &request_id),
                (JsonRpcMessage::Response(r), Some(id)) if r.id.as_ref() == Some(id)
            );
            inner
                .inbound_tx
                .send(message)
                .await
                .map_err(|_| TransportError::Closed)?;
            if is_answer {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Background GET loop: one long-lived SSE connection for server-initiated
/// traffic, reconnecting with the last seen event id.
async fn get_stream_loop(inner: Arc<ClientInner>) {
    let mut retry_delay = inner.config.retry_delay;

    while !inner.closed.load(Ordering::Acquire) {
        let mut builder = inner
            .http
            .get(&inner.config.endpoint)
            .header(ACCEPT, "text/event-stream")
            .header(
                mcp_headers::MCP_PROTOCOL_VERSION,
                &inner.config.protocol_version,
            );
        if let Some(session_id) = &*inner.session_id.read().await {
            builder = builder.header(mcp_headers::MCP_SESSION_ID, session_id);
        }
        if let Some(last_event_id) = &*inner.last_event_id.lock().await {
            builder = builder.header(mcp_headers::LAST_EVENT_ID, last_event_id);
        }
        if let Some(bearer) = &inner.bearer {
            builder = builder.header(AUTHORIZATION, bearer);
        }

        match builder.send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                trace!("sse stream connected");
                let mut parser = SseParser::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let Ok(chunk) = chunk else { break };
                    for event in parser.feed(&chunk) {
                        if let Some(retry) = event.retry {
                            retry_delay = retry;
                        }
                        if let Some(id) = &event.id {
                            *inner.last_event_id.lock().await = Some(id.clone());
                        }
                        if !event.is_message() {
                            continue;
                        }
                        match JsonRpcMessage::parse(event.data.as_bytes()) {
                            Ok(message) => {
                                if inner.inbound_tx.send(message).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("discarding malformed sse message: {e}"),
                        }
                    }
                }
                debug!("sse stream disconnected");
            }
            Ok(response) if response.status() == StatusCode::NO_CONTENT => {
                // Replay window gone; reconnect without Last-Event-ID.
                debug!("sse replay irrecoverable, restarting stream");
                *inner.last_event_id.lock().await = None;
            }
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                debug!("session gone, awaiting reinitialization");
                *inner.session_id.write().await = None;
                *inner.last_event_id.lock().await = None;
            }
            Ok(response) => {
                debug!(status = %response.status(), "sse connect rejected");
            }
            Err(e) => {
                debug!("sse connect failed: {e}");
            }
        }

        tokio::time::sleep(retry_delay).await;
    }
}
