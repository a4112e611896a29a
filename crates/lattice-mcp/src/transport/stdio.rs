//! STDIO Transport
//!
//! Content-Length framed JSON-RPC over a byte pair. The default constructor
//! binds stdin/stdout, which is how MCP servers talk to host applications;
//! [`StdioTransport::from_io`] accepts any `AsyncRead`/`AsyncWrite` pair, so
//! the same code path drives child processes and the in-memory duplex
//! streams the tests use.
//!
//! # Design Characteristics
//!
//! - A dedicated reader task feeds the [`FrameCodec`](super::FrameCodec) and
//!   pushes parsed messages into the inbound channel in arrival order
//! - Sends serialize under a writer mutex so concurrent senders never
//!   interleave framed bytes
//! - A payload that fails JSON-RPC validation produces a single `-32700`
//!   response (echoing the recovered id when possible) and the stream
//!   continues; framing is never desynchronized by one bad message

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::framing::{encode_frame, FrameCodec};
use super::{MessageReceiver, Transport, TransportError, INBOUND_CHANNEL_CAPACITY};
use crate::protocol::constants::defaults;
use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait, JsonRpcResponse};

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Framed stdio transport
///
/// # Examples
///
/// ```rust,no_run
/// use lattice_mcp::transport::StdioTransport;
///
/// # async fn example() {
/// let (transport, inbound) = StdioTransport::new();
/// // Hand `transport` and `inbound` to a session.
/// # let _ = (transport, inbound);
/// # }
/// ```
pub struct StdioTransport {
    writer: SharedWriter,
    closed: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    max_message_size: usize,
}

impl StdioTransport {
    /// Transport over this process's stdin/stdout with default limits
    pub fn new() -> (Self, MessageReceiver) {
        Self::from_io(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Transport over an arbitrary byte pair with default limits
    pub fn from_io<R, W>(reader: R, writer: W) -> (Self, MessageReceiver)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_io_with_limit(reader, writer, defaults::MAX_MESSAGE_SIZE)
    }

    /// Transport over an arbitrary byte pair with a custom message size limit
    pub fn from_io_with_limit<R, W>(
        reader: R,
        writer: W,
        max_message_size: usize,
    ) -> (Self, MessageReceiver)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(read_loop(
            Box::new(reader),
            Arc::clone(&writer),
            Arc::clone(&closed),
            inbound_tx,
            max_message_size,
        ));

        let transport = Self {
            writer,
            closed,
            reader_task: Mutex::new(Some(reader_task)),
            max_message_size,
        };
        (transport, inbound_rx)
    }

    /// Maximum framed payload this transport accepts, in bytes
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let payload = message.to_bytes()?;
        if payload.len() > self.max_message_size {
            return Err(TransportError::buffer_overflow(format!(
                "message size {} exceeds limit {}",
                payload.len(),
                self.max_message_size
            )));
        }

        let frame = encode_frame(&payload);
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }

        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

/// Reader task: frame, validate, and forward inbound messages.
///
/// Runs until EOF, a fatal framing error, the inbound channel closing, or an
/// abort from `close()`. Malformed payloads are answered with `-32700` and
/// skipped; the declared byte count has already been consumed, so the next
/// frame parses cleanly.
async fn read_loop(
    mut reader: Box<dyn AsyncRead + Send + Unpin>,
    writer: SharedWriter,
    closed: Arc<AtomicBool>,
    inbound_tx: mpsc::Sender<JsonRpcMessage>,
    max_message_size: usize,
) {
    let mut codec = FrameCodec::with_max_frame_size(max_message_size);
    let mut chunk = [0u8; 8192];

    'outer: loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("stdio transport reached EOF");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("stdio read failed: {e}");
                break;
            }
        };

        if let Err(e) = codec.extend(&chunk[..read]) {
            warn!("stdio framing buffer overflow: {e}");
            break;
        }

        loop {
            match codec.next_frame() {
                Ok(Some(frame)) => {
                    trace!(bytes = frame.len(), "stdio frame received");
                    match JsonRpcMessage::parse(&frame) {
                        Ok(message) => {
                            if inbound_tx.send(message).await.is_err() {
                                break 'outer;
                            }
                        }
                        Err(e) => {
                            debug!("discarding malformed message: {e}");
                            let response =
                                JsonRpcResponse::parse_error(e.recovered_id().cloned());
                            send_raw(&writer, &JsonRpcMessage::Response(response)).await;
                        }
                    }
                }
                Ok(None) => break,
                Err(TransportError::Format { message }) => {
                    // Malformed header block was consumed; keep draining.
                    debug!("discarding malformed header block: {message}");
                    let response = JsonRpcResponse::parse_error(None);
                    send_raw(&writer, &JsonRpcMessage::Response(response)).await;
                }
                Err(e) => {
                    warn!("fatal framing error: {e}");
                    break 'outer;
                }
            }
        }
    }

    closed.store(true, Ordering::Release);
}

/// Best-effort framed write used by the read loop for parse-error responses.
async fn send_raw(writer: &SharedWriter, message: &JsonRpcMessage) {
    let payload = match message.to_bytes() {
        Ok(payload) => payload,
        Err(_) => return,
    };
    let frame = encode_frame(&payload);
    let mut writer = writer.lock().await;
    let _ = writer.write_all(&frame).await;
    let _ = writer.flush().await;
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcNotification, JsonRpcRequest, RequestId};
    use serde_json::json;

    /// Byte pair wired back to an in-process test harness.
    fn duplex_pair() -> (
        StdioTransport,
        MessageReceiver,
        tokio::io::DuplexStream,
        tokio::io::DuplexStream,
    ) {
        let (peer_writes, our_reads) = tokio::io::duplex(64 * 1024);
        let (our_writes, peer_reads) = tokio::io::duplex(64 * 1024);
        let (transport, inbound) = StdioTransport::from_io(our_reads, our_writes);
        (transport, inbound, peer_writes, peer_reads)
    }

    async fn read_one_frame(reader: &mut tokio::io::DuplexStream) -> JsonRpcMessage {
        let mut codec = FrameCodec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = codec.next_frame().unwrap() {
                return JsonRpcMessage::parse(&frame).unwrap();
            }
            let n = reader.read(&mut chunk).await.unwrap();
            assert!(n > 0, "peer stream ended before a full frame arrived");
            codec.extend(&chunk[..n]).unwrap();
        }
    }

    #[tokio::test]
    async fn test_inbound_messages_arrive_in_order() {
        let (_transport, mut inbound, mut peer_writes, _peer_reads) = duplex_pair();

        for i in 0..3 {
            let request = JsonRpcRequest::new("ping", None, RequestId::new_number(i));
            let payload = request.to_bytes().unwrap();
            peer_writes.write_all(&encode_frame(&payload)).await.unwrap();
        }

        for i in 0..3 {
            let message = inbound.recv().await.unwrap();
            assert_eq!(message.request_id(), Some(&RequestId::new_number(i)));
        }
    }

    #[tokio::test]
    async fn test_send_produces_framed_output() {
        let (transport, _inbound, _peer_writes, mut peer_reads) = duplex_pair();

        let notification =
            JsonRpcNotification::new("notifications/initialized", Some(json!({})));
        transport
            .send(JsonRpcMessage::Notification(notification.clone()))
            .await
            .unwrap();

        let received = read_one_frame(&mut peer_reads).await;
        assert_eq!(received, JsonRpcMessage::Notification(notification));
    }

    #[tokio::test]
    async fn test_malformed_payload_yields_parse_error_and_stream_recovers() {
        let (_transport, mut inbound, mut peer_writes, mut peer_reads) = duplex_pair();

        // Valid frame, invalid JSON-RPC: missing jsonrpc marker, with an id
        // the framer can recover.
        peer_writes
            .write_all(&encode_frame(br#"{"method":"x","id":42}"#))
            .await
            .unwrap();

        let response = read_one_frame(&mut peer_reads).await;
        match response {
            JsonRpcMessage::Response(r) => {
                assert_eq!(r.error.unwrap().code, -32700);
                assert_eq!(r.id, Some(RequestId::new_number(42)));
            }
            other => panic!("expected parse-error response, got {other:?}"),
        }

        // The stream resynchronized: the next valid frame is delivered.
        let request = JsonRpcRequest::new("ping", None, RequestId::new_number(1));
        peer_writes
            .write_all(&encode_frame(&request.to_bytes().unwrap()))
            .await
            .unwrap();
        assert_eq!(
            inbound.recv().await.unwrap(),
            JsonRpcMessage::Request(request)
        );
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, _inbound, _peer_writes, _peer_reads) = duplex_pair();
        transport.close().await.unwrap();

        let result = transport
            .send(JsonRpcMessage::from_notification("ping", None))
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _inbound, _peer_writes, _peer_reads) = duplex_pair();
        assert!(transport.is_connected());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_inbound_channel_closes_on_eof() {
        let (_transport, mut inbound, peer_writes, _peer_reads) = duplex_pair();
        drop(peer_writes);
        assert!(inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_send_rejected() {
        let (peer_writes, our_reads) = tokio::io::duplex(1024);
        let (our_writes, _peer_reads) = tokio::io::duplex(1024);
        let (transport, _inbound) =
            StdioTransport::from_io_with_limit(our_reads, our_writes, 16);
        drop(peer_writes);

        let request = JsonRpcRequest::new(
            "method-name-well-over-the-limit",
            None,
            RequestId::new_number(1),
        );
        let result = transport.send(JsonRpcMessage::Request(request)).await;
        assert!(matches!(result, Err(TransportError::BufferOverflow { .. })));
    }
}
