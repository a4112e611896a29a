//! Transport Layer
//!
//! Byte-stream carriers for JSON-RPC messages. Every transport satisfies the
//! same first-class [`Transport`] interface: an async `send`, an explicit
//! `close`, a connectivity probe, and an inbound [`mpsc`] channel handed out
//! at construction time. The session core owns the receiving end and runs the
//! dispatch loop; transports never interpret MCP semantics beyond what their
//! wire format requires (the Streamable HTTP transport watches `initialize`
//! responses to mint session ids).
//!
//! Implementations:
//! - [`stdio`]: LSP-style `Content-Length` framing over any byte pair
//!   (stdin/stdout by default)
//! - [`http`]: Streamable HTTP (single endpoint, SSE replay, session ids)
//! - [`sse_legacy`]: two-endpoint HTTP+SSE variant retained for compatibility

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use crate::protocol::JsonRpcMessage;

pub mod framing;
pub mod http;
pub mod sse;
pub mod sse_legacy;
pub mod stdio;

pub use framing::{encode_frame, FrameCodec};
pub use stdio::StdioTransport;

/// Receiving end of a transport's inbound message stream
pub type MessageReceiver = mpsc::Receiver<JsonRpcMessage>;

/// Capacity of the inbound channel between a transport's reader task and the
/// session dispatch loop.
pub(crate) const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Transport error types for comprehensive error handling
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-related errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Message serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Framing violations (bad headers, embedded garbage)
    #[error("Framing error: {message}")]
    Format { message: String },

    /// Message exceeds the configured size limit
    #[error("Buffer overflow: {details}")]
    BufferOverflow { details: String },

    /// Transport has been closed
    #[error("Transport closed")]
    Closed,

    /// Request timed out at the transport level
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Authentication/authorization failures surfaced by the HTTP layer
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Peer rejected the request at the HTTP level
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The HTTP session is gone; the caller should reinitialize
    #[error("Session expired")]
    SessionExpired,
}

impl TransportError {
    /// Construct a framing error
    pub fn format(message: impl Into<String>) -> Self {
        TransportError::Format {
            message: message.into(),
        }
    }

    /// Construct a buffer-overflow error
    pub fn buffer_overflow(details: impl Into<String>) -> Self {
        TransportError::BufferOverflow {
            details: details.into(),
        }
    }

    /// Construct a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        TransportError::Connection {
            message: message.into(),
        }
    }
}

/// First-class transport interface
///
/// Sends are callable from any task: implementations serialize concurrent
/// writers internally so framed messages never interleave. Inbound messages
/// arrive on the [`MessageReceiver`] returned by the transport constructor,
/// which closes when the transport does.
///
/// Tests implement this trait directly with in-memory loopback and recording
/// transports; nothing in the session core assumes a real byte stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a JSON-RPC message to the peer
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after `close`, or the underlying
    /// I/O/serialization failure. Send failures are reported to the caller
    /// and never tear down the read loop by themselves.
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError>;

    /// Close the transport and release resources (idempotent)
    ///
    /// # Errors
    ///
    /// Returns an error when final flushing fails; the transport is
    /// considered closed regardless.
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether the transport is currently able to carry messages
    fn is_connected(&self) -> bool;
}
