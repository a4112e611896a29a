//! Protocol Error Types and JSON-RPC Error Codes
//!
//! This module defines the JSON-RPC 2.0 error codes used on the wire plus the
//! crate-internal `ProtocolError` for decode and validation failures. Wire
//! errors travel as [`JsonRpcError`](crate::protocol::JsonRpcError) objects;
//! `ProtocolError` never leaves the process.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes plus the MCP-specific additions.
pub mod error_codes {
    /// Invalid JSON was received by the peer.
    pub const PARSE_ERROR: i64 = -32700;

    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;

    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;

    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// MCP-specific: the operation requires the client to visit a URL first.
    pub const URL_ELICITATION_REQUIRED: i64 = -32042;
}

/// Result type for protocol-level operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors arising while decoding or validating wire messages
///
/// These are local failures: the transport read loop converts them into a
/// `-32700` response (echoing the request id when it could be recovered) and
/// keeps running.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload was not valid JSON
    #[error("invalid JSON payload: {source}")]
    InvalidJson {
        #[from]
        source: serde_json::Error,
    },

    /// Payload parsed but is not a valid JSON-RPC 2.0 message
    #[error("invalid JSON-RPC message: {message}")]
    InvalidMessage {
        /// Description of the violated constraint
        message: String,
        /// Request id recovered from the malformed payload, if any
        id: Option<crate::protocol::RequestId>,
    },

    /// Protocol version offered by the peer is not supported
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion { version: String },
}

impl ProtocolError {
    /// Construct an `InvalidMessage` error without a recovered id.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        ProtocolError::InvalidMessage {
            message: message.into(),
            id: None,
        }
    }

    /// Construct an `InvalidMessage` error carrying the recovered request id.
    pub fn invalid_message_with_id(
        message: impl Into<String>,
        id: crate::protocol::RequestId,
    ) -> Self {
        ProtocolError::InvalidMessage {
            message: message.into(),
            id: Some(id),
        }
    }

    /// Request id recovered from the offending payload, if the framing level
    /// could extract one.
    pub fn recovered_id(&self) -> Option<&crate::protocol::RequestId> {
        match self {
            ProtocolError::InvalidMessage { id, .. } => id.as_ref(),
            _ => None,
        }
    }
}
