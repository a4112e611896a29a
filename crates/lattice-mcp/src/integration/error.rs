//! Integration Error Types
//!
//! `McpError` is the single propagation type for MCP-level failures on both
//! peers. Handler failures are caught once, at the dispatcher boundary, and
//! converted to JSON-RPC error objects; [`McpError::to_json_rpc_error`]
//! performs that mapping and is where sanitization happens; internal
//! details never reach `error.message` or `error.data`.

// Layer 2: Third-party crate imports
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::correlation::CorrelationError;
use crate::protocol::JsonRpcError;
use crate::transport::TransportError;

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-level error on either peer
#[derive(Error, Debug)]
pub enum McpError {
    /// Request parameters were missing or malformed
    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// No handler registered for the method
    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    /// The request itself was malformed (e.g. duplicate id)
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Handler failure; the wire sees only a generic message
    #[error("internal error: {message}")]
    Internal { message: String },

    /// The operation requires the client to visit a URL first
    #[error("url elicitation required")]
    UrlElicitationRequired { data: Option<Value> },

    /// Feature requests before the initialize handshake completed
    #[error("session not initialized")]
    NotInitialized,

    /// An outbound request was not answered in time
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u128 },

    /// The peer answered with a JSON-RPC error
    #[error("peer error: {0}")]
    Peer(JsonRpcError),

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Correlation-level failure
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// Local serialization failure
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl McpError {
    /// Invalid-params error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        McpError::InvalidParams {
            message: message.into(),
        }
    }

    /// Method-not-found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        McpError::MethodNotFound {
            method: method.into(),
        }
    }

    /// Invalid-request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        McpError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Internal error; the message stays local
    pub fn internal(message: impl Into<String>) -> Self {
        McpError::Internal {
            message: message.into(),
        }
    }

    /// Map to the wire-level error object.
    ///
    /// Everything that is not an explicit protocol error collapses to the
    /// sanitized `-32603 Internal error`: no paths, no stack fragments, no
    /// original handler text.
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        match self {
            McpError::InvalidParams { message } => JsonRpcError::invalid_params(message.clone()),
            McpError::MethodNotFound { method } => JsonRpcError::method_not_found(method),
            McpError::InvalidRequest { message } => JsonRpcError::invalid_request(message.clone()),
            McpError::UrlElicitationRequired { data } => {
                JsonRpcError::url_elicitation_required(data.clone())
            }
            McpError::Peer(error) => error.clone(),
            _ => JsonRpcError::internal_error(),
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(error: JsonRpcError) -> Self {
        McpError::Peer(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_map_to_their_codes() {
        assert_eq!(
            McpError::invalid_params("missing name").to_json_rpc_error().code,
            -32602
        );
        assert_eq!(
            McpError::method_not_found("x").to_json_rpc_error().code,
            -32601
        );
        assert_eq!(
            McpError::invalid_request("dup").to_json_rpc_error().code,
            -32600
        );
        assert_eq!(
            McpError::UrlElicitationRequired { data: None }
                .to_json_rpc_error()
                .code,
            -32042
        );
    }

    #[test]
    fn test_internal_details_never_reach_the_wire() {
        let error = McpError::internal("secret path /etc/shadow exploded");
        let wire = error.to_json_rpc_error();
        assert_eq!(wire.code, -32603);
        assert_eq!(wire.message, "Internal error");
        assert!(wire.data.is_none());
    }

    #[test]
    fn test_transport_errors_sanitize_too() {
        let error = McpError::from(TransportError::connection("10.0.0.5 refused"));
        let wire = error.to_json_rpc_error();
        assert_eq!(wire.code, -32603);
        assert_eq!(wire.message, "Internal error");
    }
}
