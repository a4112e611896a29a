//! JSON-RPC 2.0 Message Types
//!
//! Complete JSON-RPC 2.0 message implementation with shared serialization
//! behavior through a trait, a typed error object, and a strict decoder used
//! by every transport read loop.
//!
//! # Architecture
//!
//! - Core message structs (`JsonRpcRequest`, `JsonRpcResponse`,
//!   `JsonRpcNotification`) unified under the [`JsonRpcMessage`] sum type
//! - [`JsonRpcMessageTrait`] for consistent to/from JSON conversion
//! - [`JsonRpcMessage::parse`] enforcing the wire-level invariants transports
//!   rely on (jsonrpc marker, request/response shape, result xor error)
//!
//! # Examples
//!
//! ```rust
//! use lattice_mcp::protocol::{JsonRpcRequest, JsonRpcMessageTrait, RequestId};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new(
//!     "ping",
//!     Some(json!({"message": "hello"})),
//!     RequestId::new_number(1),
//! );
//!
//! let json = request.to_json().unwrap();
//! let parsed = JsonRpcRequest::from_json(&json).unwrap();
//! assert_eq!(request, parsed);
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::errors::{error_codes, ProtocolError, ProtocolResult};

/// JSON-RPC message types supporting requests, responses, and notifications
///
/// This enum unifies all JSON-RPC 2.0 message types into a single type for
/// transport and dispatch. Each variant preserves the specific structure of
/// its message type while providing unified serialization.
/// Variant order matters for untagged deserialization: `Response` holds only
/// optional fields, so it would match nearly any envelope and must be tried
/// last, after the `method`-carrying variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// JSON-RPC request message
    Request(JsonRpcRequest),
    /// JSON-RPC notification message
    Notification(JsonRpcNotification),
    /// JSON-RPC response message
    Response(JsonRpcResponse),
}

/// Trait for JSON-RPC message serialization and deserialization
///
/// Provides common functionality for all message types so serialization
/// behavior stays consistent. Any `Serialize + Deserialize` type gets the
/// default implementations for free.
pub trait JsonRpcMessageTrait: Serialize + for<'de> Deserialize<'de> {
    /// Serialize this message to a JSON string
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails, which should be
    /// rare given the controlled structure of JSON-RPC messages.
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize this message to pretty-printed JSON (debugging, logging)
    fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` when the input is not valid JSON or does
    /// not match the message shape.
    fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize directly into a reusable buffer, avoiding the intermediate
    /// `String` allocation
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    fn serialize_to_buffer(&self, buffer: &mut BytesMut) -> Result<(), serde_json::Error> {
        serde_json::to_writer(buffer.writer(), self)
    }

    /// Serialize this message to bytes
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let mut buffer = BytesMut::with_capacity(256);
        self.serialize_to_buffer(&mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Deserialize a message from JSON bytes
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` when the bytes are not valid JSON or do
    /// not match the message shape.
    fn from_json_bytes(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

impl JsonRpcMessage {
    /// Strictly decode a wire payload into a message.
    ///
    /// The untagged serde representation is too permissive for a transport
    /// boundary, so this decoder validates the envelope explicitly:
    ///
    /// - `jsonrpc` must be present and exactly `"2.0"`
    /// - a message must carry `method` (request/notification) or exactly one
    ///   of `result`/`error` (response)
    /// - a response carrying both `result` and `error` is rejected
    ///
    /// When validation fails after the payload parsed as JSON, the request
    /// `id` is recovered where possible so the caller can echo it in the
    /// `-32700` response.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidJson`] for malformed JSON,
    /// [`ProtocolError::InvalidMessage`] for envelope violations.
    pub fn parse(payload: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(payload)?;

        let object = match value {
            Value::Object(map) => map,
            _ => return Err(ProtocolError::invalid_message("payload is not an object")),
        };

        let recovered_id = object
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        let fail = |message: &str| match recovered_id.clone() {
            Some(id) => ProtocolError::invalid_message_with_id(message, id),
            None => ProtocolError::invalid_message(message),
        };

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            Some(_) => return Err(fail("jsonrpc version must be \"2.0\"")),
            None => return Err(fail("missing jsonrpc field")),
        }

        let has_method = object.contains_key("method");
        let has_result = object.contains_key("result");
        let has_error = object.contains_key("error");
        let has_id = object.contains_key("id");

        if has_result && has_error {
            return Err(fail("response carries both result and error"));
        }
        if !has_method && !has_result && !has_error {
            return Err(fail("message carries neither method nor result/error"));
        }
        if has_method && has_id && object.get("id") == Some(&Value::Null) {
            return Err(fail("request id must not be null"));
        }

        // Dispatch by shape rather than through the untagged enum, so a
        // malformed envelope fails here instead of matching the most
        // permissive variant.
        let value = Value::Object(object);
        let message = if has_method && has_id {
            serde_json::from_value::<JsonRpcRequest>(value).map(JsonRpcMessage::Request)
        } else if has_method {
            serde_json::from_value::<JsonRpcNotification>(value).map(JsonRpcMessage::Notification)
        } else {
            serde_json::from_value::<JsonRpcResponse>(value).map(JsonRpcMessage::Response)
        };
        message.map_err(|e| fail(&format!("message shape mismatch: {e}")))
    }

    /// Create a new notification message
    pub fn from_notification(method: &str, params: Option<Value>) -> Self {
        JsonRpcMessage::Notification(JsonRpcNotification::new(method, params))
    }

    /// Create a new request message
    pub fn from_request(method: &str, params: Option<Value>, id: RequestId) -> Self {
        JsonRpcMessage::Request(JsonRpcRequest::new(method, params, id))
    }

    /// Method name for requests and notifications, `None` for responses
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            JsonRpcMessage::Response(_) => None,
        }
    }

    /// Request id carried by this message, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => r.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }
}

/// Request ID supporting both string and numeric formats per JSON-RPC 2.0
///
/// The specification allows request IDs to be strings, numbers, or null.
/// This enum supports the string and numeric variants; null ids are
/// represented by `Option<RequestId>` on the response side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String-based request identifier
    String(String),
    /// Numeric request identifier
    Number(i64),
}

impl RequestId {
    /// Create a new string-based request ID
    pub fn new_string(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }

    /// Create a new numeric request ID
    pub fn new_number(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// JSON-RPC 2.0 error object
///
/// Typed representation of the `error` member of a response. Constructors
/// exist for every code the session emits; handler failures are sanitized at
/// the dispatcher boundary, so `message` never carries internal details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i64,

    /// Short human-readable description
    pub message: String,

    /// Optional structured error payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Arbitrary error with the given code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data to this error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `-32700` Parse error
    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error")
    }

    /// `-32600` Invalid request
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    /// `-32601` Method not found, echoing the unknown method name
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    /// `-32602` Invalid params
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    /// `-32603` Internal error with the sanitized generic message
    pub fn internal_error() -> Self {
        Self::new(error_codes::INTERNAL_ERROR, "Internal error")
    }

    /// `-32042` URL elicitation required
    pub fn url_elicitation_required(data: Option<Value>) -> Self {
        Self {
            code: error_codes::URL_ELICITATION_REQUIRED,
            message: "URL elicitation required".to_string(),
            data,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// JSON-RPC 2.0 Request Message
///
/// # Specification Compliance
///
/// - `jsonrpc`: MUST be exactly "2.0"
/// - `method`: MUST be a String naming the method to invoke
/// - `params`: MAY be omitted; if present MUST be an Object or Array
/// - `id`: MUST be a String or Number, unique among the originator's
///   outstanding requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version - always "2.0"
    pub jsonrpc: String,

    /// Name of the method to invoke
    pub method: String,

    /// Parameters for the method (object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Unique identifier for this request
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcMessageTrait for JsonRpcRequest {}

/// JSON-RPC 2.0 Response Message
///
/// Contains either a successful result or a typed error, never both.
/// `id` is `None` only for parse errors where no id could be recovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version - always "2.0"
    pub jsonrpc: String,

    /// Result of a successful invocation (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information for a failed invocation (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Request identifier from the original request (serialized as null for
    /// parse errors where no id could be recovered)
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcError, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// `-32700` response emitted by transport read loops, echoing the
    /// recovered id when the framing level could extract one.
    pub fn parse_error(id: Option<RequestId>) -> Self {
        Self::error(JsonRpcError::parse_error(), id)
    }
}

impl JsonRpcMessageTrait for JsonRpcResponse {}

/// JSON-RPC 2.0 Notification Message
///
/// A request without an id: "fire and forget". The absence of `id` is what
/// distinguishes a notification from a request on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol version - always "2.0"
    pub jsonrpc: String,

    /// Name of the notification method
    pub method: String,

    /// Parameters for the notification (object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcMessageTrait for JsonRpcNotification {}

impl JsonRpcMessageTrait for JsonRpcMessage {}
