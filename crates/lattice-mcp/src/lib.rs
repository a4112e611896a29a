//! Lattice MCP - Model Context Protocol Implementation
//!
//! This crate implements the Model Context Protocol (MCP) on a JSON-RPC 2.0
//! foundation: a host process exposes tools, resources, and prompts to an AI
//! client (and, symmetrically, consumes them) over pluggable transports.
//!
//! # Architecture
//!
//! The implementation is organized in layers:
//!
//! - **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types, MCP domain
//!   entities, method bodies, error codes
//! - **Transport Layer** (`transport`): stdio with Content-Length framing,
//!   Streamable HTTP with SSE replay, and the legacy SSE variant
//! - **Correlation Layer** (`correlation`): pending-request bookkeeping with
//!   single-shot settlement and timeout expiry
//! - **Integration Layer** (`integration`): the symmetric session core plus
//!   the high-level [`McpServer`](integration::McpServer) and
//!   [`McpClient`](integration::McpClient)
//! - **Providers Layer** (`providers`): the registration contract: tools,
//!   resources, templates, prompts, completers
//! - **Auth Layer** (`auth`): the per-request bearer-validation hook the
//!   HTTP transports consume
//!
//! # Quick Start
//!
//! A server over stdio:
//!
//! ```rust,no_run
//! use lattice_mcp::integration::McpServerBuilder;
//! use lattice_mcp::providers::RegisteredTool;
//! use lattice_mcp::protocol::Tool;
//! use lattice_mcp::transport::StdioTransport;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let echo = RegisteredTool::new(
//!     Tool {
//!         name: "echo".into(),
//!         description: Some("Echoes its arguments".into()),
//!         input_schema: json!({"type": "object"}),
//!         output_schema: None,
//!         annotations: None,
//!         execution: None,
//!     },
//!     |args| async move { Ok(serde_json::Value::Object(args)) },
//! )?;
//!
//! let (transport, inbound) = StdioTransport::new();
//! let _server = McpServerBuilder::new()
//!     .server_info("echo-server", "1.0.0")
//!     .with_tool(echo)
//!     .serve(Arc::new(transport), inbound)?;
//! # Ok(())
//! # }
//! ```
//!
//! The session core is symmetric: both peers frame and parse messages,
//! dispatch requests and notifications, correlate responses to outstanding
//! requests, enforce the initialize lifecycle, and support per-request
//! cancellation, long-running tasks, resource subscriptions, paginated
//! listings, completions, and namespaced extensions.

// Auth hook consumed by the HTTP transports
pub mod auth;

// Correlation layer modules
pub mod correlation;

// Integration layer modules
pub mod integration;

// Protocol layer modules
pub mod protocol;

// Providers layer modules
pub mod providers;

// Transport layer modules
pub mod transport;

// Re-export commonly used types for convenience
pub use protocol::{
    JsonRpcError,
    // JSON-RPC 2.0 Message Types
    JsonRpcMessage,
    JsonRpcMessageTrait,
    JsonRpcNotification,
    JsonRpcRequest,
    JsonRpcResponse,
    // Error Types
    ProtocolError,
    ProtocolResult,
    ProtocolVersion,
    RequestId,
};

// Re-export correlation types for convenience
pub use correlation::{CorrelationConfig, CorrelationError, CorrelationManager, CorrelationResult};

// Re-export integration types for convenience
pub use integration::{
    McpClient, McpClientBuilder, McpClientConfig, McpError, McpResult, McpServer,
    McpServerBuilder, McpServerConfig, Session,
};

// Re-export transport types for convenience
pub use transport::{StdioTransport, Transport, TransportError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the crate version as a string
pub fn version() -> &'static str {
    VERSION
}
