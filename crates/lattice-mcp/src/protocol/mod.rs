//! Protocol Layer
//!
//! Unified JSON-RPC 2.0 + MCP protocol implementation: wire message types,
//! MCP domain entities, method bodies, error codes, and shared constants.
//!
//! The protocol layer is pure data: no I/O, no dispatch. Transports consume
//! [`JsonRpcMessage::parse`] and [`JsonRpcMessageTrait`]; the session core and
//! feature handlers consume the typed structures.

pub mod constants;
pub mod errors;
pub mod message;
pub mod messages;
pub mod types;

// Re-export the working set so deeper modules can `use crate::protocol::...`
pub use errors::{error_codes, ProtocolError, ProtocolResult};
pub use message::{
    JsonRpcError, JsonRpcMessage, JsonRpcMessageTrait, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
pub use types::{
    Annotations, CallToolResult, ClientCapabilities, CompletionsCapability, Content,
    ElicitationAction, ElicitationCapability, ElicitationResponse, Icon, Implementation, LogLevel,
    LoggingCapability, Prompt, PromptArgument, PromptMessage, PromptsCapability, ProtocolVersion,
    Resource, ResourceContents, ResourceTemplate, ResourcesCapability, Role, RootsCapability,
    SamplingCapability, ServerCapabilities, Task, TaskMetadata, TaskStatus, TasksCapability, Tool,
    ToolAnnotations, ToolsCapability,
};
