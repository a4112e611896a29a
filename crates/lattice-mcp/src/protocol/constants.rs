//! Protocol Constants
//!
//! Method names, notification names, HTTP headers, and protocol version
//! strings shared by the session core and the transports.

/// MCP request method names
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";

    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";

    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";

    pub const COMPLETION_COMPLETE: &str = "completion/complete";

    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";

    pub const TASKS_GET: &str = "tasks/get";
    pub const TASKS_RESULT: &str = "tasks/result";
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    pub const TASKS_LIST: &str = "tasks/list";

    // Server-initiated requests dispatched by the client side
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";
}

/// MCP notification method names
pub mod notifications {
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";
    /// Pre-namespacing alias still emitted by older peers
    pub const CANCELLED_LEGACY: &str = "cancelled";
    pub const PROGRESS: &str = "notifications/progress";
    pub const MESSAGE: &str = "notifications/message";
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const TASKS_STATUS: &str = "notifications/tasks/status";
}

/// HTTP header names used by the Streamable HTTP transport
pub mod headers {
    pub const MCP_SESSION_ID: &str = "mcp-session-id";
    pub const MCP_PROTOCOL_VERSION: &str = "mcp-protocol-version";
    pub const LAST_EVENT_ID: &str = "last-event-id";
}

/// Protocol version strings
pub mod versions {
    /// Versions this implementation can negotiate, oldest first.
    pub const SUPPORTED: &[&str] = &["2025-03-26", "2025-06-18", "2025-11-25"];

    /// Fallback when a peer omits the `MCP-Protocol-Version` header.
    pub const DEFAULT: &str = "2025-11-25";
}

/// Default tuning values shared across the crate
pub mod defaults {
    use std::time::Duration;

    /// Outbound request timeout before a cancellation is issued.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Items per page for the paginated list operations.
    pub const PAGE_SIZE: usize = 50;

    /// Suggested poll interval surfaced in task snapshots, in milliseconds.
    pub const TASK_POLL_INTERVAL_MS: u64 = 1000;

    /// Events retained per SSE stream for `Last-Event-ID` replay.
    pub const SSE_REPLAY_BUFFER: usize = 200;

    /// Client-side delay between SSE reconnect attempts.
    pub const SSE_RETRY_DELAY: Duration = Duration::from_secs(3);

    /// Upper bound for a single framed message, in bytes.
    pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    /// Ceiling on completion values returned by `completion/complete`.
    pub const MAX_COMPLETION_VALUES: usize = 100;
}
