//! Streamable HTTP Configuration

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 3: Internal module imports
use crate::auth::{AuthRequirements, AuthValidator};
use crate::protocol::constants::{defaults, versions};

/// Authentication settings for the HTTP server transport
#[derive(Clone)]
pub struct HttpAuthConfig {
    /// Host-supplied bearer validator, called per request before dispatch
    pub validator: Arc<dyn AuthValidator>,
    /// Scope requirements and the advertised resource metadata URL
    pub requirements: AuthRequirements,
}

impl std::fmt::Debug for HttpAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthConfig")
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

/// Server-side Streamable HTTP settings
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// The single MCP endpoint path
    pub endpoint: String,
    /// Origin allow-list. An Origin header that is absent passes; one that
    /// is present must appear here; with an empty list every Origin header
    /// is rejected (anti-DNS-rebinding).
    pub allowed_origins: Vec<String>,
    /// Protocol versions accepted in `MCP-Protocol-Version`
    pub protocol_versions: Vec<String>,
    /// Whether requests after `initialize` must carry `MCP-Session-Id`
    pub require_session: bool,
    /// Whether DELETE may terminate the session (405 otherwise)
    pub allow_session_delete: bool,
    /// Events retained per SSE stream for `Last-Event-ID` replay
    pub replay_buffer: usize,
    /// Optional bearer validation
    pub auth: Option<HttpAuthConfig>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            endpoint: "/mcp".to_string(),
            allowed_origins: Vec::new(),
            protocol_versions: versions::SUPPORTED.iter().map(|v| v.to_string()).collect(),
            require_session: true,
            allow_session_delete: true,
            replay_buffer: defaults::SSE_REPLAY_BUFFER,
            auth: None,
        }
    }
}

/// Client-side Streamable HTTP settings
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:8321/mcp`
    pub endpoint: String,
    /// Value sent in `MCP-Protocol-Version`
    pub protocol_version: String,
    /// Delay between SSE reconnect attempts (overridable by `retry:` fields)
    pub retry_delay: Duration,
    /// Whether to run the background GET stream after initialization
    pub open_stream: bool,
}

impl HttpClientConfig {
    /// Config for the given endpoint URL with defaults elsewhere
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            protocol_version: versions::DEFAULT.to_string(),
            retry_delay: defaults::SSE_RETRY_DELAY,
            open_stream: true,
        }
    }
}
