//! High-level MCP Client
//!
//! [`McpClient`] drives the initialize handshake and exposes typed wrappers
//! for every server method. The session underneath is the same symmetric
//! core the server runs: server-initiated requests (sampling, elicitation,
//! roots) dispatch to an optional [`ClientHandler`], and inbound
//! notifications surface on a broadcast stream for reactive consumers.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};
use super::extensions::{Extension, ExtensionRegistry};
use super::session::{RequestDispatcher, Session, SessionConfig};
use crate::protocol::constants::{defaults, methods, notifications};
use crate::protocol::messages::{
    CallToolParams, CompleteParams, CompleteResult, CompletionArgument, CompletionReference,
    CreateMessageResult, CreateTaskResult, GetPromptParams, GetPromptResult, InitializeParams,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListRootsResult, ListTasksResult, ListToolsResult, PaginatedParams, ReadResourceParams,
    ReadResourceResult, SetLevelParams, SubscribeParams, TaskOutcomeResult, TaskParams,
    TaskSnapshotResult,
};
use crate::protocol::{
    CallToolResult, ClientCapabilities, ElicitationCapability, ElicitationResponse,
    Implementation, JsonRpcNotification, LogLevel, ProtocolVersion, RootsCapability,
    SamplingCapability, ServerCapabilities, Task, TaskMetadata,
};
use crate::transport::{MessageReceiver, Transport};

/// Client identity and tuning
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Identity sent during initialization
    pub client_info: Implementation,
    /// Base capabilities to advertise (handler presence augments them)
    pub capabilities: ClientCapabilities,
    /// Protocol version to offer
    pub protocol_version: ProtocolVersion,
    /// Outbound request deadline
    pub request_timeout: Duration,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("lattice-mcp-client", env!("CARGO_PKG_VERSION")),
            capabilities: ClientCapabilities::default(),
            protocol_version: ProtocolVersion::current(),
            request_timeout: defaults::REQUEST_TIMEOUT,
        }
    }
}

/// Host hooks for server-initiated requests.
///
/// Default implementations answer MethodNotFound, so hosts implement only
/// what they support; the advertised capabilities follow the builder's
/// handler registration.
#[async_trait]
pub trait ClientHandler: Send + Sync {
    /// `sampling/createMessage`
    async fn create_message(&self, params: Option<Value>) -> McpResult<CreateMessageResult> {
        let _ = params;
        Err(McpError::method_not_found(methods::SAMPLING_CREATE_MESSAGE))
    }

    /// `elicitation/create`
    async fn elicit(&self, params: Option<Value>) -> McpResult<ElicitationResponse> {
        let _ = params;
        Err(McpError::method_not_found(methods::ELICITATION_CREATE))
    }

    /// `roots/list`
    async fn list_roots(&self) -> McpResult<ListRootsResult> {
        Err(McpError::method_not_found(methods::ROOTS_LIST))
    }
}

/// Builder for [`McpClient`]
#[derive(Default)]
pub struct McpClientBuilder {
    config: McpClientConfig,
    handler: Option<Arc<dyn ClientHandler>>,
    extensions: ExtensionRegistry,
    registration_error: Option<McpError>,
}

impl McpClientBuilder {
    /// Fresh builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client identity
    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = Implementation::new(name, version);
        self
    }

    /// Override the base capabilities
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Set the outbound request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Install hooks for server-initiated requests
    pub fn with_handler<H: ClientHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Register a protocol extension
    pub fn with_extension(mut self, extension: Extension) -> Self {
        if let Err(error) = self.extensions.register(extension) {
            self.registration_error.get_or_insert(error);
        }
        self
    }

    /// Connect over the given transport (does not initialize yet).
    ///
    /// # Errors
    ///
    /// Returns a deferred extension registration error.
    pub fn connect(
        mut self,
        transport: Arc<dyn Transport>,
        inbound: MessageReceiver,
    ) -> McpResult<McpClient> {
        if let Some(error) = self.registration_error {
            return Err(error);
        }

        if self.handler.is_some() {
            let capabilities = &mut self.config.capabilities;
            capabilities.sampling.get_or_insert(SamplingCapability::default());
            capabilities
                .elicitation
                .get_or_insert(ElicitationCapability::default());
            capabilities.roots.get_or_insert(RootsCapability {
                list_changed: Some(false),
            });
        }
        if !self.extensions.is_empty() {
            self.config
                .capabilities
                .experimental
                .get_or_insert_with(HashMap::new)
                .extend(self.extensions.experimental());
        }

        let session = Session::new(
            transport,
            SessionConfig {
                request_timeout: self.config.request_timeout,
            },
        );
        let dispatcher = Arc::new(ClientDispatcher {
            handler: self.handler,
            extensions: self.extensions.clone(),
        });
        let loop_handle = Arc::clone(&session).run(inbound, dispatcher);

        Ok(McpClient {
            session,
            config: self.config,
            extensions: self.extensions,
            loop_handle,
        })
    }
}

/// A connected MCP client
pub struct McpClient {
    session: Arc<Session>,
    config: McpClientConfig,
    extensions: ExtensionRegistry,
    loop_handle: JoinHandle<()>,
}

impl McpClient {
    /// Run the initialize handshake: send `initialize`, record the server's
    /// answer, then emit `notifications/initialized`. Feature requests are
    /// rejected until this completes.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidRequest`] when the server negotiates a
    /// version this implementation cannot speak, or the transport failure.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let params = InitializeParams {
            protocol_version: self.config.protocol_version.as_str().to_string(),
            capabilities: self.config.capabilities.clone(),
            client_info: self.config.client_info.clone(),
        };
        let value = self
            .session
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = parse_result(value)?;

        if !ProtocolVersion::is_supported(&result.protocol_version) {
            return Err(McpError::invalid_request(format!(
                "server negotiated unsupported protocol version: {}",
                result.protocol_version
            )));
        }
        debug!(
            server = %result.server_info.name,
            version = %result.protocol_version,
            "initialized"
        );

        self.session
            .update_state(|state| {
                state.initialized = true;
                state.protocol_version = Some(result.protocol_version.clone());
                state.peer_info = Some(result.server_info.clone());
                state.server_capabilities = Some(result.capabilities.clone());
                state.instructions = result.instructions.clone();
            })
            .await;

        self.session
            .notify(notifications::INITIALIZED, None)
            .await?;
        Ok(result)
    }

    async fn ensure_initialized(&self) -> McpResult<()> {
        if self.session.state().await.initialized {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    /// `ping`
    ///
    /// # Errors
    ///
    /// Returns the transport failure or the peer's error.
    pub async fn ping(&self) -> McpResult<()> {
        self.session.request(methods::PING, None).await?;
        Ok(())
    }

    /// `tools/list`
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotInitialized`] before the handshake, the
    /// peer's error, or the transport failure.
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        self.paginated(methods::TOOLS_LIST, cursor).await
    }

    /// `tools/call` awaited inline
    ///
    /// # Errors
    ///
    /// Returns the peer's error (unknown tool, handler failure) or the
    /// transport failure.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> McpResult<CallToolResult> {
        self.ensure_initialized().await?;
        let params = CallToolParams {
            name: name.into(),
            arguments,
            task: None,
            meta: None,
        };
        let value = self
            .session
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await?;
        parse_result(value)
    }

    /// `tools/call` routed through the task registry
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn call_tool_as_task(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Map<String, Value>>,
        ttl_ms: u64,
    ) -> McpResult<CreateTaskResult> {
        self.ensure_initialized().await?;
        let params = CallToolParams {
            name: name.into(),
            arguments,
            task: Some(TaskMetadata { ttl: ttl_ms }),
            meta: None,
        };
        let value = self
            .session
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await?;
        parse_result(value)
    }

    /// `tasks/get`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown task id.
    pub async fn task_status(&self, task_id: impl Into<String>) -> McpResult<Task> {
        self.ensure_initialized().await?;
        let params = TaskParams {
            task_id: task_id.into(),
        };
        let value = self
            .session
            .request(methods::TASKS_GET, Some(serde_json::to_value(params)?))
            .await?;
        let result: TaskSnapshotResult = parse_result(value)?;
        Ok(result.task)
    }

    /// `tasks/result`, blocking server-side until the task is terminal
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown task id, or
    /// [`McpError::Timeout`] when the task outlives the deadline.
    pub async fn task_result(
        &self,
        task_id: impl Into<String>,
        timeout: Option<Duration>,
    ) -> McpResult<TaskOutcomeResult> {
        self.ensure_initialized().await?;
        let params = TaskParams {
            task_id: task_id.into(),
        };
        let params = Some(serde_json::to_value(params)?);
        let value = match timeout {
            Some(timeout) => {
                self.session
                    .request_with_timeout(methods::TASKS_RESULT, params, timeout)
                    .await?
            }
            None => self.session.request(methods::TASKS_RESULT, params).await?,
        };
        parse_result(value)
    }

    /// `tasks/cancel`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown task id.
    pub async fn cancel_task(&self, task_id: impl Into<String>) -> McpResult<Task> {
        self.ensure_initialized().await?;
        let params = TaskParams {
            task_id: task_id.into(),
        };
        let value = self
            .session
            .request(methods::TASKS_CANCEL, Some(serde_json::to_value(params)?))
            .await?;
        let result: TaskSnapshotResult = parse_result(value)?;
        Ok(result.task)
    }

    /// `tasks/list`
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn list_tasks(&self, cursor: Option<String>) -> McpResult<ListTasksResult> {
        self.paginated(methods::TASKS_LIST, cursor).await
    }

    /// `resources/list`
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResult> {
        self.paginated(methods::RESOURCES_LIST, cursor).await
    }

    /// `resources/templates/list`
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResult> {
        self.paginated(methods::RESOURCES_TEMPLATES_LIST, cursor)
            .await
    }

    /// `resources/read`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown uri.
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        self.ensure_initialized().await?;
        let params = ReadResourceParams { uri: uri.into() };
        let value = self
            .session
            .request(methods::RESOURCES_READ, Some(serde_json::to_value(params)?))
            .await?;
        parse_result(value)
    }

    /// `resources/subscribe`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown uri.
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        self.subscription(methods::RESOURCES_SUBSCRIBE, uri.into())
            .await
    }

    /// `resources/unsubscribe`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown uri.
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        self.subscription(methods::RESOURCES_UNSUBSCRIBE, uri.into())
            .await
    }

    async fn subscription(&self, method: &str, uri: String) -> McpResult<()> {
        self.ensure_initialized().await?;
        let params = SubscribeParams { uri };
        self.session
            .request(method, Some(serde_json::to_value(params)?))
            .await?;
        Ok(())
    }

    /// `prompts/list`
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        self.paginated(methods::PROMPTS_LIST, cursor).await
    }

    /// `prompts/get`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown prompt or missing arguments.
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        self.ensure_initialized().await?;
        let params = GetPromptParams {
            name: name.into(),
            arguments,
        };
        let value = self
            .session
            .request(methods::PROMPTS_GET, Some(serde_json::to_value(params)?))
            .await?;
        parse_result(value)
    }

    /// `completion/complete`
    ///
    /// # Errors
    ///
    /// Returns the peer's error or the transport failure.
    pub async fn complete(
        &self,
        reference: CompletionReference,
        argument_name: impl Into<String>,
        partial_value: impl Into<String>,
        context: Option<Value>,
    ) -> McpResult<CompleteResult> {
        self.ensure_initialized().await?;
        let params = CompleteParams {
            reference,
            argument: CompletionArgument {
                name: argument_name.into(),
                value: partial_value.into(),
            },
            context,
        };
        let value = self
            .session
            .request(
                methods::COMPLETION_COMPLETE,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        parse_result(value)
    }

    /// `logging/setLevel`
    ///
    /// # Errors
    ///
    /// Returns the peer's error for an unknown level.
    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        self.ensure_initialized().await?;
        let params = SetLevelParams { level };
        self.session
            .request(
                methods::LOGGING_SET_LEVEL,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        Ok(())
    }

    async fn paginated<T: DeserializeOwned>(
        &self,
        method: &str,
        cursor: Option<String>,
    ) -> McpResult<T> {
        self.ensure_initialized().await?;
        let params = PaginatedParams { cursor };
        let value = self
            .session
            .request(method, Some(serde_json::to_value(params)?))
            .await?;
        parse_result(value)
    }

    /// Broadcast stream of every inbound notification
    pub fn notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.session.subscribe_notifications()
    }

    /// Server capabilities recorded during initialization
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.session.state().await.server_capabilities
    }

    /// Server instructions recorded during initialization
    pub async fn instructions(&self) -> Option<String> {
        self.session.state().await.instructions
    }

    /// Extensions both sides registered
    pub async fn negotiated_extensions(&self) -> Vec<String> {
        let state = self.session.state().await;
        let peer_experimental = state
            .server_capabilities
            .as_ref()
            .and_then(|c| c.experimental.as_ref());
        self.extensions.negotiated(peer_experimental)
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Close the session and stop the dispatch loop
    ///
    /// # Errors
    ///
    /// Returns the transport's close failure.
    pub async fn close(self) -> McpResult<()> {
        let result = self.session.close().await;
        self.loop_handle.abort();
        result
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("client_info", &self.config.client_info)
            .finish_non_exhaustive()
    }
}

/// Dispatch for server-initiated requests on the client side
struct ClientDispatcher {
    handler: Option<Arc<dyn ClientHandler>>,
    extensions: ExtensionRegistry,
}

#[async_trait]
impl RequestDispatcher for ClientDispatcher {
    async fn dispatch(
        &self,
        method: String,
        params: Option<Value>,
        _session: Arc<Session>,
    ) -> McpResult<Value> {
        match method.as_str() {
            methods::PING => Ok(json!({})),
            methods::SAMPLING_CREATE_MESSAGE => match &self.handler {
                Some(handler) => Ok(serde_json::to_value(handler.create_message(params).await?)?),
                None => Err(McpError::method_not_found(method)),
            },
            methods::ELICITATION_CREATE => match &self.handler {
                Some(handler) => Ok(serde_json::to_value(handler.elicit(params).await?)?),
                None => Err(McpError::method_not_found(method)),
            },
            methods::ROOTS_LIST => match &self.handler {
                Some(handler) => Ok(serde_json::to_value(handler.list_roots().await?)?),
                None => Err(McpError::method_not_found(method)),
            },
            other => match self.extensions.find_method(other) {
                Some(handler) => handler(params).await,
                None => Err(McpError::method_not_found(other)),
            },
        }
    }

    async fn dispatch_notification(
        &self,
        method: String,
        params: Option<Value>,
        _session: Arc<Session>,
    ) {
        if let Some(handler) = self.extensions.find_notification(&method) {
            handler(params).await;
        }
    }
}

fn parse_result<T: DeserializeOwned>(value: Value) -> McpResult<T> {
    serde_json::from_value(value)
        .map_err(|e| McpError::invalid_request(format!("malformed result from peer: {e}")))
}
