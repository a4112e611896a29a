//! High-level MCP Server
//!
//! [`McpServer`] wires a [`Session`] to the registered feature handlers:
//! tools, resources (exact and templated), prompts, completions, tasks,
//! logging, and extensions. Registration happens through
//! [`McpServerBuilder`] before the session starts; runtime state is limited
//! to subscriptions and the task registry.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};
use super::extensions::{Extension, ExtensionRegistry};
use super::pagination::paginate;
use super::session::{RequestDispatcher, Session, SessionConfig};
use super::tasks::TaskRegistry;
use crate::protocol::constants::{defaults, methods, notifications};
use crate::protocol::messages::{
    CallToolParams, CompleteParams, CompleteResult, CompletionReference, CreateTaskResult,
    GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListTasksResult, ListToolsResult,
    PaginatedParams, ReadResourceParams, ReadResourceResult, ResourceUpdatedParams,
    SetLevelParams, SubscribeParams, TaskParams, TaskOutcomeResult, TaskSnapshotResult,
    TaskStatusParams,
};
use crate::protocol::{
    CompletionsCapability, Implementation, LogLevel, LoggingCapability, PromptsCapability,
    ProtocolVersion, ResourcesCapability, ServerCapabilities, TasksCapability, ToolsCapability,
};
use crate::providers::{
    normalize_tool_output, Completer, RegisteredPrompt, RegisteredResource,
    RegisteredResourceTemplate, RegisteredTool,
};
use crate::transport::{MessageReceiver, Transport};

/// Server identity and tuning
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Identity sent in the initialize response
    pub server_info: Implementation,
    /// Optional instructions surfaced to the client during initialization
    pub instructions: Option<String>,
    /// Items per page for the list operations
    pub page_size: usize,
    /// Outbound request deadline
    pub request_timeout: Duration,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_info: Implementation::new("lattice-mcp-server", env!("CARGO_PKG_VERSION")),
            instructions: None,
            page_size: defaults::PAGE_SIZE,
            request_timeout: defaults::REQUEST_TIMEOUT,
        }
    }
}

/// Immutable registration tables plus the server's runtime state
struct ServerInner {
    config: McpServerConfig,
    capabilities: ServerCapabilities,
    tools: Vec<RegisteredTool>,
    resources: Vec<RegisteredResource>,
    templates: Vec<RegisteredResourceTemplate>,
    prompts: Vec<RegisteredPrompt>,
    completers: HashMap<String, Completer>,
    extensions: ExtensionRegistry,
    subscriptions: Mutex<HashSet<String>>,
    tasks: TaskRegistry,
}

/// Builder for [`McpServer`]
///
/// # Examples
///
/// ```rust,no_run
/// use lattice_mcp::integration::McpServerBuilder;
/// use lattice_mcp::providers::RegisteredTool;
/// use lattice_mcp::protocol::Tool;
/// use lattice_mcp::transport::StdioTransport;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let echo = RegisteredTool::new(
///     Tool {
///         name: "echo".into(),
///         description: Some("Echoes its input".into()),
///         input_schema: json!({"type": "object"}),
///         output_schema: None,
///         annotations: None,
///         execution: None,
///     },
///     |args| async move { Ok(serde_json::Value::Object(args)) },
/// )?;
///
/// let (transport, inbound) = StdioTransport::new();
/// let server = McpServerBuilder::new()
///     .server_info("demo-server", "1.0.0")
///     .with_tool(echo)
///     .serve(Arc::new(transport), inbound)?;
/// # drop(server);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct McpServerBuilder {
    config: McpServerConfig,
    capabilities: ServerCapabilities,
    tools: Vec<RegisteredTool>,
    resources: Vec<RegisteredResource>,
    templates: Vec<RegisteredResourceTemplate>,
    prompts: Vec<RegisteredPrompt>,
    completers: HashMap<String, Completer>,
    extensions: ExtensionRegistry,
    registration_error: Option<McpError>,
}

impl McpServerBuilder {
    /// Fresh builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server identity
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.server_info = Implementation::new(name, version);
        self
    }

    /// Set initialization instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    /// Set the page size for list operations
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the outbound request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Override the base capabilities (auto-detection still augments them)
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Register a tool
    pub fn with_tool(mut self, tool: RegisteredTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register a concrete resource
    pub fn with_resource(mut self, resource: RegisteredResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Register a resource template
    pub fn with_resource_template(mut self, template: RegisteredResourceTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Register a prompt
    pub fn with_prompt(mut self, prompt: RegisteredPrompt) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Register a completer
    pub fn with_completer(mut self, completer: Completer) -> Self {
        self.completers.insert(completer.key().to_string(), completer);
        self
    }

    /// Register a protocol extension
    pub fn with_extension(mut self, extension: Extension) -> Self {
        if let Err(error) = self.extensions.register(extension) {
            self.registration_error.get_or_insert(error);
        }
        self
    }

    /// Start serving over the given transport.
    ///
    /// Capabilities are derived from what was registered, the session's
    /// inbound loop is spawned, and the returned handle stays alive for the
    /// life of the connection.
    ///
    /// # Errors
    ///
    /// Returns the deferred registration error, or
    /// [`McpError::InvalidRequest`] for duplicate tool/resource/prompt names.
    pub fn serve(
        self,
        transport: Arc<dyn Transport>,
        inbound: MessageReceiver,
    ) -> McpResult<McpServer> {
        if let Some(error) = self.registration_error {
            return Err(error);
        }
        ensure_unique("tool", self.tools.iter().map(|t| t.name()))?;
        ensure_unique("resource", self.resources.iter().map(|r| r.uri()))?;
        ensure_unique("prompt", self.prompts.iter().map(|p| p.name()))?;

        let mut capabilities = self.capabilities;
        if !self.tools.is_empty() {
            capabilities.tools = Some(ToolsCapability {
                list_changed: Some(true),
            });
            capabilities.tasks = Some(TasksCapability::default());
        }
        if !self.resources.is_empty() || !self.templates.is_empty() {
            capabilities.resources = Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            });
        }
        if !self.prompts.is_empty() {
            capabilities.prompts = Some(PromptsCapability {
                list_changed: Some(true),
            });
        }
        if !self.completers.is_empty() {
            capabilities.completions = Some(CompletionsCapability::default());
        }
        capabilities.logging = Some(LoggingCapability::default());
        if !self.extensions.is_empty() {
            capabilities
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
        let inner = Arc::new(ServerInner {
            config: self.config,
            capabilities,
            tools: self.tools,
            resources: self.resources,
            templates: self.templates,
            prompts: self.prompts,
            completers: self.completers,
            extensions: self.extensions,
            subscriptions: Mutex::new(HashSet::new()),
            tasks: TaskRegistry::new(),
        });

        let dispatcher = Arc::new(ServerDispatcher {
            inner: Arc::clone(&inner),
        });
        let loop_handle = Arc::clone(&session).run(inbound, dispatcher);

        Ok(McpServer {
            session,
            inner,
            loop_handle,
        })
    }
}

fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> McpResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(McpError::invalid_request(format!(
                "duplicate {kind} registration: {name:?}"
            )));
        }
    }
    Ok(())
}

/// A running MCP server bound to one transport connection
pub struct McpServer {
    session: Arc<Session>,
    inner: Arc<ServerInner>,
    loop_handle: JoinHandle<()>,
}

impl McpServer {
    /// The underlying session (for logging, progress, raw requests)
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether the initialize handshake has completed
    pub async fn is_initialized(&self) -> bool {
        self.session.state().await.initialized
    }

    /// Emit `notifications/resources/updated` for a uri, only if the peer
    /// currently subscribes to it. Returns whether a notification went out.
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the send fails.
    pub async fn notify_resource_updated(&self, uri: &str) -> McpResult<bool> {
        let subscribed = self.inner.subscriptions.lock().await.contains(uri);
        if !subscribed {
            return Ok(false);
        }
        let params = ResourceUpdatedParams {
            uri: uri.to_string(),
        };
        self.session
            .notify(
                notifications::RESOURCES_UPDATED,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        Ok(true)
    }

    /// Emit `notifications/tools/list_changed`
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the send fails.
    pub async fn notify_tools_list_changed(&self) -> McpResult<()> {
        self.session
            .notify(notifications::TOOLS_LIST_CHANGED, None)
            .await
    }

    /// Emit `notifications/resources/list_changed`
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the send fails.
    pub async fn notify_resources_list_changed(&self) -> McpResult<()> {
        self.session
            .notify(notifications::RESOURCES_LIST_CHANGED, None)
            .await
    }

    /// Emit `notifications/prompts/list_changed`
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the send fails.
    pub async fn notify_prompts_list_changed(&self) -> McpResult<()> {
        self.session
            .notify(notifications::PROMPTS_LIST_CHANGED, None)
            .await
    }

    /// Emit a log notification, honoring the session threshold
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the send fails.
    pub async fn log(&self, level: LogLevel, data: Value) -> McpResult<()> {
        self.session.log(level, None, data).await
    }

    /// Extensions both sides registered
    pub async fn negotiated_extensions(&self) -> Vec<String> {
        let state = self.session.state().await;
        let peer_experimental = state
            .client_capabilities
            .as_ref()
            .and_then(|c| c.experimental.as_ref());
        self.inner.extensions.negotiated(peer_experimental)
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

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("server_info", &self.inner.config.server_info)
            .finish_non_exhaustive()
    }
}

/// Feature-method dispatch for the server side
struct ServerDispatcher {
    inner: Arc<ServerInner>,
}

#[async_trait]
impl RequestDispatcher for ServerDispatcher {
    async fn dispatch(
        &self,
        method: String,
        params: Option<Value>,
        session: Arc<Session>,
    ) -> McpResult<Value> {
        match method.as_str() {
            methods::INITIALIZE => self.initialize(params, &session).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.list_tools(params),
            methods::TOOLS_CALL => self.call_tool(params, &session).await,
            methods::RESOURCES_LIST => self.list_resources(params),
            methods::RESOURCES_TEMPLATES_LIST => self.list_resource_templates(params),
            methods::RESOURCES_READ => self.read_resource(params).await,
            methods::RESOURCES_SUBSCRIBE => self.subscribe(params, true).await,
            methods::RESOURCES_UNSUBSCRIBE => self.subscribe(params, false).await,
            methods::PROMPTS_LIST => self.list_prompts(params),
            methods::PROMPTS_GET => self.get_prompt(params).await,
            methods::COMPLETION_COMPLETE => self.complete(params).await,
            methods::LOGGING_SET_LEVEL => self.set_level(params, &session).await,
            methods::TASKS_GET => self.task_get(params).await,
            methods::TASKS_RESULT => self.task_result(params).await,
            methods::TASKS_CANCEL => self.task_cancel(params, &session).await,
            methods::TASKS_LIST => self.task_list(params).await,
            other => match self.inner.extensions.find_method(other) {
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
        if let Some(handler) = self.inner.extensions.find_notification(&method) {
            handler(params).await;
        }
    }
}

impl ServerDispatcher {
    #[instrument(level = "debug", skip_all)]
    async fn initialize(&self, params: Option<Value>, session: &Arc<Session>) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        let negotiated = ProtocolVersion::negotiate(&params.protocol_version);
        debug!(
            client = %params.client_info.name,
            requested = %params.protocol_version,
            negotiated = %negotiated,
            "initialize"
        );

        session
            .update_state(|state| {
                state.initialized = true;
                state.protocol_version = Some(negotiated.as_str().to_string());
                state.peer_info = Some(params.client_info.clone());
                state.client_capabilities = Some(params.capabilities.clone());
            })
            .await;

        let result = InitializeResult {
            protocol_version: negotiated.as_str().to_string(),
            capabilities: self.inner.capabilities.clone(),
            server_info: self.inner.config.server_info.clone(),
            instructions: self.inner.config.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn list_tools(&self, params: Option<Value>) -> McpResult<Value> {
        let params: PaginatedParams = parse_params_or_default(params)?;
        let definitions: Vec<_> = self.inner.tools.iter().map(|t| t.definition().clone()).collect();
        let (tools, next_cursor) =
            paginate(&definitions, params.cursor.as_deref(), self.inner.config.page_size)?;
        Ok(serde_json::to_value(ListToolsResult { tools, next_cursor })?)
    }

    async fn call_tool(&self, params: Option<Value>, session: &Arc<Session>) -> McpResult<Value> {
        let params: CallToolParams = parse_params(params)?;
        let tool = self
            .inner
            .tools
            .iter()
            .find(|t| t.name() == params.name)
            .ok_or_else(|| McpError::invalid_params(format!("unknown tool: {}", params.name)))?
            .clone();
        let args = params.arguments.unwrap_or_default();

        if let Some(task) = params.task {
            return self.call_tool_as_task(session, tool, args, task.ttl).await;
        }

        let output = tool.invoke(args).await?;
        let result = normalize_tool_output(output, tool.has_output_schema());
        Ok(serde_json::to_value(result)?)
    }

    /// Task-routed tool call: snapshot now, run the handler concurrently,
    /// answer with the snapshot immediately.
    async fn call_tool_as_task(
        &self,
        session: &Arc<Session>,
        tool: RegisteredTool,
        args: serde_json::Map<String, Value>,
        ttl: u64,
    ) -> McpResult<Value> {
        let task = self.inner.tasks.create(ttl).await;
        let task_id = task.task_id.clone();
        let inner = Arc::clone(&self.inner);
        let session = Arc::clone(session);

        tokio::spawn(async move {
            let has_schema = tool.has_output_schema();
            let snapshot = match tool.invoke(args).await {
                Ok(output) => {
                    let result = normalize_tool_output(output, has_schema);
                    inner.tasks.complete(&task_id, result).await
                }
                Err(error) => inner.tasks.fail(&task_id, error.to_string()).await,
            };

            if let Some(snapshot) = snapshot {
                let params = TaskStatusParams { task: snapshot };
                match serde_json::to_value(params) {
                    Ok(params) => {
                        if let Err(e) = session
                            .notify(notifications::TASKS_STATUS, Some(params))
                            .await
                        {
                            debug!("failed to send task status notification: {e}");
                        }
                    }
                    Err(e) => warn!("task status serialization failed: {e}"),
                }
            }
        });

        Ok(serde_json::to_value(CreateTaskResult { task })?)
    }

    fn list_resources(&self, params: Option<Value>) -> McpResult<Value> {
        let params: PaginatedParams = parse_params_or_default(params)?;
        let definitions: Vec<_> = self
            .inner
            .resources
            .iter()
            .map(|r| r.definition().clone())
            .collect();
        let (resources, next_cursor) =
            paginate(&definitions, params.cursor.as_deref(), self.inner.config.page_size)?;
        Ok(serde_json::to_value(ListResourcesResult {
            resources,
            next_cursor,
        })?)
    }

    fn list_resource_templates(&self, params: Option<Value>) -> McpResult<Value> {
        let params: PaginatedParams = parse_params_or_default(params)?;
        let definitions: Vec<_> = self
            .inner
            .templates
            .iter()
            .map(|t| t.definition().clone())
            .collect();
        let (resource_templates, next_cursor) =
            paginate(&definitions, params.cursor.as_deref(), self.inner.config.page_size)?;
        Ok(serde_json::to_value(ListResourceTemplatesResult {
            resource_templates,
            next_cursor,
        })?)
    }

    async fn read_resource(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ReadResourceParams = parse_params(params)?;

        // Exact resources take precedence over templates.
        if let Some(resource) = self.inner.resources.iter().find(|r| r.uri() == params.uri) {
            let contents = resource.read().await?;
            return Ok(serde_json::to_value(ReadResourceResult { contents })?);
        }

        // Templates are tried in registration order; first match wins.
        for template in &self.inner.templates {
            if let Some(bindings) = template.match_uri(&params.uri) {
                let contents = template.read(bindings).await?;
                return Ok(serde_json::to_value(ReadResourceResult { contents })?);
            }
        }

        Err(McpError::invalid_params(format!(
            "unknown resource: {}",
            params.uri
        )))
    }

    async fn subscribe(&self, params: Option<Value>, subscribe: bool) -> McpResult<Value> {
        let params: SubscribeParams = parse_params(params)?;

        let known = self.inner.resources.iter().any(|r| r.uri() == params.uri)
            || self
                .inner
                .templates
                .iter()
                .any(|t| t.match_uri(&params.uri).is_some());
        if !known {
            return Err(McpError::invalid_params(format!(
                "unknown resource: {}",
                params.uri
            )));
        }

        let mut subscriptions = self.inner.subscriptions.lock().await;
        if subscribe {
            subscriptions.insert(params.uri);
        } else {
            subscriptions.remove(&params.uri);
        }
        Ok(json!({}))
    }

    fn list_prompts(&self, params: Option<Value>) -> McpResult<Value> {
        let params: PaginatedParams = parse_params_or_default(params)?;
        let definitions: Vec<_> = self
            .inner
            .prompts
            .iter()
            .map(|p| p.definition().clone())
            .collect();
        let (prompts, next_cursor) =
            paginate(&definitions, params.cursor.as_deref(), self.inner.config.page_size)?;
        Ok(serde_json::to_value(ListPromptsResult {
            prompts,
            next_cursor,
        })?)
    }

    async fn get_prompt(&self, params: Option<Value>) -> McpResult<Value> {
        let params: GetPromptParams = parse_params(params)?;
        let prompt = self
            .inner
            .prompts
            .iter()
            .find(|p| p.name() == params.name)
            .ok_or_else(|| McpError::invalid_params(format!("unknown prompt: {}", params.name)))?;

        let args = params.arguments.unwrap_or_default();
        for required in prompt.required_arguments() {
            if !args.contains_key(required) {
                return Err(McpError::invalid_params(format!(
                    "missing required argument: {required}"
                )));
            }
        }

        let messages = prompt.generate(args).await?.into_messages();
        let result = GetPromptResult {
            description: prompt.definition().description.clone(),
            messages,
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn complete(&self, params: Option<Value>) -> McpResult<Value> {
        let params: CompleteParams = parse_params(params)?;
        let key = match &params.reference {
            CompletionReference::Prompt { name } => format!("prompt:{name}"),
            CompletionReference::Resource { uri } => format!("resource:{uri}"),
        };

        // No completer is not an error: the peer gets an empty value list.
        let Some(completer) = self.inner.completers.get(&key) else {
            return Ok(serde_json::to_value(CompleteResult::default())?);
        };

        let output = completer
            .complete(params.argument.name, params.argument.value, params.context)
            .await?;
        Ok(serde_json::to_value(CompleteResult {
            completion: output.into_completion(),
        })?)
    }

    async fn set_level(&self, params: Option<Value>, session: &Arc<Session>) -> McpResult<Value> {
        let params: SetLevelParams = parse_params(params)?;
        session.set_log_threshold(params.level).await;
        Ok(json!({}))
    }

    async fn task_get(&self, params: Option<Value>) -> McpResult<Value> {
        let params: TaskParams = parse_params(params)?;
        let task = self
            .inner
            .tasks
            .get(&params.task_id)
            .await
            .ok_or_else(|| McpError::invalid_params(format!("unknown task: {}", params.task_id)))?;
        Ok(serde_json::to_value(TaskSnapshotResult { task })?)
    }

    async fn task_result(&self, params: Option<Value>) -> McpResult<Value> {
        let params: TaskParams = parse_params(params)?;
        let (task, result) = self.inner.tasks.await_outcome(&params.task_id).await?;
        Ok(serde_json::to_value(TaskOutcomeResult { task, result })?)
    }

    async fn task_cancel(&self, params: Option<Value>, session: &Arc<Session>) -> McpResult<Value> {
        let params: TaskParams = parse_params(params)?;
        let (task, transitioned) = self.inner.tasks.cancel(&params.task_id).await?;

        if transitioned {
            let status = TaskStatusParams { task: task.clone() };
            if let Err(e) = session
                .notify(notifications::TASKS_STATUS, Some(serde_json::to_value(status)?))
                .await
            {
                debug!("failed to send task status notification: {e}");
            }
        }
        Ok(serde_json::to_value(TaskSnapshotResult { task })?)
    }

    async fn task_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: PaginatedParams = parse_params_or_default(params)?;
        let snapshots = self.inner.tasks.list().await;
        let (tasks, next_cursor) =
            paginate(&snapshots, params.cursor.as_deref(), self.inner.config.page_size)?;
        Ok(serde_json::to_value(ListTasksResult { tasks, next_cursor })?)
    }
}

/// Parse required params; absence or shape mismatch is InvalidParams.
fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}

/// Parse optional params (list operations accept no params at all).
fn parse_params_or_default<T: DeserializeOwned + Default>(params: Option<Value>) -> McpResult<T> {
    match params {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
        }
        None => Ok(T::default()),
    }
}
