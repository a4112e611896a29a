//! Registered Tools and Result Normalization
//!
//! A [`RegisteredTool`] pairs a [`Tool`] definition with one async handler
//! over a JSON object. Tool names are validated here, at registration, so the
//! session can trust every entry it lists or invokes.
//!
//! Handlers return [`ToolOutput`], a small sum type covering the shapes the
//! protocol knows how to render; [`normalize_tool_output`] collapses any of
//! them to a [`CallToolResult`].

// Layer 1: Standard library imports
use std::fmt;
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use crate::integration::{McpError, McpResult};
use crate::protocol::{CallToolResult, Content, Tool};

/// Tool handler: one async closure over the call's argument object.
pub type ToolHandler =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, McpResult<ToolOutput>> + Send + Sync>;

fn tool_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // The literal is a valid pattern; this cannot fail.
        Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap_or_else(|e| unreachable!("{e}"))
    })
}

/// Value shapes a tool handler may produce
///
/// Mirrors what hosts naturally return; the normalization rules pick the
/// first matching rendering:
///
/// 1. `Result` passes through untouched
/// 2. `Content` wraps into a single-item content list
/// 3. `Structured` becomes `structuredContent` when the tool declares an
///    `outputSchema` (text rendering otherwise)
/// 4. `Text` becomes one text content item
/// 5. `Sequence` is used as the content list
/// 6. anything else renders as its JSON text
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Result(CallToolResult),
    Content(Content),
    Structured(Map<String, Value>),
    Text(String),
    Sequence(Vec<Content>),
    Value(Value),
}

impl From<CallToolResult> for ToolOutput {
    fn from(result: CallToolResult) -> Self {
        ToolOutput::Result(result)
    }
}

impl From<Content> for ToolOutput {
    fn from(content: Content) -> Self {
        ToolOutput::Content(content)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<Vec<Content>> for ToolOutput {
    fn from(sequence: Vec<Content>) -> Self {
        ToolOutput::Sequence(sequence)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Value(value)
    }
}

/// Collapse a handler's output to the wire-level result shape.
///
/// `has_output_schema` gates the structured rendering: a mapping from a tool
/// without a declared `outputSchema` renders as text like any other value.
pub fn normalize_tool_output(output: ToolOutput, has_output_schema: bool) -> CallToolResult {
    match output {
        ToolOutput::Result(result) => result,
        ToolOutput::Content(content) => CallToolResult::from_content(vec![content]),
        ToolOutput::Structured(map) => normalize_mapping(map, has_output_schema),
        ToolOutput::Text(text) => CallToolResult::from_text(text),
        ToolOutput::Sequence(sequence) => CallToolResult::from_content(sequence),
        ToolOutput::Value(value) => normalize_value(value, has_output_schema),
    }
}

fn normalize_mapping(map: Map<String, Value>, has_output_schema: bool) -> CallToolResult {
    let value = Value::Object(map);
    if has_output_schema {
        CallToolResult {
            content: vec![Content::text(value.to_string())],
            structured_content: Some(value),
            is_error: None,
        }
    } else {
        CallToolResult::from_text(value.to_string())
    }
}

/// Dynamic dispatch for raw JSON values: re-apply the rules by shape.
fn normalize_value(value: Value, has_output_schema: bool) -> CallToolResult {
    match value {
        Value::Object(map) => normalize_mapping(map, has_output_schema),
        Value::String(text) => CallToolResult::from_text(text),
        Value::Array(items) => {
            let contents: Result<Vec<Content>, _> = items
                .iter()
                .map(|item| serde_json::from_value::<Content>(item.clone()))
                .collect();
            match contents {
                Ok(sequence) => CallToolResult::from_content(sequence),
                Err(_) => CallToolResult::from_text(Value::Array(items).to_string()),
            }
        }
        other => CallToolResult::from_text(other.to_string()),
    }
}

/// A tool definition bound to its handler
#[derive(Clone)]
pub struct RegisteredTool {
    tool: Tool,
    handler: ToolHandler,
}

impl RegisteredTool {
    /// Register a tool, validating its name
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidRequest`] when the name does not match
    /// `^[A-Za-z0-9_-]{1,64}$`.
    pub fn new<F, Fut, O>(tool: Tool, handler: F) -> McpResult<Self>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<O>> + Send + 'static,
        O: Into<ToolOutput>,
    {
        if !tool_name_pattern().is_match(&tool.name) {
            return Err(McpError::invalid_request(format!(
                "invalid tool name: {:?}",
                tool.name
            )));
        }

        let handler: ToolHandler = Arc::new(move |args| {
            let fut = handler(args);
            Box::pin(async move { fut.await.map(Into::into) })
        });
        Ok(Self { tool, handler })
    }

    /// The wire-level tool definition
    pub fn definition(&self) -> &Tool {
        &self.tool
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.tool.name
    }

    /// Whether the tool declares an `outputSchema`
    pub fn has_output_schema(&self) -> bool {
        self.tool.output_schema.is_some()
    }

    /// Invoke the handler with the call's argument object
    pub async fn invoke(&self, args: Map<String, Value>) -> McpResult<ToolOutput> {
        (self.handler)(args).await
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
            execution: None,
        }
    }

    fn with_schema(mut tool: Tool) -> Tool {
        tool.output_schema = Some(json!({"type": "object"}));
        tool
    }

    #[test]
    fn test_valid_names_accepted() {
        let longest = "x".repeat(64);
        for name in ["a", "tool-alpha", "Tool_9", longest.as_str()] {
            assert!(
                RegisteredTool::new(echo_tool(name), |_| async { Ok("ok") }).is_ok(),
                "expected {name:?} to register"
            );
        }
    }

    #[test]
    fn test_invalid_names_rejected() {
        let too_long = "x".repeat(65);
        for name in ["", "has space", "has/slash", too_long.as_str(), "ünïcode"] {
            assert!(
                RegisteredTool::new(echo_tool(name), |_| async { Ok("ok") }).is_err(),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_invoke_returns_handler_output() {
        let registered = RegisteredTool::new(echo_tool("echo"), |args| async move {
            let text = args.get("text").and_then(Value::as_str).unwrap_or("").to_string();
            Ok(text)
        })
        .unwrap();

        let mut args = Map::new();
        args.insert("text".into(), json!("hello"));
        let output = registered.invoke(args).await.unwrap();
        let result = normalize_tool_output(output, false);
        assert_eq!(result.content[0].as_text(), Some("hello"));
    }

    #[test]
    fn test_normalize_passthrough() {
        let original = CallToolResult::from_text("done");
        let normalized = normalize_tool_output(ToolOutput::Result(original.clone()), false);
        assert_eq!(normalized, original);
    }

    #[test]
    fn test_normalize_single_content() {
        let normalized =
            normalize_tool_output(ToolOutput::Content(Content::image("aGk=", "image/png")), false);
        assert_eq!(normalized.content.len(), 1);
        assert!(normalized.structured_content.is_none());
    }

    #[test]
    fn test_normalize_mapping_with_schema() {
        let mut map = Map::new();
        map.insert("celsius".into(), json!(21.5));

        let normalized = normalize_tool_output(ToolOutput::Structured(map.clone()), true);
        assert_eq!(
            normalized.structured_content,
            Some(Value::Object(map))
        );
        // Text rendering rides along for clients without structured support.
        assert!(normalized.content[0].as_text().unwrap().contains("21.5"));
    }

    #[test]
    fn test_normalize_mapping_without_schema_renders_text() {
        let mut map = Map::new();
        map.insert("k".into(), json!(1));

        let normalized = normalize_tool_output(ToolOutput::Structured(map), false);
        assert!(normalized.structured_content.is_none());
        assert!(normalized.content[0].as_text().unwrap().contains("\"k\":1"));
    }

    #[test]
    fn test_normalize_sequence() {
        let sequence = vec![Content::text("a"), Content::text("b")];
        let normalized = normalize_tool_output(ToolOutput::Sequence(sequence), false);
        assert_eq!(normalized.content.len(), 2);
    }

    #[test]
    fn test_normalize_raw_value_shapes() {
        // String value → rule 4
        let normalized = normalize_tool_output(ToolOutput::Value(json!("plain")), false);
        assert_eq!(normalized.content[0].as_text(), Some("plain"));

        // Array of content objects → rule 5
        let contents = json!([{"type": "text", "text": "x"}]);
        let normalized = normalize_tool_output(ToolOutput::Value(contents), false);
        assert_eq!(normalized.content[0].as_text(), Some("x"));

        // Anything else → rule 6
        let normalized = normalize_tool_output(ToolOutput::Value(json!(42)), false);
        assert_eq!(normalized.content[0].as_text(), Some("42"));
    }

    #[test]
    fn test_has_output_schema_reflects_definition() {
        let plain = RegisteredTool::new(echo_tool("plain"), |_| async { Ok("x") }).unwrap();
        assert!(!plain.has_output_schema());

        let structured =
            RegisteredTool::new(with_schema(echo_tool("structured")), |_| async { Ok("x") })
                .unwrap();
        assert!(structured.has_output_schema());
    }
}
