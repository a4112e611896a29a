//! Registered Completers
//!
//! Argument-value suggestion callbacks keyed by `prompt:<name>` or
//! `resource:<uri>`. A completer receives the argument being completed, the
//! partial value typed so far, and the request's optional context object; it
//! may return a full [`Completion`] block or a bare value list.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::integration::McpResult;
use crate::protocol::constants::defaults;
use crate::protocol::messages::Completion;

/// Completer callback signature
pub type CompleterFn = Arc<
    dyn Fn(String, String, Option<Value>) -> BoxFuture<'static, McpResult<CompletionOutput>>
        + Send
        + Sync,
>;

/// Shapes a completer may produce
#[derive(Debug, Clone)]
pub enum CompletionOutput {
    /// Full completion block (values, total, hasMore)
    Completion(Completion),
    /// Bare value list; totals are derived
    Values(Vec<String>),
}

impl From<Completion> for CompletionOutput {
    fn from(completion: Completion) -> Self {
        CompletionOutput::Completion(completion)
    }
}

impl From<Vec<String>> for CompletionOutput {
    fn from(values: Vec<String>) -> Self {
        CompletionOutput::Values(values)
    }
}

impl CompletionOutput {
    /// Collapse to the wire-level block, truncating values to the protocol
    /// ceiling of 100.
    pub fn into_completion(self) -> Completion {
        match self {
            CompletionOutput::Completion(mut completion) => {
                if completion.values.len() > defaults::MAX_COMPLETION_VALUES {
                    completion.values.truncate(defaults::MAX_COMPLETION_VALUES);
                    completion.has_more = Some(true);
                }
                completion
            }
            CompletionOutput::Values(values) => {
                let total = values.len();
                let truncated = total > defaults::MAX_COMPLETION_VALUES;
                let mut values = values;
                values.truncate(defaults::MAX_COMPLETION_VALUES);
                Completion {
                    values,
                    total: Some(total as u64),
                    has_more: if truncated { Some(true) } else { None },
                }
            }
        }
    }
}

/// A registered completer
#[derive(Clone)]
pub struct Completer {
    key: String,
    callback: CompleterFn,
}

impl Completer {
    /// Completer for a prompt's arguments, keyed `prompt:<name>`
    pub fn for_prompt<F, Fut, O>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(String, String, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<O>> + Send + 'static,
        O: Into<CompletionOutput>,
    {
        Self::keyed(format!("prompt:{}", name.into()), callback)
    }

    /// Completer for a resource template's variables, keyed `resource:<uri>`
    pub fn for_resource<F, Fut, O>(uri: impl Into<String>, callback: F) -> Self
    where
        F: Fn(String, String, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<O>> + Send + 'static,
        O: Into<CompletionOutput>,
    {
        Self::keyed(format!("resource:{}", uri.into()), callback)
    }

    fn keyed<F, Fut, O>(key: String, callback: F) -> Self
    where
        F: Fn(String, String, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<O>> + Send + 'static,
        O: Into<CompletionOutput>,
    {
        let callback: CompleterFn = Arc::new(move |arg, partial, context| {
            let fut = callback(arg, partial, context);
            Box::pin(async move { fut.await.map(Into::into) })
        });
        Self { key, callback }
    }

    /// Lookup key (`prompt:<name>` or `resource:<uri>`)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the completer
    pub async fn complete(
        &self,
        argument: String,
        partial: String,
        context: Option<Value>,
    ) -> McpResult<CompletionOutput> {
        (self.callback)(argument, partial, context).await
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
