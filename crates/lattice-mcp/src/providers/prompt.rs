//! Registered Prompts
//!
//! A [`RegisteredPrompt`] pairs a [`Prompt`] definition with a generator over
//! the caller's argument map. Generators may return a full message list, a
//! single message, or a bare string (rendered as one user message).

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;

// Layer 3: Internal module imports
use crate::integration::McpResult;
use crate::protocol::{Prompt, PromptMessage};

/// Prompt generator: one async closure over the request's argument map.
pub type PromptGenerator = Arc<
    dyn Fn(HashMap<String, String>) -> BoxFuture<'static, McpResult<PromptOutput>> + Send + Sync,
>;

/// Shapes a prompt generator may produce
#[derive(Debug, Clone)]
pub enum PromptOutput {
    /// Complete message list
    Messages(Vec<PromptMessage>),
    /// Single message
    Message(PromptMessage),
    /// Bare text, rendered as one user message
    Text(String),
}

impl PromptOutput {
    /// Collapse to the wire-level message list
    pub fn into_messages(self) -> Vec<PromptMessage> {
        match self {
            PromptOutput::Messages(messages) => messages,
            PromptOutput::Message(message) => vec![message],
            PromptOutput::Text(text) => vec![PromptMessage::user_text(text)],
        }
    }
}

impl From<Vec<PromptMessage>> for PromptOutput {
    fn from(messages: Vec<PromptMessage>) -> Self {
        PromptOutput::Messages(messages)
    }
}

impl From<PromptMessage> for PromptOutput {
    fn from(message: PromptMessage) -> Self {
        PromptOutput::Message(message)
    }
}

impl From<String> for PromptOutput {
    fn from(text: String) -> Self {
        PromptOutput::Text(text)
    }
}

impl From<&str> for PromptOutput {
    fn from(text: &str) -> Self {
        PromptOutput::Text(text.to_string())
    }
}

/// A prompt definition bound to its generator
#[derive(Clone)]
pub struct RegisteredPrompt {
    prompt: Prompt,
    generator: PromptGenerator,
}

impl RegisteredPrompt {
    /// Register a prompt with its generator
    pub fn new<F, Fut, O>(prompt: Prompt, generator: F) -> Self
    where
        F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<O>> + Send + 'static,
        O: Into<PromptOutput>,
    {
        let generator: PromptGenerator = Arc::new(move |args| {
            let fut = generator(args);
            Box::pin(async move { fut.await.map(Into::into) })
        });
        Self { prompt, generator }
    }

    /// The wire-level prompt definition
    pub fn definition(&self) -> &Prompt {
        &self.prompt
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.prompt.name
    }

    /// Argument names the definition marks required
    pub fn required_arguments(&self) -> impl Iterator<Item = &str> {
        self.prompt
            .arguments
            .iter()
            .filter(|a| a.required.unwrap_or(false))
            .map(|a| a.name.as_str())
    }

    /// Run the generator
    pub async fn generate(&self, args: HashMap<String, String>) -> McpResult<PromptOutput> {
        (self.generator)(args).await
    }
}

impl fmt::Debug for RegisteredPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPrompt")
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}
