//! Providers Layer
//!
//! The registration contract consumed by the server: hosts produce
//! registered tools, resources, resource templates, prompts, and completers,
//! each carrying a single boxed async handler. Registration adapters (builder
//! DSLs, macros) live outside this crate; whatever shape they accept, it must
//! collapse to the `(args map) → value` contract defined here before the
//! session ever sees it.

pub mod completion;
pub mod prompt;
pub mod resource;
pub mod tool;
pub mod uri_template;

pub use completion::{Completer, CompletionOutput};
pub use prompt::{PromptOutput, RegisteredPrompt};
pub use resource::{RegisteredResource, RegisteredResourceTemplate};
pub use tool::{normalize_tool_output, RegisteredTool, ToolOutput};
pub use uri_template::UriTemplate;
