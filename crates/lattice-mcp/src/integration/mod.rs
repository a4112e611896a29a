//! Integration Layer
//!
//! The session core and the high-level peer interfaces built on it:
//!
//! - [`session`]: symmetric dispatcher/correlator both peers run
//! - [`server`]: feature-method dispatch over registered providers
//! - [`client`]: typed operations and server-initiated request hooks
//! - [`tasks`], [`extensions`], [`pagination`]: feature support shared by
//!   the dispatch layer
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use lattice_mcp::integration::McpClientBuilder;
//! use lattice_mcp::transport::StdioTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, inbound) = StdioTransport::new();
//! let client = McpClientBuilder::new()
//!     .client_info("demo-client", "1.0.0")
//!     .connect(Arc::new(transport), inbound)?;
//!
//! let result = client.initialize().await?;
//! println!("connected to {}", result.server_info.name);
//!
//! let tools = client.list_tools(None).await?;
//! println!("{} tools available", tools.tools.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod extensions;
pub mod pagination;
pub mod server;
pub mod session;
pub mod tasks;

pub use client::{ClientHandler, McpClient, McpClientBuilder, McpClientConfig};
pub use error::{McpError, McpResult};
pub use extensions::{Extension, ExtensionRegistry};
pub use server::{McpServer, McpServerBuilder, McpServerConfig};
pub use session::{
    is_cancelled, send_progress, NegotiatedState, RequestDispatcher, Session, SessionConfig,
};
pub use tasks::TaskRegistry;
