//! Streamable HTTP Transport
//!
//! The single-endpoint HTTP carrier: POST for client-to-server messages
//! (with the matching response returned in the POST body), GET for a
//! resumable server-to-client SSE stream, DELETE for session termination.
//! Session ids are minted by the server transport on a successful
//! `initialize` and carried in the `MCP-Session-Id` header thereafter.

pub mod client;
pub mod config;
pub mod server;
pub mod streams;

pub use client::StreamableHttpClient;
pub use config::{HttpAuthConfig, HttpClientConfig, HttpServerConfig};
pub use server::HttpServerTransport;
pub use streams::StreamRegistry;
