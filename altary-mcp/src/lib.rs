#![deny(missing_docs)]
//! MCP server exposing Altary error tracking to coding assistants.
//!
//! - [`Router`] maps tool names and JSON arguments onto the session store,
//!   the remote client and the auth flow, and renders the results.
//! - [`McpServer`] serves the router's tools over stdio.

pub mod error;
pub mod render;
pub mod router;
pub mod server;

pub use error::McpError;
pub use router::{Router, TOOL_NAMES, ToolReply, ToolSpec, tools};
pub use server::McpServer;
