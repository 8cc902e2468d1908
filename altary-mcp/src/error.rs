//! Errors from running the MCP server.

/// Errors from serving the MCP protocol.
///
/// Tool failures never surface here; they are rendered into error replies.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The MCP initialization handshake failed.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// The connection to the host broke while serving.
    #[error("connection failed: {0}")]
    Connection(String),
}
