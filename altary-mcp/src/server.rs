//! MCP server exposing the Altary tools over stdio.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::io::stdio;
use rmcp::{ErrorData, ServerHandler, ServiceExt};

use crate::error::McpError;
use crate::router::{Router, tools};

const INSTRUCTIONS: &str = "Altary error tracking. Run `setup_auth` once, pick a project with \
`set_default_project`, then use `get_errors` and `complete_error` while fixing bugs.";

/// MCP server over a [`Router`].
///
/// Call [`serve_stdio`](McpServer::serve_stdio) to start serving via stdin/stdout.
pub struct McpServer {
    /// Routes tool calls.
    router: Arc<Router>,
    /// Server name for MCP identification.
    name: String,
    /// Server version for MCP identification.
    version: String,
}

impl McpServer {
    /// Create a server named after this crate.
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serve the tools over stdio (stdin/stdout).
    ///
    /// Returns when the host disconnects.
    ///
    /// # Errors
    ///
    /// [`McpError::Initialization`] if the handshake fails,
    /// [`McpError::Connection`] if serving fails afterwards.
    pub async fn serve_stdio(self) -> Result<(), McpError> {
        let transport = stdio();
        let handler = AltaryHandler {
            router: self.router,
            name: self.name,
            version: self.version,
        };
        let service = handler
            .serve(transport)
            .await
            .map_err(|e| McpError::Initialization(e.to_string()))?;
        tracing::info!("MCP server ready on stdio");
        service
            .waiting()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        tracing::info!("MCP session ended");
        Ok(())
    }
}

/// Internal handler implementing [`ServerHandler`] for the MCP protocol.
struct AltaryHandler {
    router: Arc<Router>,
    name: String,
    version: String,
}

impl ServerHandler for AltaryHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(advertised_tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let input = match request.arguments {
            Some(map) => serde_json::Value::Object(map),
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        let reply = self.router.dispatch(&request.name, input).await;
        let content = vec![Content::text(reply.text)];
        Ok(if reply.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        })
    }
}

fn advertised_tools() -> Vec<McpTool> {
    tools()
        .into_iter()
        .map(|tool| McpTool {
            name: Cow::Borrowed(tool.name),
            title: None,
            description: Some(Cow::Borrowed(tool.description)),
            input_schema: Arc::new(tool.input_schema.as_object().cloned().unwrap_or_default()),
            output_schema: None,
            annotations: None,
            execution: None,
            icons: None,
            meta: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tools_advertised_with_schemas() {
        let advertised = advertised_tools();
        assert_eq!(advertised.len(), 7);
        for tool in &advertised {
            assert_eq!(tool.input_schema.get("type").and_then(|t| t.as_str()), Some("object"));
            assert!(tool.description.is_some());
        }
        assert_eq!(advertised[0].name, "get_user_projects");
    }
}
