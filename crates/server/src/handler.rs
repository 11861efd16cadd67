//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    Shell,
    agent::{AgentFetchParams, activate_impl, fetch_impl, install_impl, status_impl},
    cache::{CacheGetParams, CacheListParams, CachePurgeParams, get_impl, list_impl, purge_impl},
    shell::{ShellBackParams, ShellNavigateParams, ShellOpenParams, back_impl, navigate_impl, open_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use toolshell_client::CacheAgent;

/// The main MCP server handler for toolshell.
#[derive(Clone)]
pub struct ToolshellServer {
    tool_router: ToolRouter<Self>,
    agent: Arc<CacheAgent>,
    shell: Arc<Shell>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ToolshellServer {
    /// Create a new server handler around one agent and one shell session.
    pub fn new(agent: Arc<CacheAgent>, shell: Arc<Shell>) -> Self {
        Self { tool_router: Self::tool_router(), agent, shell }
    }

    #[tool(description = "Install the configured cache generation from its manifest. All or nothing.")]
    async fn agent_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.agent).await
    }

    #[tool(description = "Activate the installed generation, deleting every other generation.")]
    async fn agent_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.agent).await
    }

    #[tool(description = "Report the agent lifecycle state, the active generation and its entry count.")]
    async fn agent_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.agent).await
    }

    /// Fetch through the agent's interception policy.
    ///
    /// Navigations are network first with cache and offline-page fallback;
    /// everything else is stale-while-revalidate.
    #[tool(
        description = "Fetch a URL through the cache agent. Returns status, source (network, cache, fallback), headers and body."
    )]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    #[tool(description = "Look up a stored response by method and URL in the active or a named generation.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.agent, params.0).await
    }

    #[tool(description = "List cache generations and the entries of the active or a named generation.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.agent, params.0).await
    }

    #[tool(description = "Delete a cache generation, or a single entry within it.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.agent, params.0).await
    }

    #[tool(description = "Load a page in the headless shell as a full navigation. Resets navigation state.")]
    async fn shell_open(&self, params: Parameters<ShellOpenParams>) -> Result<CallToolResult, McpError> {
        open_impl(&self.agent, &self.shell, params.0).await
    }

    /// Click a link in the headless shell.
    ///
    /// Same-origin links swap the content region in place; anything else is
    /// reported as passthrough.
    #[tool(description = "Click a link in the headless shell. Returns the resulting page view and outcome.")]
    async fn shell_navigate(&self, params: Parameters<ShellNavigateParams>) -> Result<CallToolResult, McpError> {
        navigate_impl(&self.agent, &self.shell, params.0).await
    }

    #[tool(description = "Go back one history entry in the headless shell, restoring its scroll offset.")]
    async fn shell_back(&self, params: Parameters<ShellBackParams>) -> Result<CallToolResult, McpError> {
        back_impl(&self.agent, &self.shell, params.0).await
    }
}

impl ServerHandler for ToolshellServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "toolshell".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::harness;

    #[tokio::test]
    async fn test_lists_every_tool() {
        let h = harness().await;
        let server = ToolshellServer::new(h.agent, h.shell);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "agent_activate",
                "agent_fetch",
                "agent_install",
                "agent_status",
                "cache_get",
                "cache_list",
                "cache_purge",
                "shell_back",
                "shell_navigate",
                "shell_open",
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let h = harness().await;
        let server = ToolshellServer::new(h.agent, h.shell);
        assert_eq!(server.get_info().server_info.name, "toolshell");
    }
}
