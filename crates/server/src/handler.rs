//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{CachePurgeParams, CachePutParams, CacheStatsParams, purge_impl, put_impl, stats_impl};
use crate::tools::load::{UrlLoadParams, load_impl};
use crate::tools::queue::{QueueParams, queue_impl};

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
use urlvault_core::UrlCache;

/// The main MCP server handler for urlvault.
#[derive(Clone)]
pub struct UrlVaultServer {
    cache: UrlCache,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl UrlVaultServer {
    /// Create a new server handler over `cache`.
    pub fn new(cache: UrlCache) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    /// Load a URL through the disk cache.
    ///
    /// Concurrent loads of the same URL and retention class share one fetch.
    #[tool(
        description = "Load a URL through the disk cache. Returns size, SHA-256 and text (when UTF-8). Set use_cache=false to force a refetch."
    )]
    async fn url_load(&self, params: Parameters<UrlLoadParams>) -> Result<CallToolResult, McpError> {
        load_impl(&self.cache, params.0).await
    }

    #[tool(description = "Store text in the cache under a URL without fetching it.")]
    async fn url_cache_put(&self, params: Parameters<CachePutParams>) -> Result<CallToolResult, McpError> {
        put_impl(&self.cache, params.0).await
    }

    #[tool(description = "Delete every cached entry of one retention class (session or permanent).")]
    async fn url_cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }

    #[tool(description = "Entry counts and byte totals per retention class.")]
    async fn url_cache_stats(&self, params: Parameters<CacheStatsParams>) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache, params.0).await
    }

    #[tool(description = "Suspend or resume the cache work queue. Work submitted while suspended waits for resume.")]
    async fn url_queue(&self, params: Parameters<QueueParams>) -> Result<CallToolResult, McpError> {
        queue_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for UrlVaultServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "urlvault".into(),
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
    use crate::tools::test_util::cache;

    #[tokio::test]
    async fn test_lists_all_tools() {
        let dir = tempfile::tempdir().unwrap();
        let server = UrlVaultServer::new(cache(&dir).await);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, ["url_cache_purge", "url_cache_put", "url_cache_stats", "url_load", "url_queue"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let dir = tempfile::tempdir().unwrap();
        let server = UrlVaultServer::new(cache(&dir).await);

        let info = server.get_info();
        assert_eq!(info.server_info.name, "urlvault");
        assert!(info.capabilities.tools.is_some());
    }
}
