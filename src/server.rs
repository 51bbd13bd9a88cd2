//! MCP server exposing the query engine over stdio.

use crate::search::{QueryEngine, ResultSet};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    transport::stdio,
};
use std::fmt::Write as _;

/// Output format for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented text, grouped by label
    #[default]
    Text,
    /// The result set as JSON
    Json,
}

/// Parameters for the search tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Query text; words are matched in order, the first as a key prefix
    pub query: String,
    /// Output format (default: text)
    #[serde(default)]
    pub format: OutputFormat,
}

/// MCP server over one built index
#[derive(Clone)]
pub struct SymdexServer {
    /// Each tool call is an independent search, so concurrent calls never supersede each other
    engine: QueryEngine,

    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for SymdexServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymdexServer")
            .field("engine", &self.engine)
            .finish()
    }
}

#[tool_router]
impl SymdexServer {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    pub const fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    #[tool(
        description = "Search documented symbols by name prefix. Multi-word queries match names containing every word in order. Results are grouped (members and classes first, then groups, pages and files) and list every documented location."
    )]
    async fn search(
        &self,
        Parameters(SearchRequest { query, format }): Parameters<SearchRequest>,
    ) -> std::result::Result<String, String> {
        let result = self.engine.search(&query).await.map_err(|e| e.to_string())?;
        format_result(&result, format)
    }

    #[tool(
        description = "Describe the loaded index: shard count, entry count, group labels and how many shards are cached."
    )]
    async fn index_info(&self) -> std::result::Result<String, String> {
        let store = self.engine.store();
        let manifest = store.manifest();

        let mut out = String::new();
        let _ = writeln!(out, "Shards: {}", manifest.buckets.len());
        let _ = writeln!(out, "Entries: {}", manifest.entry_count());
        let _ = writeln!(out, "Codec: {}", manifest.codec);
        if let Some(build_id) = manifest.build_id {
            let _ = writeln!(out, "Build: {}", build_id);
        }
        if !manifest.groups.is_empty() {
            let _ = writeln!(out, "Groups: {}", manifest.groups.join(", "));
        }
        let _ = writeln!(out, "Cached shards: {}", store.cached_count().await);
        Ok(out)
    }
}

fn format_result(result: &ResultSet, format: OutputFormat) -> std::result::Result<String, String> {
    match format {
        OutputFormat::Text => Ok(result.render()),
        OutputFormat::Json => serde_json::to_string_pretty(result).map_err(|e| e.to_string()),
    }
}

#[tool_handler]
impl ServerHandler for SymdexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(Implementation::from_build_env())
            .with_instructions(
                "symdex: prefix search over a sharded documentation symbol index. \
                 Use search with a name prefix such as 'cl' or several words such as 'name tables'."
                    .to_string(),
            )
    }
}

/// Serves `server` over stdio until the client disconnects.
pub async fn serve(server: SymdexServer) -> anyhow::Result<()> {
    tracing::info!("Starting symdex MCP server");

    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("Error serving MCP server: {:?}", e);
    })?;

    // Wait for the service to complete
    service.waiting().await?;
    Ok(())
}
