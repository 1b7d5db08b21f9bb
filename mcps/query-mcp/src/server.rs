//! MCP Server implementation for read-only database access
//!
//! Schema introspection and guarded SELECT execution are exposed as tools,
//! schema documents as resources. Handler implementations are in the
//! handlers module.

use std::sync::Arc;

use anyhow::Context;
use mcp_common::{resource_not_found, CallToolResult, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, ListResourcesResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, ResourceContents, ServerCapabilities,
        ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};

use crate::config::{Config, QueryConfig};
use crate::database::{Database, SqliteDatabase};
use crate::executor::{ExecutorSettings, QueryExecutor};
use crate::handlers;
use crate::params::*;
use crate::probe::{self, BackendInfo, LimitSyntax};
use crate::schema::SchemaReader;
use crate::types::QueryError;

/// The Query MCP Server
#[derive(Clone)]
pub struct QueryMcpServer {
    executor: QueryExecutor,
    schema: SchemaReader,
    backend: BackendInfo,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl QueryMcpServer {
    /// Load config from the standard locations and open the database
    pub async fn connect() -> anyhow::Result<Self> {
        let config = Config::load()?;
        Self::with_config(config).await
    }

    /// Open the configured SQLite file and build the server
    pub async fn with_config(config: Config) -> anyhow::Result<Self> {
        let db = SqliteDatabase::open(&config.database.path, config.database.max_connections)
            .with_context(|| {
                format!("Failed to open database {:?}", config.database.path)
            })?;

        let server = Self::with_database(Arc::new(db), &config.query).await?;
        Ok(server)
    }

    /// Build the server over any backend
    ///
    /// Probes the backend once; the result picks the row-limit clause unless
    /// the config pins one.
    pub async fn with_database(
        db: Arc<dyn Database>,
        query: &QueryConfig,
    ) -> Result<Self, QueryError> {
        let backend = probe::probe(db.as_ref()).await?;
        let limit_syntax = query
            .limit_syntax
            .unwrap_or_else(|| LimitSyntax::for_backend(&backend));

        let settings = ExecutorSettings {
            max_rows: query.max_rows,
            timeout: query.timeout(),
            limit_syntax,
        };
        tracing::info!(
            max_rows = settings.max_rows,
            timeout = ?settings.timeout,
            limit_syntax = ?settings.limit_syntax,
            "Query limits configured"
        );

        Ok(Self {
            executor: QueryExecutor::new(db.clone(), settings)?,
            schema: SchemaReader::new(db, query.timeout()),
            backend,
            tool_router: Self::tool_router(),
        })
    }

    pub fn backend(&self) -> &BackendInfo {
        &self.backend
    }

    #[tool(
        name = "list-tables",
        description = "List all accessible tables in the database with row estimates. Use this first to discover available tables."
    )]
    async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        handlers::list_tables(&self.schema).await
    }

    #[tool(
        name = "get-table-schema",
        description = "Get detailed schema of a table: columns with types, nullability and defaults, primary key and unique constraints, and foreign keys."
    )]
    async fn get_table_schema(
        &self,
        Parameters(params): Parameters<TableSchemaParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_table_schema(&self.schema, params).await
    }

    #[tool(
        name = "execute-select",
        description = "Execute a read-only SELECT query and return results as a markdown table. Only single SELECT or WITH statements are allowed. Results are limited to max_rows (default 100, max 1000)."
    )]
    async fn execute_select(
        &self,
        Parameters(params): Parameters<ExecuteSelectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::execute_select(&self.executor, params).await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for QueryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "Read-only database access over {} {}. \
                 Discover tables with list-tables, inspect them with get-table-schema, \
                 then query with execute-select. Only single SELECT or WITH statements \
                 are accepted and every result is row-limited. \
                 Schema documents are available as schema:// resources.",
                self.backend.product, self.backend.version
            )),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = handlers::list_resources(&self.schema)
            .await
            .into_iter()
            .map(|entry| {
                let mut raw = RawResource::new(entry.uri, entry.name);
                raw.description = Some(entry.description);
                raw.mime_type = Some("text/markdown".to_string());
                raw.no_annotation()
            })
            .collect();

        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = handlers::read_resource(&self.schema, &request.uri)
            .await
            .ok_or_else(|| resource_not_found(&request.uri))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
