//! Query MCP - Read-only SQL access with schema introspection
//!
//! Exposes guarded SELECT execution and schema documents over stdio.

use query_mcp::QueryMcpServer;

mcp_common::serve_stdio!(QueryMcpServer::connect, "query_mcp");
