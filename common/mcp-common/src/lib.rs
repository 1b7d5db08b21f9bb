//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: `serve_stdio!` for async, fallible server startup
//!   over stdio, and [`init_tracing`] for stderr logging
//! - **Results**: text responses for tool success and failure
//! - **Errors**: protocol error helpers
//!
//! # Example
//!
//! ```rust,ignore
//! // main.rs
//! mcp_common::serve_stdio!(QueryMcpServer::connect, "query_mcp");
//!
//! // in a tool
//! fn my_tool(&self) -> McpResult<CallToolResult> {
//!     Ok(text_success("done"))
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

pub use error::{invalid_params, resource_not_found, McpResult};
pub use init::init_tracing;
pub use result::{text_failure, text_success};

pub use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
