//! Query MCP Library
//!
//! Read-only database access for agents. Queries are checked lexically
//! before they reach the database, row-limited and time-limited; schema
//! metadata is rendered as markdown.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use query_mcp::QueryMcpServer;
//!
//! let server = QueryMcpServer::connect().await?;
//! // Use with in-memory transport or serve via stdio
//! ```

pub mod config;
pub mod database;
pub mod executor;
pub mod format;
pub mod guard;
pub mod handlers;
pub mod params;
pub mod probe;
pub mod schema;
pub mod server;
pub mod types;

// Re-export main server type
pub use server::QueryMcpServer;

// Re-export parameter types for direct API usage
pub use params::*;
