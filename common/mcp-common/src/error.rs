//! Protocol error helpers

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// The tool received arguments it cannot act on
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

/// A resource URI that the server does not serve
pub fn resource_not_found(uri: &str) -> McpError {
    McpError::resource_not_found(
        format!("Unknown resource: {}", uri),
        Some(serde_json::json!({ "uri": uri })),
    )
}
