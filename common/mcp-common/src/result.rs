//! Result helpers for MCP tool responses
//!
//! Tools that talk to an agent report both outcomes as text. Failures carry
//! `is_error = true` so the client can tell them apart without parsing.

use rmcp::model::{CallToolResult, Content};

/// Successful plain text response
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Failed plain text response
///
/// Use for expected, user-facing failures (rejected input, a query that
/// errored). Protocol-level problems should return an `McpError` instead.
pub fn text_failure(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_success() {
        let result = text_success("hello world");
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_text_failure() {
        let result = text_failure("Query failed: nope");
        assert!(result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }
}
