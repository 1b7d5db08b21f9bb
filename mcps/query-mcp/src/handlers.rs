//! Tool and resource handlers
//!
//! Tools answer with markdown text. Expected failures (rejected queries,
//! driver errors, missing tables) are text too, flagged as errors, so the
//! agent can read the reason and retry.

use mcp_common::{invalid_params, text_failure, text_success, CallToolResult, McpResult};

use crate::executor::QueryExecutor;
use crate::format;
use crate::params::*;
use crate::schema::SchemaReader;

/// Rows returned by `execute-select` when the caller does not ask
pub const DEFAULT_TOOL_ROWS: usize = 100;
/// Largest `max_rows` a caller may request
pub const MAX_TOOL_ROWS: usize = 1000;

pub const OVERVIEW_URI: &str = "schema://overview";
pub const RELATIONSHIPS_URI: &str = "schema://relationships";
pub const TABLE_URI_PREFIX: &str = "schema://table/";

// ============================================================================
// Helper Functions
// ============================================================================

/// Clamp a caller-supplied row count into `1..=MAX_TOOL_ROWS`
pub fn requested_rows(max_rows: Option<i64>) -> usize {
    match max_rows {
        Some(n) => n.clamp(1, MAX_TOOL_ROWS as i64) as usize,
        None => DEFAULT_TOOL_ROWS,
    }
}

// ============================================================================
// Tool Handlers
// ============================================================================

pub async fn execute_select(
    executor: &QueryExecutor,
    params: ExecuteSelectParams,
) -> McpResult<CallToolResult> {
    let max_rows = requested_rows(params.max_rows);
    let result = executor.execute(&params.query, Some(max_rows)).await;

    if !result.succeeded {
        let reason = result.error_message.unwrap_or_default();
        return Ok(text_failure(format!("Query failed: {}", reason)));
    }

    tracing::info!(
        rows = result.row_count(),
        truncated = result.truncated,
        "Query succeeded"
    );
    Ok(text_success(format::render_query_result(&result)))
}

pub async fn list_tables(reader: &SchemaReader) -> McpResult<CallToolResult> {
    match reader.list_tables().await {
        Ok(tables) => Ok(text_success(format::render_table_list(&tables))),
        Err(e) => {
            tracing::warn!("Failed to list tables: {}", e);
            Ok(text_failure(format!("Error listing tables: {}", e)))
        }
    }
}

pub async fn get_table_schema(
    reader: &SchemaReader,
    params: TableSchemaParams,
) -> McpResult<CallToolResult> {
    let name = params.table_name.trim();
    if name.is_empty() {
        return Err(invalid_params("table_name cannot be empty"));
    }

    match reader.lookup(name).await {
        Ok(Some(detail)) => Ok(text_success(format::render_table_detail(&detail))),
        Ok(None) => Ok(text_success(format!(
            "Table '{}' not found or not accessible.",
            name
        ))),
        Err(e) => {
            tracing::warn!("Failed to describe {}: {}", name, e);
            Ok(text_failure(format!("Error getting table schema: {}", e)))
        }
    }
}

// ============================================================================
// Resource Handlers
// ============================================================================

/// A readable resource advertised to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub uri: String,
    pub name: String,
    pub description: String,
}

/// Fixed resources plus one detail resource per visible table
pub async fn list_resources(reader: &SchemaReader) -> Vec<ResourceEntry> {
    let mut entries = vec![
        ResourceEntry {
            uri: OVERVIEW_URI.to_string(),
            name: "Database Schema Overview".to_string(),
            description: "All accessible schemas, tables, and their columns".to_string(),
        },
        ResourceEntry {
            uri: RELATIONSHIPS_URI.to_string(),
            name: "Table Relationships".to_string(),
            description: "All foreign key relationships between tables".to_string(),
        },
    ];

    match reader.list_tables().await {
        Ok(tables) => entries.extend(tables.into_iter().map(|t| {
            let qualified = t.qualified_name();
            ResourceEntry {
                uri: format!("{}{}", TABLE_URI_PREFIX, qualified),
                name: format!("Table Schema: {}", qualified),
                description: "Columns, constraints, and foreign keys".to_string(),
            }
        })),
        Err(e) => tracing::warn!("Listing table resources failed: {}", e),
    }

    entries
}

/// Render a resource by URI, `None` when the URI is not served
pub async fn read_resource(reader: &SchemaReader, uri: &str) -> Option<String> {
    if uri == OVERVIEW_URI {
        return Some(match reader.schema_overview().await {
            Ok(owners) => format::render_overview(&owners),
            Err(e) => format!(
                "# Database Schema Overview\n\nError generating schema overview: {}",
                e
            ),
        });
    }

    if uri == RELATIONSHIPS_URI {
        return Some(match reader.get_all_foreign_keys().await {
            Ok(keys) => format::render_relationships(&keys),
            Err(e) => format!(
                "# Table Relationships\n\nError generating relationships overview: {}",
                e
            ),
        });
    }

    let name = uri.strip_prefix(TABLE_URI_PREFIX)?.trim();
    if name.is_empty() {
        return None;
    }

    Some(match reader.lookup(name).await {
        Ok(Some(detail)) => format::render_table_detail(&detail),
        Ok(None) => format!("# Table: {}\n\nTable not found or not accessible.", name),
        Err(e) => format!("# Table: {}\n\nError generating table schema: {}", name, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteDatabase;
    use crate::executor::ExecutorSettings;
    use crate::probe::LimitSyntax;
    use mcp_common::Content;
    use rusqlite::Connection;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        executor: QueryExecutor,
        reader: SchemaReader,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE big_table (id INTEGER PRIMARY KEY, label TEXT);
             CREATE TABLE owners (id INTEGER PRIMARY KEY, big_id INTEGER REFERENCES big_table(id));
             WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 10)
             INSERT INTO big_table SELECT i, 'row ' || i FROM n;",
        )
        .unwrap();
        drop(conn);

        let db = Arc::new(SqliteDatabase::open(&path, 2).unwrap());
        let executor = QueryExecutor::new(
            db.clone(),
            ExecutorSettings {
                max_rows: 1000,
                timeout: Duration::from_secs(5),
                limit_syntax: LimitSyntax::Limit,
            },
        )
        .unwrap();
        let reader = SchemaReader::new(db, Duration::from_secs(5));

        Fixture {
            _dir: dir,
            executor,
            reader,
        }
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c: &Content| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_requested_rows_clamped() {
        assert_eq!(requested_rows(None), 100);
        assert_eq!(requested_rows(Some(0)), 1);
        assert_eq!(requested_rows(Some(-5)), 1);
        assert_eq!(requested_rows(Some(50)), 50);
        assert_eq!(requested_rows(Some(5000)), 1000);
    }

    #[tokio::test]
    async fn test_execute_select_truncates() {
        let f = fixture();
        let result = execute_select(
            &f.executor,
            ExecuteSelectParams {
                query: "SELECT * FROM big_table ORDER BY id".into(),
                max_rows: Some(5),
            },
        )
        .await
        .unwrap();

        assert!(!result.is_error.unwrap_or(false));
        let text = text_of(&result);
        assert!(text.starts_with("Query returned 5 row(s) (limited to 5)."));
        assert!(text.contains("| id | label |"));
        assert!(text.contains("| 5 | row 5 |"));
        assert!(!text.contains("| 6 | row 6 |"));
    }

    #[tokio::test]
    async fn test_execute_select_rejection_message() {
        let f = fixture();
        let result = execute_select(
            &f.executor,
            ExecuteSelectParams {
                query: "DELETE FROM big_table".into(),
                max_rows: None,
            },
        )
        .await
        .unwrap();

        assert!(result.is_error.unwrap_or(false));
        assert_eq!(
            text_of(&result),
            "Query failed: Query must start with SELECT or WITH"
        );
    }

    #[tokio::test]
    async fn test_execute_select_driver_error() {
        let f = fixture();
        let result = execute_select(
            &f.executor,
            ExecuteSelectParams {
                query: "SELECT * FROM missing_table".into(),
                max_rows: None,
            },
        )
        .await
        .unwrap();

        assert!(result.is_error.unwrap_or(false));
        let text = text_of(&result);
        assert!(text.starts_with("Query failed: Query execution failed"));
        assert!(text.contains("missing_table"));
    }

    #[tokio::test]
    async fn test_execute_select_caller_limit_respected() {
        let f = fixture();
        let result = execute_select(
            &f.executor,
            ExecuteSelectParams {
                query: "SELECT id FROM big_table ORDER BY id LIMIT 3".into(),
                max_rows: Some(50),
            },
        )
        .await
        .unwrap();

        let text = text_of(&result);
        assert!(text.starts_with("Query returned 3 row(s)."));
    }

    #[tokio::test]
    async fn test_list_tables_tool() {
        let f = fixture();
        let text = text_of(&list_tables(&f.reader).await.unwrap());
        assert!(text.starts_with("Found 2 tables:"));
        assert!(text.contains("- **big_table**"));
        assert!(text.contains("- **owners**"));
    }

    #[tokio::test]
    async fn test_get_table_schema_tool() {
        let f = fixture();
        let result = get_table_schema(
            &f.reader,
            TableSchemaParams {
                table_name: "main.owners".into(),
            },
        )
        .await
        .unwrap();
        let text = text_of(&result);
        assert!(text.starts_with("# Table: main.owners"));
        assert!(text.contains("big_id → big_table(id)"));

        let missing = get_table_schema(
            &f.reader,
            TableSchemaParams {
                table_name: "nope".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(text_of(&missing), "Table 'nope' not found or not accessible.");

        let empty = get_table_schema(
            &f.reader,
            TableSchemaParams {
                table_name: "  ".into(),
            },
        )
        .await;
        assert!(empty.is_err());
    }

    #[tokio::test]
    async fn test_resources() {
        let f = fixture();

        let entries = list_resources(&f.reader).await;
        let uris: Vec<_> = entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                OVERVIEW_URI,
                RELATIONSHIPS_URI,
                "schema://table/main.big_table",
                "schema://table/main.owners",
            ]
        );

        let overview = read_resource(&f.reader, OVERVIEW_URI).await.unwrap();
        assert!(overview.contains("**Total Tables:** 2"));

        let relationships = read_resource(&f.reader, RELATIONSHIPS_URI).await.unwrap();
        assert!(relationships.contains("main.owners --[owners_fk0]--> main.big_table"));

        let table = read_resource(&f.reader, "schema://table/big_table").await.unwrap();
        assert!(table.starts_with("# Table: main.big_table"));

        let missing = read_resource(&f.reader, "schema://table/ghost").await.unwrap();
        assert!(missing.contains("Table not found or not accessible."));

        assert!(read_resource(&f.reader, "schema://elsewhere").await.is_none());
        assert!(read_resource(&f.reader, "schema://table/").await.is_none());
    }
}
