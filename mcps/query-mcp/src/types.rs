//! Type definitions for query MCP

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Values and Rows
// ============================================================================

/// A single scalar as returned by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text view of the value, `None` for NULL
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(f) => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

/// Raw tabular output of a single statement, straight from the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    /// Look up a cell by row index and column label (case-insensitive)
    pub fn value(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.value(row, column).and_then(SqlValue::as_text)
    }

    pub fn int(&self, row: usize, column: &str) -> Option<i64> {
        self.value(row, column).and_then(SqlValue::as_i64)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One materialized result row: column label to value, in column order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub(crate) fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        Self {
            cells: columns.iter().cloned().zip(values).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.cells.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ============================================================================
// Query Results
// ============================================================================

/// Outcome of a guarded query execution
///
/// `truncated` is set when the number of returned rows equals
/// `effective_row_limit`. A result set of exactly that many rows is reported
/// as truncated too; there is no way to tell the two apart without fetching
/// one extra row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub succeeded: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub truncated: bool,
    pub effective_row_limit: usize,
    pub error_message: Option<String>,
}

impl QueryResult {
    pub fn success(columns: Vec<String>, rows: Vec<Row>, effective_row_limit: usize) -> Self {
        let truncated = rows.len() == effective_row_limit;
        Self {
            succeeded: true,
            columns,
            rows,
            truncated,
            effective_row_limit,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            effective_row_limit: 0,
            error_message: Some(message.into()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query worker failed: {0}")]
    Worker(String),

    #[error("Config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_only_when_limit_reached() {
        let columns = vec!["id".to_string()];
        let rows: Vec<Row> = (0..3)
            .map(|i| Row::new(&columns, vec![SqlValue::Integer(i)]))
            .collect();

        let full = QueryResult::success(columns.clone(), rows.clone(), 3);
        assert!(full.truncated);

        let partial = QueryResult::success(columns, rows, 10);
        assert!(!partial.truncated);
        assert_eq!(partial.row_count(), 3);
    }

    #[test]
    fn test_failure_has_no_rows() {
        let result = QueryResult::failure("boom");
        assert!(!result.succeeded);
        assert!(result.columns.is_empty());
        assert!(result.rows.is_empty());
        assert_eq!(result.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_row_keys_follow_columns() {
        let columns = vec!["b".to_string(), "a".to_string()];
        let row = Row::new(&columns, vec![SqlValue::Null, SqlValue::Text("x".into())]);
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&SqlValue::Null));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Blob(vec![1, 2, 3]).to_string(), "<blob 3 bytes>");
        assert_eq!(SqlValue::Null.as_text(), None);
        assert_eq!(SqlValue::Text("42".into()).as_i64(), Some(42));
    }

    #[test]
    fn test_rowset_lookup_is_case_insensitive() {
        let set = RowSet {
            columns: vec!["Name".into()],
            rows: vec![vec![SqlValue::Text("users".into())]],
        };
        assert_eq!(set.text(0, "NAME").as_deref(), Some("users"));
        assert_eq!(set.text(1, "name"), None);
    }
}
