//! Guarded query execution
//!
//! Validates the statement, appends the server-side row limit, runs it with
//! the configured timeout and materializes the rows. Every outcome, including
//! driver failures and timeouts, comes back as a [`QueryResult`].

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::database::{Database, FetchLimits};
use crate::guard::QueryValidator;
use crate::probe::LimitSyntax;
use crate::types::{QueryError, QueryResult, Row};

/// Resolved execution settings, read-only after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Hard cap on rows returned by any query
    pub max_rows: usize,
    /// Per-statement timeout
    pub timeout: Duration,
    /// Clause used when appending the row limit
    pub limit_syntax: LimitSyntax,
}

/// Runs validated, row-limited queries
#[derive(Clone)]
pub struct QueryExecutor {
    validator: QueryValidator,
    limit_keyword: Regex,
    db: Arc<dyn Database>,
    settings: ExecutorSettings,
}

impl QueryExecutor {
    pub fn new(db: Arc<dyn Database>, settings: ExecutorSettings) -> Result<Self, QueryError> {
        let limit_keyword = Regex::new(r"\bLIMIT\b")
            .map_err(|e| QueryError::Config(format!("Invalid limit pattern: {}", e)))?;

        Ok(Self {
            validator: QueryValidator::new()?,
            limit_keyword,
            db,
            settings,
        })
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// Smaller of the requested and configured limits
    pub fn effective_max_rows(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.max_rows)
            .min(self.settings.max_rows)
    }

    /// Append the row-limit clause unless the query already limits itself
    ///
    /// This is a plain textual append. A query whose last clause cannot be
    /// followed by a limit clause will fail at execution time.
    pub fn apply_row_limit(&self, query: &str, max_rows: usize) -> String {
        let upper = query.trim().to_uppercase();

        let has_own_limit = upper.contains("FETCH FIRST")
            || upper.contains("FETCH NEXT")
            || upper.contains("ROWNUM")
            || (self.settings.limit_syntax == LimitSyntax::Limit
                && self.limit_keyword.is_match(&upper));

        if has_own_limit {
            query.to_string()
        } else {
            format!("{} {}", query, self.settings.limit_syntax.clause(max_rows))
        }
    }

    /// Validate and run a query, never failing past this boundary
    pub async fn execute(&self, query: &str, requested_max_rows: Option<usize>) -> QueryResult {
        let normalized = match self.validator.validate(query) {
            Ok(normalized) => normalized,
            Err(rejection) => {
                tracing::info!("Rejected query: {}", rejection);
                return QueryResult::failure(rejection.to_string());
            }
        };

        let max_rows = self.effective_max_rows(requested_max_rows);
        let limited = self.apply_row_limit(&normalized, max_rows);
        tracing::debug!(query = %limited, max_rows, "Executing query");

        let limits = FetchLimits::new(Some(max_rows), self.settings.timeout);
        match self.db.fetch(&limited, &[], limits).await {
            Ok(set) => {
                let columns = unique_columns(set.columns);
                let rows: Vec<Row> = set
                    .rows
                    .into_iter()
                    .map(|values| Row::new(&columns, values))
                    .collect();
                QueryResult::success(columns, rows, max_rows)
            }
            Err(e) => {
                tracing::warn!("Query execution failed: {}", e);
                QueryResult::failure(format!("Query execution failed: {}", e))
            }
        }
    }
}

/// Keep labels as returned, suffixing repeats (`id`, `id_2`, ...)
fn unique_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        let mut candidate = column.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", column, n);
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}
