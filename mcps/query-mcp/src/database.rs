//! Database access capability
//!
//! [`Database`] is the only seam between the query core and the driver. The
//! SQLite implementation opens a read-only connection per call, runs the
//! statement on the blocking pool and interrupts it when the deadline passes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{types::Value, Connection, OpenFlags};
use tokio::sync::Semaphore;

use crate::probe::BackendInfo;
use crate::types::{QueryError, RowSet, SqlValue};

/// Per-call execution bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Stop reading after this many rows
    pub max_rows: Option<usize>,
    /// Abort the statement after this long
    pub timeout: Duration,
}

impl FetchLimits {
    pub fn new(max_rows: Option<usize>, timeout: Duration) -> Self {
        Self { max_rows, timeout }
    }
}

/// Query-execution capability shared by the executor and the schema reader
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one statement with positional text parameters
    async fn fetch(
        &self,
        sql: &str,
        params: &[String],
        limits: FetchLimits,
    ) -> Result<RowSet, QueryError>;

    /// Product name and version, used by the startup probe
    async fn backend_info(&self) -> Result<BackendInfo, QueryError>;
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}

/// SQLite file opened read-only
pub struct SqliteDatabase {
    path: PathBuf,
    permits: Semaphore,
}

impl SqliteDatabase {
    /// Point at an existing database file
    ///
    /// `max_connections` bounds how many statements run at once.
    pub fn open(path: impl AsRef<Path>, max_connections: usize) -> Result<Self, QueryError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(QueryError::Config(format!(
                "Database file not found: {}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            permits: Semaphore::new(max_connections.max(1)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, QueryError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn fetch(
        &self,
        sql: &str,
        params: &[String],
        limits: FetchLimits,
    ) -> Result<RowSet, QueryError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| QueryError::Worker(e.to_string()))?;

        let conn = self.connect()?;
        conn.busy_timeout(limits.timeout)?;

        let interrupt = conn.get_interrupt_handle();
        let cancelled = Arc::new(AtomicBool::new(false));

        let sql = sql.to_string();
        let params = params.to_vec();
        let worker_cancelled = Arc::clone(&cancelled);
        let worker = tokio::task::spawn_blocking(move || {
            // The deadline may pass before the blocking pool picks this up
            if worker_cancelled.load(Ordering::SeqCst) {
                return Err(QueryError::Timeout(limits.timeout));
            }
            run_statement(&conn, &sql, &params, limits.max_rows)
        });

        match tokio::time::timeout(limits.timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(QueryError::Worker(join_err.to_string())),
            Err(_elapsed) => {
                cancelled.store(true, Ordering::SeqCst);
                interrupt.interrupt();
                tracing::warn!("Statement interrupted after {:?}", limits.timeout);
                Err(QueryError::Timeout(limits.timeout))
            }
        }
    }

    async fn backend_info(&self) -> Result<BackendInfo, QueryError> {
        let rows = self
            .fetch(
                "SELECT sqlite_version() AS version",
                &[],
                FetchLimits::new(Some(1), Duration::from_secs(5)),
            )
            .await?;

        let version = rows
            .text(0, "version")
            .ok_or_else(|| QueryError::Worker("sqlite_version() returned no rows".into()))?;

        Ok(BackendInfo {
            product: "SQLite".to_string(),
            version,
        })
    }
}

/// Prepare, bind and read up to `max_rows` rows
fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[String],
    max_rows: Option<usize>,
) -> Result<RowSet, QueryError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut cursor = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut rows = Vec::new();

    loop {
        if max_rows.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let Some(row) = cursor.next()? else {
            break;
        };

        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value: Value = row.get(i)?;
            values.push(SqlValue::from(value));
        }
        rows.push(values);
    }

    Ok(RowSet { columns, rows })
}
