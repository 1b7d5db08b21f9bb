//! Schema metadata reader
//!
//! Read-only catalog queries over the attached SQLite schemas. An "owner" is
//! a schema name as listed by `pragma_database_list` (`main` or an attached
//! database). The `temp` schema and `sqlite_*` tables are never reported.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::database::{Database, FetchLimits};
use crate::types::{QueryError, RowSet};

/// Schemas that are never reported
pub const EXCLUDED_SCHEMAS: &[&str] = &["temp"];

const SYSTEM_TABLE_PREFIX: &str = "sqlite_";

// ============================================================================
// Metadata Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub owner: String,
    pub table_name: String,
    pub comments: Option<String>,
    /// Row count from `sqlite_stat1`, when the database has been analyzed
    pub row_estimate: Option<u64>,
}

impl TableSummary {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.table_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    /// 1-based declared position
    pub position: usize,
    /// 1-based position within the primary key, if part of it
    pub primary_key_position: Option<usize>,
}

impl ColumnInfo {
    /// Declared type, or `ANY` for untyped SQLite columns
    pub fn formatted_type(&self) -> &str {
        if self.data_type.trim().is_empty() {
            "ANY"
        } else {
            &self.data_type
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

impl ConstraintKind {
    pub fn description(self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintInfo {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub delete_rule: Option<String>,
}

/// Everything known about one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDetail {
    pub summary: TableSummary,
    pub columns: Vec<ColumnInfo>,
    pub constraints: Vec<ConstraintInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

/// Tables of one owner, with their columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerTables {
    pub owner: String,
    pub tables: Vec<TableDetail>,
}

// ============================================================================
// Reader
// ============================================================================

/// Read-only catalog access
#[derive(Clone)]
pub struct SchemaReader {
    db: Arc<dyn Database>,
    timeout: Duration,
}

impl SchemaReader {
    pub fn new(db: Arc<dyn Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn fetch(&self, sql: &str, params: &[String]) -> Result<RowSet, QueryError> {
        self.db
            .fetch(sql, params, FetchLimits::new(None, self.timeout))
            .await
    }

    /// Visible schema names, in attach order
    pub async fn owners(&self) -> Result<Vec<String>, QueryError> {
        let set = self
            .fetch("SELECT name FROM pragma_database_list ORDER BY seq", &[])
            .await?;

        Ok((0..set.len())
            .filter_map(|i| set.text(i, "name"))
            .filter(|name| {
                !EXCLUDED_SCHEMAS
                    .iter()
                    .any(|excluded| excluded.eq_ignore_ascii_case(name))
            })
            .collect())
    }

    /// Canonical spelling of a visible owner
    async fn resolve_owner(&self, owner: &str) -> Result<Option<String>, QueryError> {
        Ok(self
            .owners()
            .await?
            .into_iter()
            .find(|o| o.eq_ignore_ascii_case(owner)))
    }

    /// All user tables, ordered by owner then name
    pub async fn list_tables(&self) -> Result<Vec<TableSummary>, QueryError> {
        let mut tables = Vec::new();
        for owner in self.owners().await? {
            let set = self
                .fetch(
                    &format!(
                        "SELECT name FROM {}.sqlite_master WHERE type = 'table' ORDER BY name",
                        quote_ident(&owner)
                    ),
                    &[],
                )
                .await?;
            let estimates = self.row_estimates(&owner).await?;

            for i in 0..set.len() {
                let Some(name) = set.text(i, "name") else {
                    continue;
                };
                if is_system_table(&name) {
                    continue;
                }
                let row_estimate = estimates.get(&name.to_lowercase()).copied();
                tables.push(TableSummary {
                    owner: owner.clone(),
                    table_name: name,
                    comments: None,
                    row_estimate,
                });
            }
        }
        Ok(tables)
    }

    /// Row counts recorded by `ANALYZE`, keyed by lower-cased table name
    async fn row_estimates(&self, owner: &str) -> Result<HashMap<String, u64>, QueryError> {
        let schema = quote_ident(owner);
        let has_stats = self
            .fetch(
                &format!(
                    "SELECT 1 AS present FROM {}.sqlite_master WHERE type = 'table' AND name = 'sqlite_stat1'",
                    schema
                ),
                &[],
            )
            .await?;
        if has_stats.is_empty() {
            return Ok(HashMap::new());
        }

        let set = self
            .fetch(
                &format!(
                    "SELECT tbl, MAX(CAST(stat AS INTEGER)) AS estimate FROM {}.sqlite_stat1 GROUP BY tbl",
                    schema
                ),
                &[],
            )
            .await?;

        Ok((0..set.len())
            .filter_map(|i| {
                let table = set.text(i, "tbl")?;
                let estimate = u64::try_from(set.int(i, "estimate")?).ok()?;
                Some((table.to_lowercase(), estimate))
            })
            .collect())
    }

    /// Columns ordered by declared position
    pub async fn get_columns(&self, owner: &str, table: &str) -> Result<Vec<ColumnInfo>, QueryError> {
        let set = self
            .fetch(
                "SELECT cid, name, type, \"notnull\", dflt_value, pk \
                 FROM pragma_table_info(?1, ?2) ORDER BY cid",
                &[table.to_string(), owner.to_string()],
            )
            .await?;

        Ok((0..set.len())
            .map(|i| {
                let pk = set.int(i, "pk").unwrap_or(0);
                ColumnInfo {
                    column_name: set.text(i, "name").unwrap_or_default(),
                    data_type: set.text(i, "type").unwrap_or_default(),
                    nullable: set.int(i, "notnull").unwrap_or(0) == 0,
                    default_value: set.text(i, "dflt_value"),
                    position: set.int(i, "cid").unwrap_or(i as i64) as usize + 1,
                    primary_key_position: (pk > 0).then_some(pk as usize),
                }
            })
            .collect())
    }

    /// Primary key and unique constraints, primary key first
    pub async fn get_constraints(
        &self,
        owner: &str,
        table: &str,
    ) -> Result<Vec<ConstraintInfo>, QueryError> {
        let mut constraints = Vec::new();

        let primary_key = primary_key_columns(&self.get_columns(owner, table).await?);
        if !primary_key.is_empty() {
            constraints.push(ConstraintInfo {
                name: format!("{}_pkey", table),
                kind: ConstraintKind::PrimaryKey,
                columns: primary_key,
            });
        }

        let indexes = self
            .fetch(
                "SELECT name FROM pragma_index_list(?1, ?2) \
                 WHERE \"unique\" = 1 AND origin = 'u' ORDER BY name",
                &[table.to_string(), owner.to_string()],
            )
            .await?;

        for i in 0..indexes.len() {
            let Some(index) = indexes.text(i, "name") else {
                continue;
            };
            let cols = self
                .fetch(
                    "SELECT name FROM pragma_index_info(?1, ?2) ORDER BY seqno",
                    &[index.clone(), owner.to_string()],
                )
                .await?;
            constraints.push(ConstraintInfo {
                name: index,
                kind: ConstraintKind::Unique,
                columns: (0..cols.len()).filter_map(|c| cols.text(c, "name")).collect(),
            });
        }

        constraints.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(constraints)
    }

    /// Outgoing foreign keys of one table
    pub async fn get_foreign_keys(
        &self,
        owner: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>, QueryError> {
        self.foreign_keys(owner, table, false).await
    }

    /// Every foreign key across visible owners, with owner-qualified names
    pub async fn get_all_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, QueryError> {
        let mut all = Vec::new();
        for table in self.list_tables().await? {
            all.extend(
                self.foreign_keys(&table.owner, &table.table_name, true)
                    .await?,
            );
        }
        Ok(all)
    }

    async fn foreign_keys(
        &self,
        owner: &str,
        table: &str,
        qualify: bool,
    ) -> Result<Vec<ForeignKeyInfo>, QueryError> {
        let set = self
            .fetch(
                "SELECT id, seq, \"table\" AS target, \"from\" AS source, \"to\" AS dest, on_delete \
                 FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq",
                &[table.to_string(), owner.to_string()],
            )
            .await?;

        let qualified = |name: &str| {
            if qualify {
                format!("{}.{}", owner, name)
            } else {
                name.to_string()
            }
        };

        let mut keys: Vec<(i64, ForeignKeyInfo)> = Vec::new();
        for i in 0..set.len() {
            let id = set.int(i, "id").unwrap_or(0);
            let target = set.text(i, "target").unwrap_or_default();
            let source_column = set.text(i, "source").unwrap_or_default();
            let target_column = set.text(i, "dest");

            if keys.last().map(|(last, _)| *last) != Some(id) {
                keys.push((
                    id,
                    ForeignKeyInfo {
                        constraint_name: format!("{}_fk{}", table, id),
                        source_table: qualified(table),
                        source_columns: Vec::new(),
                        target_table: qualified(&target),
                        target_columns: Vec::new(),
                        delete_rule: set.text(i, "on_delete"),
                    },
                ));
            }
            if let Some((_, fk)) = keys.last_mut() {
                fk.source_columns.push(source_column);
                if let Some(column) = target_column {
                    fk.target_columns.push(column);
                }
            }
        }

        // REFERENCES without a column list points at the target's primary key
        let mut resolved = Vec::with_capacity(keys.len());
        for (_, mut fk) in keys {
            if fk.target_columns.is_empty() {
                let target = fk
                    .target_table
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                fk.target_columns = primary_key_columns(&self.get_columns(owner, &target).await?);
            }
            resolved.push(fk);
        }
        Ok(resolved)
    }

    /// Table summary within one owner, `None` if absent
    async fn table_summary(
        &self,
        owner: &str,
        table: &str,
    ) -> Result<Option<TableSummary>, QueryError> {
        let set = self
            .fetch(
                &format!(
                    "SELECT name FROM {}.sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                    quote_ident(owner)
                ),
                &[table.to_string()],
            )
            .await?;

        let Some(name) = set.text(0, "name") else {
            return Ok(None);
        };
        if is_system_table(&name) {
            return Ok(None);
        }

        let row_estimate = self
            .row_estimates(owner)
            .await?
            .get(&name.to_lowercase())
            .copied();

        Ok(Some(TableSummary {
            owner: owner.to_string(),
            table_name: name,
            comments: None,
            row_estimate,
        }))
    }

    /// Full detail for `owner.table`, `None` if it is not visible
    pub async fn get_table_detail(
        &self,
        owner: &str,
        table: &str,
    ) -> Result<Option<TableDetail>, QueryError> {
        let Some(owner) = self.resolve_owner(owner).await? else {
            return Ok(None);
        };
        let Some(summary) = self.table_summary(&owner, table).await? else {
            return Ok(None);
        };

        let name = summary.table_name.clone();
        Ok(Some(TableDetail {
            columns: self.get_columns(&owner, &name).await?,
            constraints: self.get_constraints(&owner, &name).await?,
            foreign_keys: self.get_foreign_keys(&owner, &name).await?,
            summary,
        }))
    }

    /// Full detail for the first owner that has a table with this name
    pub async fn find_table(&self, table: &str) -> Result<Option<TableDetail>, QueryError> {
        for owner in self.owners().await? {
            if let Some(detail) = self.get_table_detail(&owner, table).await? {
                return Ok(Some(detail));
            }
        }
        Ok(None)
    }

    /// Resolve `OWNER.TABLE` or a bare table name
    pub async fn lookup(&self, name: &str) -> Result<Option<TableDetail>, QueryError> {
        match name.split_once('.') {
            Some((owner, table)) => self.get_table_detail(owner, table).await,
            None => self.find_table(name).await,
        }
    }

    /// Every table with its columns, grouped by owner
    pub async fn schema_overview(&self) -> Result<Vec<OwnerTables>, QueryError> {
        let mut overview: Vec<OwnerTables> = Vec::new();
        for summary in self.list_tables().await? {
            let columns = self.get_columns(&summary.owner, &summary.table_name).await?;
            let detail = TableDetail {
                summary,
                columns,
                constraints: Vec::new(),
                foreign_keys: Vec::new(),
            };

            match overview.last_mut() {
                Some(group) if group.owner == detail.summary.owner => group.tables.push(detail),
                _ => overview.push(OwnerTables {
                    owner: detail.summary.owner.clone(),
                    tables: vec![detail],
                }),
            }
        }
        Ok(overview)
    }
}

fn is_system_table(name: &str) -> bool {
    name.to_lowercase().starts_with(SYSTEM_TABLE_PREFIX)
}

fn primary_key_columns(columns: &[ColumnInfo]) -> Vec<String> {
    let mut keyed: Vec<(usize, &str)> = columns
        .iter()
        .filter_map(|c| c.primary_key_position.map(|p| (p, c.column_name.as_str())))
        .collect();
    keyed.sort_by_key(|(position, _)| *position);
    keyed.into_iter().map(|(_, name)| name.to_string()).collect()
}

/// Double-quote an identifier for interpolation into catalog queries
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
