//! Startup backend probe
//!
//! Runs once while the server is being built. The result is an explicit
//! value handed to the executor and the server; nothing here is global.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::database::Database;
use crate::types::QueryError;

/// First SQLite release with common table expressions (`WITH`)
pub const SQLITE_CTE_VERSION: &str = "3.8.3";

/// Clause appended to enforce the server-side row limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSyntax {
    /// `FETCH FIRST n ROWS ONLY`
    FetchFirst,
    /// `LIMIT n`
    Limit,
}

impl LimitSyntax {
    /// Pick the clause a backend understands
    pub fn for_backend(info: &BackendInfo) -> Self {
        if info.product.eq_ignore_ascii_case("sqlite") {
            LimitSyntax::Limit
        } else {
            LimitSyntax::FetchFirst
        }
    }

    pub fn clause(self, rows: usize) -> String {
        match self {
            LimitSyntax::FetchFirst => format!("FETCH FIRST {} ROWS ONLY", rows),
            LimitSyntax::Limit => format!("LIMIT {}", rows),
        }
    }
}

/// What the startup probe learned about the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub product: String,
    pub version: String,
}

impl BackendInfo {
    /// Whether the backend accepts `WITH` queries
    pub fn supports_cte(&self) -> bool {
        !self.product.eq_ignore_ascii_case("sqlite")
            || version_at_least(&self.version, SQLITE_CTE_VERSION)
    }
}

/// Ask the backend for its product and version
pub async fn probe(db: &dyn Database) -> Result<BackendInfo, QueryError> {
    let info = db.backend_info().await?;

    if info.supports_cte() {
        tracing::info!("Connected to {} {}", info.product, info.version);
    } else {
        tracing::warn!(
            "Connected to {} {}; WITH queries need {} or newer and will fail",
            info.product,
            info.version,
            SQLITE_CTE_VERSION
        );
    }

    Ok(info)
}

/// Compare dotted version strings numerically
///
/// Missing components count as zero and non-numeric suffixes on a component
/// are ignored, so `3.45.1` >= `3.8`, and `12.2.0.1` >= `12`.
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    compare_versions(version, minimum) != Ordering::Less
}

fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };

    let (left, right) = (parse(left), parse(right));
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_comparison() {
        assert!(version_at_least("3.45.1", "3.8.3"));
        assert!(version_at_least("3.8.3", "3.8.3"));
        assert!(!version_at_least("3.8.2", "3.8.3"));
        assert!(version_at_least("12.2.0.1.0", "12"));
        assert!(!version_at_least("11.2.0.4", "12"));
        assert!(version_at_least("3.8", "3.8.0"));
        assert!(version_at_least("19c", "12"));
    }

    #[test]
    fn test_limit_syntax_by_product() {
        let sqlite = BackendInfo {
            product: "SQLite".into(),
            version: "3.45.0".into(),
        };
        let other = BackendInfo {
            product: "PostgreSQL".into(),
            version: "16.2".into(),
        };
        assert_eq!(LimitSyntax::for_backend(&sqlite), LimitSyntax::Limit);
        assert_eq!(LimitSyntax::for_backend(&other), LimitSyntax::FetchFirst);
    }

    #[test]
    fn test_limit_clause_text() {
        assert_eq!(LimitSyntax::FetchFirst.clause(5), "FETCH FIRST 5 ROWS ONLY");
        assert_eq!(LimitSyntax::Limit.clause(5), "LIMIT 5");
    }

    #[test]
    fn test_cte_support() {
        let old = BackendInfo {
            product: "SQLite".into(),
            version: "3.7.17".into(),
        };
        assert!(!old.supports_cte());
        let new = BackendInfo {
            product: "SQLite".into(),
            version: "3.46.0".into(),
        };
        assert!(new.supports_cte());
    }
}
