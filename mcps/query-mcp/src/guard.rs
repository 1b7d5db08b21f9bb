//! Query guard - lexical safety layer for ad-hoc SQL
//!
//! Decides whether a raw string is a single read-only statement. The checks
//! are purely lexical: comments are stripped, statement separators counted,
//! the leading keyword checked against an allow list and the whole text
//! scanned against a keyword deny list.
//!
//! The deny-list scan does not know about string literals or identifiers, so
//! `WHERE action = 'DELETE'` is rejected. That over-blocking is intentional;
//! do not replace this with a SQL parser.

use regex::Regex;
use thiserror::Error;

use crate::types::QueryError;

/// Statement-type keywords that imply mutation, DDL, transaction control or
/// privilege changes
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "MERGE", "GRANT",
    "REVOKE", "EXECUTE", "EXEC", "CALL", "COMMIT", "ROLLBACK", "SAVEPOINT", "LOCK", "UNLOCK",
];

/// Reason a query was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Query cannot be empty")]
    Empty,

    #[error("Query cannot be empty after removing comments")]
    EmptyAfterComments,

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Query must start with SELECT or WITH")]
    NotReadOnly,

    #[error("Forbidden keyword detected: {0}")]
    ForbiddenKeyword(String),
}

/// Outcome of validation: the normalized statement, or why it was refused
pub type ValidationOutcome = Result<String, Rejection>;

/// Read-only query validator
#[derive(Debug, Clone)]
pub struct QueryValidator {
    comments: Regex,
    trailing_semicolon: Regex,
    allowed_start: Regex,
    forbidden: Regex,
}

impl QueryValidator {
    pub fn new() -> Result<Self, QueryError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                QueryError::Config(format!("Invalid guard pattern '{}': {}", pattern, e))
            })
        };

        Ok(Self {
            comments: compile(r"(?s)/\*.*?\*/|--[^\r\n]*")?,
            trailing_semicolon: compile(r";\s*$")?,
            allowed_start: compile(r"(?i)^(?:SELECT|WITH)[\s(]")?,
            forbidden: compile(&format!(r"\b(?:{})\b", FORBIDDEN_KEYWORDS.join("|")))?,
        })
    }

    /// Validate a raw query, returning the normalized statement on success
    ///
    /// The normalized statement has comments removed and at most one trailing
    /// semicolon stripped. Validating it again always succeeds.
    pub fn validate(&self, raw: &str) -> ValidationOutcome {
        if raw.trim().is_empty() {
            return Err(Rejection::Empty);
        }

        let cleaned = self.strip_comments(raw);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(Rejection::EmptyAfterComments);
        }

        let statements = cleaned
            .split(';')
            .filter(|segment| !segment.trim().is_empty())
            .count();
        if statements > 1 {
            return Err(Rejection::MultipleStatements);
        }

        let cleaned = self.trailing_semicolon.replace(cleaned, "");
        let cleaned = cleaned.trim();

        if !self.allowed_start.is_match(cleaned) {
            return Err(Rejection::NotReadOnly);
        }

        let upper = cleaned.to_uppercase();
        if let Some(hit) = self.forbidden.find(&upper) {
            return Err(Rejection::ForbiddenKeyword(hit.as_str().to_string()));
        }

        Ok(cleaned.to_string())
    }

    /// Replace every block and line comment with a single space
    fn strip_comments(&self, query: &str) -> String {
        self.comments.replace_all(query, " ").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::new().unwrap()
    }

    fn assert_accepted(query: &str) {
        let result = validator().validate(query);
        assert!(result.is_ok(), "expected {:?} to be accepted: {:?}", query, result);
    }

    fn assert_rejected(query: &str) -> Rejection {
        match validator().validate(query) {
            Ok(normalized) => panic!("expected {:?} to be rejected, got {:?}", query, normalized),
            Err(reason) => reason,
        }
    }

    #[test]
    fn test_simple_select_is_unchanged() {
        let normalized = validator().validate("SELECT * FROM employees").unwrap();
        assert_eq!(normalized, "SELECT * FROM employees");
    }

    #[test]
    fn test_read_only_shapes_accepted() {
        assert_accepted("SELECT id, name FROM users WHERE status = 'active'");
        assert_accepted(
            "SELECT e.name, d.department_name FROM employees e JOIN departments d ON e.dept_id = d.id",
        );
        assert_accepted(
            "SELECT * FROM employees WHERE dept_id IN (SELECT id FROM departments WHERE active = 1)",
        );
        assert_accepted(
            "WITH active_employees AS (SELECT * FROM employees WHERE status = 'active') \
             SELECT * FROM active_employees",
        );
        assert_accepted("SELECT dept_id, COUNT(*) as cnt FROM employees GROUP BY dept_id HAVING COUNT(*) > 5");
        assert_accepted("SELECT * FROM employees ORDER BY hire_date DESC FETCH FIRST 10 ROWS ONLY");
        assert_accepted("SELECT * FROM (SELECT id FROM employees) t");
        assert_accepted("SELECT(1)");
        assert_accepted("SELECT\n*\nFROM employees");
    }

    #[test]
    fn test_case_insensitive_prefix() {
        assert_accepted("select * from employees");
        assert_accepted("SeLeCt * FrOm employees");
        assert_accepted("with x as (select 1) select * from x");
    }

    #[test]
    fn test_trailing_semicolon_tolerated_and_stripped() {
        let normalized = validator().validate("SELECT * FROM employees;  ").unwrap();
        assert_eq!(normalized, "SELECT * FROM employees");
    }

    #[test]
    fn test_forbidden_statements_rejected() {
        let queries = [
            "INSERT INTO employees (name) VALUES ('test')",
            "UPDATE employees SET name = 'test'",
            "DELETE FROM employees",
            "DROP TABLE employees",
            "CREATE TABLE test (id INT)",
            "ALTER TABLE employees ADD COLUMN email VARCHAR(100)",
            "TRUNCATE TABLE employees",
            "MERGE INTO employees USING temp ON (1=1) WHEN MATCHED THEN UPDATE SET name='x'",
            "GRANT SELECT ON employees TO user1",
            "REVOKE SELECT ON employees FROM user1",
            "EXECUTE my_procedure",
            "EXEC my_procedure",
            "CALL my_procedure()",
            "COMMIT",
            "ROLLBACK",
            "SAVEPOINT sp1",
            "LOCK TABLE employees IN EXCLUSIVE MODE",
            "insert into employees (name) values ('test')",
            "UpDaTe employees SET name = 'test'",
        ];
        for query in queries {
            assert_rejected(query);
        }
    }

    #[test]
    fn test_forbidden_keyword_inside_select_named() {
        let reason = assert_rejected("SELECT * FROM employees UNION DELETE FROM employees");
        assert_eq!(reason, Rejection::ForbiddenKeyword("DELETE".into()));
        assert!(reason.to_string().contains("DELETE"));

        let reason = assert_rejected("SELECT * FROM (DELETE FROM employees RETURNING *)");
        assert!(reason.to_string().contains("DELETE"));

        let reason = assert_rejected("select * from t where x = 1 for update");
        assert_eq!(reason, Rejection::ForbiddenKeyword("UPDATE".into()));
    }

    #[test]
    fn test_keyword_in_string_literal_still_rejected() {
        let reason = assert_rejected("SELECT * FROM audit WHERE action = 'DELETE'");
        assert_eq!(reason, Rejection::ForbiddenKeyword("DELETE".into()));
    }

    #[test]
    fn test_word_boundaries_respected() {
        assert_accepted("SELECT update_count FROM statistics");
        assert_accepted("SELECT created_at, deleted_flag, locker FROM t");
        assert_accepted("SELECT executed FROM calls_log");
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let reason = assert_rejected("SELECT * FROM employees; DROP TABLE employees");
        assert_eq!(reason, Rejection::MultipleStatements);
        assert!(reason.to_string().contains("Multiple statements"));

        assert_rejected("SELECT 1; SELECT 2");
    }

    #[test]
    fn test_comments_stripped_before_checks() {
        assert_accepted("SELECT * FROM t -- DROP TABLE t");
        assert_accepted("SELECT * FROM employees /* ; DELETE FROM employees */");
        assert_accepted("SELECT * FROM employees -- ; DELETE FROM employees");
        assert_accepted("SELECT /* this is\na multiline\ncomment */ * FROM employees");
        assert_accepted("SELECT /* block */ * -- line\nFROM employees");
    }

    #[test]
    fn test_comment_keeps_word_boundary() {
        let normalized = validator().validate("SELECT/**/id FROM t").unwrap();
        assert_eq!(normalized, "SELECT id FROM t");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(assert_rejected(""), Rejection::Empty);
        assert_eq!(assert_rejected("   \t\n  "), Rejection::Empty);

        let reason = assert_rejected("/* just a comment */");
        assert_eq!(reason, Rejection::EmptyAfterComments);
        assert!(reason.to_string().contains("empty"));

        assert_eq!(assert_rejected("-- a\n/* b */ -- c"), Rejection::EmptyAfterComments);
    }

    #[test]
    fn test_must_start_with_select_or_with() {
        let reason = assert_rejected("SHOW TABLES");
        assert!(reason.to_string().contains("SELECT"));

        assert_eq!(assert_rejected("(SELECT * FROM employees)"), Rejection::NotReadOnly);
        assert_eq!(assert_rejected("SELECTOR FROM t"), Rejection::NotReadOnly);
        assert_eq!(assert_rejected("WITHOUT x"), Rejection::NotReadOnly);
        assert_eq!(assert_rejected("EXPLAIN SELECT 1"), Rejection::NotReadOnly);
    }

    #[test]
    fn test_normalization_is_fixed_point() {
        let guard = validator();
        let inputs = [
            "SELECT * FROM employees;",
            "  select /* c */ a -- tail\n from b ; ",
            "WITH x AS (SELECT 1) SELECT * FROM x;;",
            "SELECT 'a;' FROM t",
        ];
        for input in inputs {
            if let Ok(normalized) = guard.validate(input) {
                let again = guard.validate(&normalized);
                assert!(again.is_ok(), "{:?} -> {:?} -> {:?}", input, normalized, again);
            }
        }
    }
}
