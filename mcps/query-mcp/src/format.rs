//! Markdown rendering for query results and schema metadata

use std::fmt::Write;

use crate::schema::{ForeignKeyInfo, OwnerTables, TableDetail, TableSummary};
use crate::types::{QueryResult, SqlValue};

/// Longest cell rendered before truncation
pub const MAX_CELL_CHARS: usize = 100;

/// Make text safe inside a markdown table cell
pub fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ").replace('\r', "")
}

/// Render one cell, truncating long values
pub fn format_cell(value: &SqlValue) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }

    let text = value.to_string();
    let text = if text.chars().count() > MAX_CELL_CHARS {
        let head: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        text
    };
    escape_markdown(&text)
}

/// Compact row counts: 950, 1.2K, 3.4M
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Render a successful query result as a markdown table
pub fn render_query_result(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "Query executed successfully. No rows returned.".to_string();
    }

    let mut out = format!("Query returned {} row(s)", result.row_count());
    if result.truncated {
        let _ = write!(out, " (limited to {})", result.effective_row_limit);
    }
    out.push_str(".\n\n");

    let header: Vec<String> = result.columns.iter().map(|c| escape_markdown(c)).collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(out, "|{}|", vec!["---"; result.columns.len()].join("|"));

    for row in &result.rows {
        let cells: Vec<String> = row.values().map(format_cell).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }

    out
}

/// Tables grouped under their owner
pub fn render_table_list(tables: &[TableSummary]) -> String {
    if tables.is_empty() {
        return "No accessible tables found.".to_string();
    }

    let mut out = format!("Found {} tables:\n\n", tables.len());
    let mut current_owner: Option<&str> = None;

    for table in tables {
        if current_owner != Some(table.owner.as_str()) {
            current_owner = Some(table.owner.as_str());
            let _ = writeln!(out, "## Schema: {}\n", table.owner);
        }

        let _ = write!(out, "- **{}**", table.table_name);
        if let Some(rows) = table.row_estimate {
            let _ = write!(out, " (~{} rows)", format_number(rows));
        }
        if let Some(comments) = non_blank(&table.comments) {
            let _ = write!(out, ": {}", comments);
        }
        out.push('\n');
    }

    out
}

/// Columns, constraints and foreign keys of one table
pub fn render_table_detail(table: &TableDetail) -> String {
    let mut out = format!("# Table: {}\n\n", table.summary.qualified_name());

    if let Some(comments) = non_blank(&table.summary.comments) {
        let _ = writeln!(out, "**Description:** {}\n", comments);
    }
    if let Some(rows) = table.summary.row_estimate {
        let _ = writeln!(out, "**Approximate Rows:** {}\n", format_number(rows));
    }

    out.push_str("## Columns\n\n");
    out.push_str("| # | Column | Type | Nullable | Default | Description |\n");
    out.push_str("|---|--------|------|----------|---------|-------------|\n");
    for col in &table.columns {
        let default = col
            .default_value
            .as_deref()
            .map(|d| escape_markdown(d.trim()))
            .unwrap_or_default();
        let description = match col.primary_key_position {
            Some(_) => "primary key",
            None => "",
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            col.position,
            col.column_name,
            col.formatted_type(),
            yes_no(col.nullable),
            default,
            description
        );
    }

    if !table.constraints.is_empty() {
        out.push_str("\n## Constraints\n\n");
        for constraint in &table.constraints {
            let _ = writeln!(
                out,
                "- **{}** ({}): {}",
                constraint.name,
                constraint.kind.description(),
                constraint.columns.join(", ")
            );
        }
    }

    if !table.foreign_keys.is_empty() {
        out.push_str("\n## Foreign Keys\n\n");
        for fk in &table.foreign_keys {
            let _ = write!(
                out,
                "- **{}**: {} → {}({})",
                fk.constraint_name,
                fk.source_columns.join(", "),
                fk.target_table,
                fk.target_columns.join(", ")
            );
            if let Some(rule) = fk.delete_rule.as_deref() {
                if !rule.eq_ignore_ascii_case("NO ACTION") {
                    let _ = write!(out, " [ON DELETE {}]", rule);
                }
            }
            out.push('\n');
        }
    }

    out
}

/// Every owner with its tables and column lists
pub fn render_overview(owners: &[OwnerTables]) -> String {
    let mut out = String::from("# Database Schema Overview\n\n");
    if owners.is_empty() {
        out.push_str("No accessible schemas or tables found.");
        return out;
    }

    let total: usize = owners.iter().map(|o| o.tables.len()).sum();
    let _ = writeln!(out, "**Total Schemas:** {}", owners.len());
    let _ = writeln!(out, "**Total Tables:** {}\n", total);

    for owner in owners {
        let _ = writeln!(out, "## Schema: {}\n", owner.owner);
        let _ = writeln!(out, "*{} table(s)*\n", owner.tables.len());

        for table in &owner.tables {
            let _ = writeln!(out, "### {}\n", table.summary.table_name);
            if let Some(comments) = non_blank(&table.summary.comments) {
                let _ = writeln!(out, "*{}*\n", comments);
            }
            if table.columns.is_empty() {
                continue;
            }

            out.push_str("| Column | Type | Nullable |\n");
            out.push_str("|--------|------|----------|\n");
            for col in &table.columns {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    col.column_name,
                    col.formatted_type(),
                    yes_no(col.nullable)
                );
            }
            out.push('\n');
        }
    }

    out
}

/// Foreign keys as a table plus a plain-text arrow diagram
pub fn render_relationships(keys: &[ForeignKeyInfo]) -> String {
    let mut out = String::from("# Table Relationships\n\n");
    if keys.is_empty() {
        out.push_str("No foreign key relationships found.");
        return out;
    }

    let _ = writeln!(out, "**Total Foreign Keys:** {}\n", keys.len());
    out.push_str("## Foreign Key Relationships\n\n");
    out.push_str("| Source Table | Source Column(s) | Target Table | Target Column(s) | Delete Rule |\n");
    out.push_str("|--------------|------------------|--------------|------------------|-------------|\n");
    for fk in keys {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            fk.source_table,
            fk.source_columns.join(", "),
            fk.target_table,
            fk.target_columns.join(", "),
            fk.delete_rule.as_deref().unwrap_or("NO ACTION")
        );
    }

    out.push_str("\n## Relationship Diagram (Text)\n\n```\n");
    for fk in keys {
        let _ = writeln!(
            out,
            "{} --[{}]--> {}",
            fk.source_table, fk.constraint_name, fk.target_table
        );
    }
    out.push_str("```\n");

    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}
