//! Parameter types for Query MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteSelectParams {
    #[schemars(
        description = "The SELECT query to execute. Only a single SELECT or WITH statement is allowed; INSERT, UPDATE, DELETE and other modifying statements are rejected."
    )]
    pub query: String,

    #[schemars(description = "Maximum number of rows to return (default: 100, max: 1000)")]
    #[serde(default)]
    pub max_rows: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TableSchemaParams {
    #[schemars(
        description = "The table to describe. Either a bare table name or SCHEMA.TABLE_NAME (e.g. 'main.orders')."
    )]
    pub table_name: String,
}
