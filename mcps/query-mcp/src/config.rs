//! Configuration for Query MCP Server

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::probe::LimitSyntax;

/// Query MCP configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Query limits
    #[serde(default)]
    pub query: QueryConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file (opened read-only)
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Statements allowed to run at once
    /// Default: 4
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_path() -> PathBuf {
    PathBuf::from("database.db")
}

fn default_max_connections() -> usize {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Row and time limits applied to every query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Hard cap on rows returned by a single query
    /// Default: 1000
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Statement timeout in seconds
    /// Default: 30
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Row-limit clause; detected from the backend when unset
    #[serde(default)]
    pub limit_syntax: Option<LimitSyntax>,
}

fn default_max_rows() -> usize {
    1000
}

fn default_timeout() -> u64 {
    30
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            timeout_secs: default_timeout(),
            limit_syntax: None,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides
    ///
    /// Looks for config in:
    /// 1. `QUERY_CONFIG_PATH` environment variable
    /// 2. `~/.binks/query.toml`
    /// 3. `./query-mcp.toml`
    /// 4. `$XDG_CONFIG_HOME/query-mcp/config.toml`
    /// 5. Defaults
    ///
    /// `QUERY_DATABASE_PATH`, `QUERY_MAX_ROWS` and `QUERY_TIMEOUT_SECS`
    /// override the file.
    pub fn load() -> Result<Self> {
        let mut config = match Self::locate()? {
            Some(path) => {
                tracing::info!("Loaded config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("Using default configuration");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn locate() -> Result<Option<PathBuf>> {
        if let Ok(path) = std::env::var("QUERY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            anyhow::ensure!(
                path.exists(),
                "QUERY_CONFIG_PATH={} does not exist",
                path.display()
            );
            return Ok(Some(path));
        }

        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".binks").join("query.toml"));
        }
        candidates.push(PathBuf::from("query-mcp.toml"));
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("query-mcp").join("config.toml"));
        }

        Ok(candidates.into_iter().find(|p| p.exists()))
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply overrides from a variable lookup
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("QUERY_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(rows) = var("QUERY_MAX_ROWS") {
            self.query.max_rows = rows
                .trim()
                .parse()
                .with_context(|| format!("Invalid QUERY_MAX_ROWS: {}", rows))?;
        }
        if let Some(secs) = var("QUERY_TIMEOUT_SECS") {
            self.query.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid QUERY_TIMEOUT_SECS: {}", secs))?;
        }
        Ok(())
    }

    /// Reject limits that would make every query fail
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.query.max_rows > 0, "query.max_rows must be at least 1");
        anyhow::ensure!(self.query.timeout_secs > 0, "query.timeout_secs must be at least 1");
        anyhow::ensure!(
            self.database.max_connections > 0,
            "database.max_connections must be at least 1"
        );
        Ok(())
    }
}
