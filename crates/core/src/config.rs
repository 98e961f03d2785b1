//! Persister configuration and environment loading.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::sync::{validate_table_name, TablePolicy};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: u64,
    pub idle_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersisterConfig {
    /// Location of the relational store (connection string, URI, or file path).
    pub database_url: String,
    #[serde(default)]
    pub pool: PoolConfig,
    /// When set, only these tables accept sync writes.
    #[serde(default)]
    pub allowed_tables: Option<Vec<String>>,
}

impl PersisterConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool: PoolConfig::default(),
            allowed_tables: None,
        }
    }

    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    /// Read configuration from process environment variables.
    ///
    /// `DATABASE_URI` (or `DATABASE_URL`) is required. Optional:
    /// `DATABASE_POOL_MAX`, `DATABASE_POOL_MIN`, `DATABASE_CONNECT_TIMEOUT_MS`,
    /// `DATABASE_IDLE_TIMEOUT_MS`, `SYNC_ALLOWED_TABLES` (comma separated).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PersisterConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = value("DATABASE_URI")
            .or_else(|| value("DATABASE_URL"))
            .ok_or_else(|| Error::config("DATABASE_URI is not set"))?;

        let mut pool = PoolConfig::default();
        if let Some(max) = value("DATABASE_POOL_MAX") {
            pool.max_connections = parse_number("DATABASE_POOL_MAX", &max)?;
        }
        if let Some(min) = value("DATABASE_POOL_MIN") {
            pool.min_connections = Some(parse_number("DATABASE_POOL_MIN", &min)?);
        }
        if let Some(timeout) = value("DATABASE_CONNECT_TIMEOUT_MS") {
            pool.connect_timeout_ms = parse_number("DATABASE_CONNECT_TIMEOUT_MS", &timeout)?;
        }
        if let Some(idle) = value("DATABASE_IDLE_TIMEOUT_MS") {
            pool.idle_timeout_ms = Some(parse_number("DATABASE_IDLE_TIMEOUT_MS", &idle)?);
        }

        let allowed_tables = value("SYNC_ALLOWED_TABLES").map(|tables| {
            tables
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        if let Some(tables) = &allowed_tables {
            debug!("Sync writes restricted to tables: {:?}", tables);
        }

        let config = Self {
            database_url,
            pool,
            allowed_tables,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::config("database location is empty"));
        }
        if self.pool.max_connections == 0 {
            return Err(Error::config("pool max_connections must be at least 1"));
        }
        if let Some(min) = self.pool.min_connections {
            if min > self.pool.max_connections {
                return Err(Error::config(format!(
                    "pool min_connections ({}) exceeds max_connections ({})",
                    min, self.pool.max_connections
                )));
            }
        }
        if let Some(tables) = &self.allowed_tables {
            for table in tables {
                validate_table_name(table).map_err(|err| {
                    Error::config(format!("invalid allowed table '{}': {}", table, err))
                })?;
            }
        }
        Ok(())
    }

    pub fn table_policy(&self) -> TablePolicy {
        match &self.allowed_tables {
            Some(tables) => TablePolicy::allow_only(tables.iter().cloned()),
            None => TablePolicy::allow_all(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        Error::config(format!(
            "{} must be a non-negative integer, got '{}'",
            name, raw
        ))
    })
}
