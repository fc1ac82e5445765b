//! Configuration for the PostgreSQL MCP server
//!
//! Every setting has a default and can be overridden by an environment
//! variable of the same name (`pg_host`) or its uppercase form (`PG_HOST`).
//! A `.env` file, if present, seeds the environment before it is read;
//! variables already set in the process win over the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be an integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("failed to load environment file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Connection and server settings, immutable once loaded
#[derive(Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// PostgreSQL host
    pub pg_host: String,
    /// PostgreSQL port
    pub pg_port: u16,
    /// Role to connect as
    pub pg_user: String,
    /// Password for `pg_user`
    pub pg_password: String,
    /// Database name
    pub pg_db: String,
    /// Seconds to wait for a connection to be established; 0 waits forever
    pub pg_connect_timeout: u64,
    /// Address the HTTP transport binds to
    pub mcp_host: String,
    /// Port the HTTP transport binds to
    pub mcp_port: u16,
    /// Path the MCP endpoint is mounted under
    pub mcp_path: String,
    /// Directory for the rolling log file
    pub log_dir: PathBuf,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            pg_host: "localhost".to_string(),
            pg_port: 5432,
            pg_user: "postgres".to_string(),
            pg_password: "123456".to_string(),
            pg_db: "test_db".to_string(),
            pg_connect_timeout: 10,
            mcp_host: "0.0.0.0".to_string(),
            mcp_port: 8000,
            mcp_path: "/mcp".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("pg_host", &self.pg_host)
            .field("pg_port", &self.pg_port)
            .field("pg_user", &self.pg_user)
            .field("pg_password", &"<redacted>")
            .field("pg_db", &self.pg_db)
            .field("pg_connect_timeout", &self.pg_connect_timeout)
            .field("mcp_host", &self.mcp_host)
            .field("mcp_port", &self.mcp_port)
            .field("mcp_path", &self.mcp_path)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}

impl PgConfig {
    /// Load `env_file` (ignored when missing), then read the environment
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        match dotenvy::from_path(env_file) {
            Ok(()) => tracing::debug!("Loaded environment file {:?}", env_file),
            Err(e) if e.not_found() => {}
            Err(source) => {
                return Err(ConfigError::EnvFile {
                    path: env_file.to_path_buf(),
                    source,
                })
            }
        }

        Self::from_env()
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).or_else(|| lookup(&key.to_uppercase()));
        let mut config = Self::default();

        if let Some(v) = get("pg_host") {
            config.pg_host = v;
        }
        if let Some(v) = get("pg_port") {
            config.pg_port = parse_number("pg_port", v)?;
        }
        if let Some(v) = get("pg_user") {
            config.pg_user = v;
        }
        if let Some(v) = get("pg_password") {
            config.pg_password = v;
        }
        if let Some(v) = get("pg_db") {
            config.pg_db = v;
        }
        if let Some(v) = get("pg_connect_timeout") {
            config.pg_connect_timeout = parse_number("pg_connect_timeout", v)?;
        }
        if let Some(v) = get("mcp_host") {
            config.mcp_host = v;
        }
        if let Some(v) = get("mcp_port") {
            config.mcp_port = parse_number("mcp_port", v)?;
        }
        if let Some(v) = get("mcp_path") {
            config.mcp_path = v;
        }
        if let Some(v) = get("log_dir") {
            config.log_dir = PathBuf::from(v);
        }

        Ok(config)
    }

    /// `host:port` for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.mcp_host, self.mcp_port)
    }

    /// Driver-level connection parameters
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.pg_host)
            .port(self.pg_port)
            .user(&self.pg_user)
            .password(&self.pg_password)
            .dbname(&self.pg_db)
            .application_name("pg-mcp");
        if self.pg_connect_timeout > 0 {
            config.connect_timeout(Duration::from_secs(self.pg_connect_timeout));
        }
        config
    }
}
