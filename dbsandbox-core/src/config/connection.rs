//! Database connection configuration.
//!
//! This module provides the `ConnectionConfig` struct for configuring one
//! side (source or sandbox) of a sandbox session.

use crate::Dialect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one database connection.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
/// Credentials travel separately in [`crate::security::Credentials`].
///
/// # Example
/// ```rust
/// use dbsandbox_core::{ConnectionConfig, Dialect};
///
/// let config = ConnectionConfig::new(Dialect::MySql, "localhost".to_string())
///     .with_port(3306)
///     .with_database("shop".to_string())
///     .with_username("analyst".to_string());
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.to_string(), "mysql://localhost:3306/shop");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// SQL dialect spoken by the server
    pub dialect: Dialect,
    /// Database host address
    pub host: String,
    /// Optional port number (dialect default when absent)
    pub port: Option<u16>,
    /// Database (schema) name
    pub database: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Per-statement execution timeout
    pub query_timeout: Duration,
    /// Whether to open the session read-only
    pub read_only: bool,
    /// Enable MySQL session profiling (`SET profiling = 1`)
    pub enable_profiling: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::MySql,
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(300),
            read_only: true,
            enable_profiling: false,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}{}{}",
            self.dialect,
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{p}")),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{db}"))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a new connection config with safe defaults.
    pub fn new(dialect: Dialect, host: String) -> Self {
        Self {
            dialect,
            host,
            ..Default::default()
        }
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::error::SandboxError::configuration(
                "host cannot be empty",
            ));
        }

        if self.port == Some(0) {
            return Err(crate::error::SandboxError::configuration(
                "port must be greater than 0",
            ));
        }

        match self.database.as_deref() {
            None | Some("") => {
                return Err(crate::error::SandboxError::configuration(format!(
                    "database name is required for {}",
                    self
                )));
            }
            Some(name) if name.len() > 64 => {
                return Err(crate::error::SandboxError::configuration(
                    "database name must be at most 64 characters",
                ));
            }
            Some(_) => {}
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::SandboxError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(crate::error::SandboxError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        if self.enable_profiling && self.dialect != Dialect::MySql {
            return Err(crate::error::SandboxError::unsupported_feature(
                "session profiling",
                self.dialect.as_str(),
            ));
        }

        Ok(())
    }

    /// Port to connect to, falling back to the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    /// Database name, empty when unset.
    pub fn database_name(&self) -> &str {
        self.database.as_deref().unwrap_or_default()
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the statement timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Builder method to toggle read-only sessions.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builder method to toggle MySQL session profiling.
    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.enable_profiling = enabled;
        self
    }
}
