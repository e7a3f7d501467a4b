//! PostgreSQL session setup.
//!
//! # Security Features
//! - Connect options are built field by field; `.pgpass` and `PG*`
//!   environment variables are ignored so the configuration is the only input
//! - Sets statement_timeout for query safety
//! - `default_transaction_read_only` for the source side

use super::PgConnection;
use crate::{ConnectionConfig, Result, error::SandboxError, security::Credentials};
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Executor};

pub(crate) fn connect_options(
    config: &ConnectionConfig,
    credentials: &Credentials,
) -> PgConnectOptions {
    let mut options = PgConnectOptions::new_without_pgpass()
        .host(&config.host)
        .port(config.effective_port())
        .username(credentials.username())
        .database(config.database_name())
        .application_name(concat!("dbsandbox-", env!("CARGO_PKG_VERSION")));
    if let Some(password) = credentials.expose_password() {
        options = options.password(password);
    }
    options.disable_statement_logging()
}

/// Session statements applied right after connecting, in order.
pub(crate) fn session_statements(config: &ConnectionConfig) -> Vec<String> {
    let mut statements = vec![
        "SET timezone = 'UTC'".to_string(),
        format!(
            "SET statement_timeout = {}",
            config.query_timeout.as_millis()
        ),
        "SET lock_timeout = '30s'".to_string(),
    ];
    if config.read_only {
        statements.push("SET default_transaction_read_only = on".to_string());
    }
    statements
}

impl PgConnection {
    /// Opens the single session, bounded by `connect_timeout`.
    pub(crate) async fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let options = connect_options(&self.config, &self.credentials);
        let mut conn = tokio::time::timeout(self.config.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                SandboxError::connection_timeout(
                    self.config.to_string(),
                    self.config.connect_timeout,
                )
            })?
            .map_err(SandboxError::connection_failed)?;

        for statement in session_statements(&self.config) {
            conn.execute(statement.as_str())
                .await
                .map_err(|e| SandboxError::Connection {
                    context: format!("Failed to apply session setting '{statement}'"),
                    source: Box::new(e),
                })?;
        }

        tracing::debug!(target_db = %self.config, read_only = self.config.read_only, "PostgreSQL session opened");
        self.conn = Some(conn);
        Ok(())
    }

    /// Closes the session; a second call does nothing.
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            sqlx::Connection::close(conn)
                .await
                .map_err(SandboxError::connection_failed)?;
            tracing::debug!(target_db = %self.config, "PostgreSQL session closed");
        }
        Ok(())
    }
}
