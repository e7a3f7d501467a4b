//! MySQL session setup.
//!
//! # Security Features
//! - The password goes straight from `Credentials` into the connect options
//! - Read-only sessions for the source side
//! - Execution timeout on every statement
//! - UTC session time zone so TIMESTAMP values copy unchanged

use super::MySqlConnection;
use crate::{ConnectionConfig, Result, error::SandboxError, security::Credentials};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection as RawConnection};
use sqlx::{ConnectOptions, Executor};

/// Builds connect options without ever formatting a URL.
pub(crate) fn connect_options(
    config: &ConnectionConfig,
    credentials: &Credentials,
) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.effective_port())
        .username(credentials.username())
        .database(config.database_name())
        .charset("utf8mb4");
    if let Some(password) = credentials.expose_password() {
        options = options.password(password);
    }
    options.disable_statement_logging()
}

/// Session statements applied right after connecting, in order.
///
/// Profiling statements are not included; they are best-effort and run
/// separately.
pub(crate) fn session_statements(config: &ConnectionConfig) -> Vec<String> {
    let mut statements = vec![
        "SET time_zone = '+00:00'".to_string(),
        format!(
            "SET SESSION max_execution_time = {}",
            config.query_timeout.as_millis()
        ),
    ];
    if config.read_only {
        statements.push("SET SESSION TRANSACTION READ ONLY".to_string());
    }
    statements
}

impl MySqlConnection {
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
            if let Err(e) = conn.execute(statement.as_str()).await {
                // MariaDB has no max_execution_time; the timeout is advisory there
                if statement.contains("max_execution_time") {
                    tracing::warn!(error = %e, "Could not set statement execution timeout");
                    continue;
                }
                return Err(SandboxError::Connection {
                    context: format!("Failed to apply session setting '{statement}'"),
                    source: Box::new(e),
                });
            }
        }

        if self.config.enable_profiling {
            enable_profiling(&mut conn).await;
        }

        tracing::debug!(target_db = %self.config, read_only = self.config.read_only, "MySQL session opened");
        self.conn = Some(conn);
        Ok(())
    }

    /// Closes the session; a second call does nothing.
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            sqlx::Connection::close(conn)
                .await
                .map_err(SandboxError::connection_failed)?;
            tracing::debug!(target_db = %self.config, "MySQL session closed");
        }
        Ok(())
    }
}

/// Turns on query profiling for the session. Failures only warn.
async fn enable_profiling(conn: &mut RawConnection) {
    for statement in ["SET profiling = 1", "SET profiling_history_size = 100"] {
        if let Err(e) = conn.execute(statement).await {
            tracing::warn!(error = %e, statement, "Could not enable MySQL profiling");
            return;
        }
    }
    tracing::debug!("MySQL profiling enabled");
}
