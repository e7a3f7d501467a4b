//! MySQL connection.
//!
//! # Module Structure
//! - `connection`: Connect options and session settings
//! - `introspection`: Existence checks, row counts, `SHOW CREATE TABLE`, object listing
//! - `transfer`: Typed row reads and parameterized batch inserts
//! - `type_mapping`: MySQL value decoding and parameter binding
//!
//! # Security Guarantees
//! - Exactly one server session per connection; no pool
//! - Source sessions run `SET SESSION TRANSACTION READ ONLY`
//! - Passwords never leave `Credentials` except into the driver

mod connection;
mod introspection;
mod transfer;
mod type_mapping;

#[cfg(test)]
mod tests;

use crate::adapters::SqlConnection;
use crate::adapters::helpers::execute_statements;
use crate::models::{SchemaObject, StatementResult, TransferRow, TransferSet};
use crate::security::Credentials;
use crate::{ConnectionConfig, Dialect, Result, error::SandboxError};
use async_trait::async_trait;
use std::collections::HashMap;
use transfer::MySqlColumn;

/// A single MySQL session.
pub struct MySqlConnection {
    config: ConnectionConfig,
    credentials: Credentials,
    conn: Option<sqlx::MySqlConnection>,
    /// Column metadata per table
    columns: HashMap<String, Vec<MySqlColumn>>,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("config", &self.config)
            .field("connected", &self.conn.is_some())
            // Note: credentials are intentionally omitted
            .finish_non_exhaustive()
    }
}

impl MySqlConnection {
    /// Creates an unopened connection.
    pub fn new(config: ConnectionConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            conn: None,
            columns: HashMap::new(),
        }
    }

    fn connection(&mut self) -> Result<&mut sqlx::MySqlConnection> {
        self.conn.as_mut().ok_or(SandboxError::NotConnected)
    }
}

#[async_trait]
impl SqlConnection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connect(&mut self) -> Result<()> {
        self.open().await
    }

    async fn execute(&mut self, sql: &str, want_results: bool) -> Result<Vec<StatementResult>> {
        let conn = self.connection()?;
        execute_statements::<sqlx::MySql>(conn, Dialect::MySql, sql, want_results).await
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.fetch_table_exists(table).await
    }

    async fn row_count(&mut self, table: &str) -> Result<u64> {
        self.fetch_row_count(table).await
    }

    async fn create_table_ddl(&mut self, table: &str) -> Result<String> {
        self.fetch_create_table(table).await
    }

    async fn fetch_rows(&mut self, table: &str, query: &str) -> Result<TransferSet> {
        self.read_rows(table, query).await
    }

    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[TransferRow],
    ) -> Result<u64> {
        self.write_rows(table, columns, rows).await
    }

    async fn list_objects(&mut self) -> Result<Vec<SchemaObject>> {
        self.fetch_objects().await
    }

    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        let statement = format!("SET FOREIGN_KEY_CHECKS = {}", u8::from(enabled));
        self.execute(&statement, false).await.map(|_| ())
    }

    fn forget_metadata(&mut self) {
        self.columns.clear();
    }

    async fn close(&mut self) -> Result<()> {
        self.columns.clear();
        self.shutdown().await
    }
}
