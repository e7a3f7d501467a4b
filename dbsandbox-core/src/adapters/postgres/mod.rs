//! PostgreSQL connection.
//!
//! # Module Structure
//! - `connection`: Connect options and session settings
//! - `ddl`: `CREATE TABLE` synthesis from `pg_catalog`
//! - `introspection`: Existence checks, row counts, column metadata, object listing
//! - `transfer`: JSON row documents and `json_populate_recordset` inserts
//! - `type_mapping`: Value decoding for statement results
//!
//! # Security Guarantees
//! - Exactly one server session per connection; no pool
//! - Source sessions default every transaction to read-only
//! - Passwords never leave `Credentials` except into the driver

mod connection;
mod ddl;
mod introspection;
mod transfer;
mod type_mapping;


use crate::adapters::SqlConnection;
use crate::adapters::helpers::execute_statements;
use crate::models::{SchemaObject, StatementResult, TransferRow, TransferSet};
use crate::security::Credentials;
use crate::{ConnectionConfig, Dialect, Result, error::SandboxError};
use async_trait::async_trait;
use ddl::PgColumn;
use std::collections::HashMap;

/// A single PostgreSQL session.
pub struct PgConnection {
    config: ConnectionConfig,
    credentials: Credentials,
    conn: Option<sqlx::PgConnection>,
    /// Column metadata per table, looked up once per table
    columns: HashMap<String, Vec<PgColumn>>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("config", &self.config)
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Creates an unopened connection.
    pub fn new(config: ConnectionConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            conn: None,
            columns: HashMap::new(),
        }
    }

    fn connection(&mut self) -> Result<&mut sqlx::PgConnection> {
        self.conn.as_mut().ok_or(SandboxError::NotConnected)
    }
}

#[async_trait]
impl SqlConnection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        execute_statements::<sqlx::Postgres>(conn, Dialect::Postgres, sql, want_results).await
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

    // PostgreSQL has no session-wide switch for referential checks; tables
    // are created without foreign keys, so load order does not matter.

    async fn finalize_table(&mut self, table: &str) -> Result<()> {
        self.advance_sequences(table).await
    }

    fn forget_metadata(&mut self) {
        self.columns.clear();
    }

    async fn close(&mut self) -> Result<()> {
        self.columns.clear();
        self.shutdown().await
    }
}
