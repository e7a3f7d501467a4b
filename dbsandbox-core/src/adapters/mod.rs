//! Database connection trait and factory.
//!
//! Every dialect implements [`SqlConnection`]. The provisioner and the
//! gateway only ever see `Box<dyn SqlConnection>`, so the same code drives
//! MySQL, PostgreSQL and the in-memory fakes used in tests.
//!
//! # Module Structure
//! - `helpers`: Row extraction and the transactional execute loop shared by drivers
//! - `mysql`: MySQL driver (feature `mysql`)
//! - `postgres`: PostgreSQL driver (feature `postgresql`)

use crate::models::{SchemaObject, StatementResult, TransferRow, TransferSet};
use crate::security::Credentials;
use crate::{ConnectionConfig, Dialect, Result};
use async_trait::async_trait;

#[cfg(any(feature = "mysql", feature = "postgresql"))]
pub(crate) mod helpers;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgresql")]
pub mod postgres;

pub use crate::error::redact_database_url;

/// One live database session.
///
/// An implementation owns exactly one driver connection, never a pool, so
/// session state such as `FOREIGN_KEY_CHECKS` persists between calls. All
/// operations take `&mut self`; a connection is never used concurrently.
///
/// # Lifecycle
/// `connect()` → any number of operations → `close()`. Operations on a
/// closed connection return [`crate::SandboxError::NotConnected`].
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn SqlConnection>`.
#[async_trait]
pub trait SqlConnection: Send {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Connection configuration (credentials never included).
    fn config(&self) -> &ConnectionConfig;

    /// True between a successful `connect()` and `close()`.
    fn is_connected(&self) -> bool;

    /// Opens the session and applies session settings.
    ///
    /// # Errors
    /// Returns `Connection` or `ConnectionTimeout` errors. There is no retry.
    async fn connect(&mut self) -> Result<()>;

    /// Runs a `;`-separated batch inside one transaction.
    ///
    /// Returns one [`StatementResult`] per statement. Read statements carry
    /// rows only when `want_results` is set; otherwise every statement
    /// reports its affected-row count. Any failure rolls the whole batch
    /// back.
    ///
    /// # Errors
    /// Returns `Execution` naming the failing statement
    async fn execute(&mut self, sql: &str, want_results: bool) -> Result<Vec<StatementResult>>;

    /// Whether a base table with this name exists in the connected schema.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Number of rows in a table.
    ///
    /// # Errors
    /// Returns `Introspection` when the table is absent or unreadable
    async fn row_count(&mut self, table: &str) -> Result<u64>;

    /// A `CREATE TABLE` statement reproducing the table's structure.
    ///
    /// # Errors
    /// Returns `DdlExtraction` when the structure cannot be produced
    async fn create_table_ddl(&mut self, table: &str) -> Result<String>;

    /// Materializes the rows of `query`, a select over `table`.
    ///
    /// # Errors
    /// Returns `SourceRead`
    async fn fetch_rows(&mut self, table: &str, query: &str) -> Result<TransferSet>;

    /// Writes rows into `table` with one parameterized statement.
    ///
    /// Returns the number of rows the server reports as inserted.
    ///
    /// # Errors
    /// Returns `Execution`; callers attach batch context
    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[TransferRow],
    ) -> Result<u64>;

    /// Tables, views and sequences in the connected schema.
    async fn list_objects(&mut self) -> Result<Vec<SchemaObject>>;

    /// Toggles referential checks for this session where the dialect has them.
    async fn set_foreign_key_checks(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// Drops cached per-table metadata so the next lookup reads the catalog.
    fn forget_metadata(&mut self) {}

    /// Post-copy fixups for a table, such as advancing sequences.
    async fn finalize_table(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Closes the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Creates an unopened connection for the configured dialect.
///
/// # Errors
/// Returns an error if the configuration is invalid or the dialect's driver
/// was not compiled in
pub fn create_connection(
    config: ConnectionConfig,
    credentials: Credentials,
) -> Result<Box<dyn SqlConnection>> {
    config.validate()?;

    match config.dialect {
        #[cfg(feature = "mysql")]
        Dialect::MySql => Ok(Box::new(mysql::MySqlConnection::new(config, credentials))),
        #[cfg(not(feature = "mysql"))]
        Dialect::MySql => {
            drop(credentials);
            Err(crate::error::SandboxError::unsupported_feature(
                "MySQL driver",
                "Compile with --features mysql to enable MySQL support",
            ))
        }
        #[cfg(feature = "postgresql")]
        Dialect::Postgres => Ok(Box::new(postgres::PgConnection::new(config, credentials))),
        #[cfg(not(feature = "postgresql"))]
        Dialect::Postgres => {
            drop(credentials);
            Err(crate::error::SandboxError::unsupported_feature(
                "PostgreSQL driver",
                "Compile with --features postgresql to enable PostgreSQL support",
            ))
        }
    }
}

/// Creates and opens a connection.
///
/// # Errors
/// Same as [`create_connection`] plus any `connect()` failure
pub async fn connect(
    config: ConnectionConfig,
    credentials: Credentials,
) -> Result<Box<dyn SqlConnection>> {
    let mut connection = create_connection(config, credentials)?;
    connection.connect().await?;
    Ok(connection)
}
