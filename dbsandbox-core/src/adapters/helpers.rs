//! Helper utilities shared by the sqlx-backed drivers.
//!
//! The transactional `execute()` loop is identical for MySQL and
//! PostgreSQL; only value decoding and the affected-row count differ and
//! are supplied through [`DriverExt`].

use crate::models::{RowSet, SqlValue, StatementOutcome, StatementResult};
use crate::sql_text::{is_read_statement, split_statements};
use crate::{Dialect, Result, error::SandboxError};
use sqlx::{Column, Connection, Row};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// Extension trait for extracting typed values from database rows
/// with consistent error handling.
pub(crate) trait RowExt: Row {
    /// Extracts a typed field from the row with proper error context.
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, Self::Database> + sqlx::Type<Self::Database>;
}

impl<R> RowExt for R
where
    R: Row,
    for<'a> &'a str: sqlx::ColumnIndex<R>,
{
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, Self::Database> + sqlx::Type<Self::Database>,
    {
        self.try_get(field_name).map_err(|e| {
            let context = match table_context {
                Some(table) => format!("Failed to read column '{field_name}' for table '{table}'"),
                None => format!("Failed to read column '{field_name}'"),
            };
            SandboxError::introspection_failed(context, e)
        })
    }
}

/// Decoding target chosen from a column's type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueClass {
    Bool,
    Signed,
    Unsigned,
    Float32,
    Float64,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    Timestamp,
    Uuid,
    Json,
    /// Decoded through the text-representation fallback
    Other,
}

/// Driver-specific pieces of the shared execute loop.
pub(crate) trait DriverExt: sqlx::Database {
    /// Decodes one cell into a [`SqlValue`].
    fn decode_value(row: &Self::Row, index: usize) -> SqlValue;

    /// Affected-row count of a completed statement.
    fn rows_affected(result: &Self::QueryResult) -> u64;
}

/// Column names of a row.
pub(crate) fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decodes every cell of every row.
pub(crate) fn decode_rows<DB: DriverExt>(rows: &[DB::Row]) -> RowSet {
    let columns = rows.first().map(column_names).unwrap_or_default();
    let mut set = RowSet::new(columns);
    set.rows = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|index| DB::decode_value(row, index))
                .collect()
        })
        .collect();
    set
}

/// Runs a statement batch in one transaction on a single connection.
///
/// Statements go through the simple-query protocol one at a time. The
/// first failure rolls back everything already run in this call and is
/// returned as `Execution`; success commits once at the end.
pub(crate) async fn execute_statements<DB>(
    conn: &mut DB::Connection,
    dialect: Dialect,
    sql: &str,
    want_results: bool,
) -> Result<Vec<StatementResult>>
where
    DB: DriverExt,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    let statements = split_statements(sql, dialect);
    let mut results = Vec::with_capacity(statements.len());
    if statements.is_empty() {
        return Ok(results);
    }

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| SandboxError::execution_failed("BEGIN", e))?;

    for (index, statement) in statements.into_iter().enumerate() {
        let started = Instant::now();
        let outcome = if want_results && is_read_statement(&statement, dialect) {
            raw_fetch_all::<DB>(&statement, &mut *tx)
                .await
                .map(|rows| StatementOutcome::Rows(decode_rows::<DB>(&rows)))
        } else {
            raw_execute::<DB>(&statement, &mut *tx)
                .await
                .map(|done| StatementOutcome::Affected(DB::rows_affected(&done)))
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(outcome) => {
                tracing::debug!(
                    statement = index + 1,
                    rows = outcome_rows(&outcome),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Statement completed"
                );
                results.push(StatementResult {
                    sql: statement,
                    outcome,
                    duration: elapsed,
                });
            }
            Err(e) => {
                tracing::debug!(statement = index + 1, error = %e, "Statement failed, rolling back");
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(error = %rollback_error, "Rollback failed");
                }
                return Err(SandboxError::execution_failed(&statement, e));
            }
        }
    }

    tx.commit()
        .await
        .map_err(|e| SandboxError::execution_failed("COMMIT", e))?;
    Ok(results)
}

/// Boxed, `Send` future wrapping a sqlx executor call.
type ExecFuture<'e, T> = Pin<Box<dyn Future<Output = std::result::Result<T, sqlx::Error>> + Send + 'e>>;

// Non-async wrappers so the executor's associated types are normalized
// outside the `execute_statements` async body.
fn raw_fetch_all<'e, DB>(statement: &'e str, conn: &'e mut DB::Connection) -> ExecFuture<'e, Vec<DB::Row>>
where
    DB: sqlx::Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    sqlx::Executor::fetch_all(conn, sqlx::raw_sql(statement))
}

fn raw_execute<'e, DB>(statement: &'e str, conn: &'e mut DB::Connection) -> ExecFuture<'e, DB::QueryResult>
where
    DB: sqlx::Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    sqlx::Executor::execute(conn, sqlx::raw_sql(statement))
}

fn outcome_rows(outcome: &StatementOutcome) -> u64 {
    match outcome {
        StatementOutcome::Rows(rows) => rows.len() as u64,
        StatementOutcome::Affected(count) => *count,
    }
}
