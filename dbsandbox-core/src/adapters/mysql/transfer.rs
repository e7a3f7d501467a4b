//! Row transfer for MySQL: typed reads and multi-row parameterized inserts.
//!
//! DATE, DATETIME and TIMESTAMP columns are read as text. The binary
//! protocol cannot represent zero dates such as `0000-00-00` as a calendar
//! value, while their text form inserts back unchanged.

use super::MySqlConnection;
use super::type_mapping::{bind_value, value_at};
use crate::adapters::helpers::{DriverExt, column_names};
use crate::models::{SqlValue, TransferRow, TransferSet};
use crate::{Dialect, Result, error::SandboxError};
use sqlx::{Connection, MySql, Row};

/// sql_mode flags that reject zero dates on insert.
const ZERO_DATE_MODES: [&str; 2] = ["NO_ZERO_DATE", "NO_ZERO_IN_DATE"];

/// One column of a MySQL table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MySqlColumn {
    pub name: String,
    /// `INFORMATION_SCHEMA.COLUMNS.DATA_TYPE`, for example `datetime`
    pub data_type: String,
    pub is_generated: bool,
}

impl MySqlColumn {
    /// Whether values are read in their text form.
    pub(crate) fn reads_as_text(&self) -> bool {
        matches!(
            self.data_type.to_ascii_lowercase().as_str(),
            "date" | "datetime" | "timestamp"
        )
    }
}

/// `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `row_count` rows.
pub(crate) fn build_insert_sql(table: &str, columns: &[&str], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| Dialect::MySql.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders.as_str(); row_count].join(", ");
    format!(
        "INSERT INTO {} ({column_list}) VALUES {values}",
        Dialect::MySql.quote_ident(table)
    )
}

/// Wraps `query` so temporal columns come back as text.
///
/// Returns `query` unchanged when no column needs it.
pub(crate) fn build_transfer_query(query: &str, columns: &[MySqlColumn]) -> String {
    if !columns.iter().any(MySqlColumn::reads_as_text) {
        return query.to_string();
    }

    let select_list = columns
        .iter()
        .map(|column| {
            let quoted = Dialect::MySql.quote_ident(&column.name);
            if column.reads_as_text() {
                format!("CAST(t.{quoted} AS CHAR) AS {quoted}")
            } else {
                format!("t.{quoted}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {select_list} FROM ({query}) AS t")
}

/// `mode` without the flags that reject zero dates.
pub(crate) fn relaxed_sql_mode(mode: &str) -> String {
    mode.split(',')
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
        .filter(|flag| !ZERO_DATE_MODES.iter().any(|m| flag.eq_ignore_ascii_case(m)))
        .collect::<Vec<_>>()
        .join(",")
}

impl MySqlConnection {
    /// Runs the select through the binary protocol and decodes every value.
    pub(crate) async fn read_rows(&mut self, table: &str, query: &str) -> Result<TransferSet> {
        let columns = self
            .table_columns(table)
            .await
            .map_err(|e| SandboxError::source_read(table, e))?;
        let sql = build_transfer_query(query, &columns);

        let conn = self.connection()?;
        let rows = sqlx::query(&sql)
            .fetch_all(conn)
            .await
            .map_err(|e| SandboxError::source_read(table, e))?;

        let columns = rows.first().map(column_names).unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| {
                TransferRow::Values(
                    (0..row.columns().len())
                        .map(|index| MySql::decode_value(row, index))
                        .collect(),
                )
            })
            .collect();
        Ok(TransferSet { columns, rows })
    }

    /// Inserts one batch in its own transaction.
    ///
    /// Zero dates are accepted for the duration of the insert; the session's
    /// `sql_mode` is restored afterwards.
    pub(crate) async fn write_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[TransferRow],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let generated: Vec<String> = self
            .table_columns(table)
            .await?
            .into_iter()
            .filter(|column| column.is_generated)
            .map(|column| column.name)
            .collect();
        let kept: Vec<(usize, &str)> = columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !generated.iter().any(|g| g.eq_ignore_ascii_case(name)))
            .map(|(index, name)| (index, name.as_str()))
            .collect();
        let names: Vec<&str> = kept.iter().map(|(_, name)| *name).collect();
        let sql = build_insert_sql(table, &names, rows.len());

        let mut query = sqlx::query(&sql);
        let mut unsupported = 0usize;
        for row in rows {
            let TransferRow::Values(values) = row else {
                return Err(SandboxError::unsupported_feature(
                    "JSON row documents",
                    Dialect::MySql.as_str(),
                ));
            };
            for (index, _) in &kept {
                let value = value_at(values, *index);
                if matches!(value, SqlValue::Unsupported(_)) {
                    unsupported += 1;
                }
                query = bind_value(query, value);
            }
        }
        if unsupported > 0 {
            tracing::warn!(table, values = unsupported, "Undecodable values inserted as NULL");
        }

        let original_mode = self.fetch_sql_mode().await?;
        let relaxed_mode = relaxed_sql_mode(&original_mode);
        let relax = relaxed_mode != original_mode;
        if relax {
            self.set_sql_mode(&relaxed_mode).await?;
        }

        let conn = self.connection()?;
        let inserted = insert_batch(conn, &sql, query).await;
        let restored = if relax {
            self.set_sql_mode(&original_mode).await
        } else {
            Ok(())
        };

        let inserted = inserted?;
        restored?;
        Ok(inserted)
    }

    async fn set_sql_mode(&mut self, mode: &str) -> Result<()> {
        let conn = self.connection()?;
        sqlx::query("SET SESSION sql_mode = ?")
            .bind(mode)
            .execute(conn)
            .await
            .map_err(|e| SandboxError::execution_failed("SET SESSION sql_mode", e))?;
        Ok(())
    }

    /// Column metadata, looked up once per table until the cache is cleared.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<MySqlColumn>> {
        if let Some(cached) = self.columns.get(table) {
            return Ok(cached.clone());
        }
        let columns = self.fetch_columns(table).await?;
        self.columns.insert(table.to_string(), columns.clone());
        Ok(columns)
    }
}

async fn insert_batch<'q>(
    conn: &mut sqlx::MySqlConnection,
    sql: &str,
    query: sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments>,
) -> Result<u64> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| SandboxError::execution_failed("BEGIN", e))?;
    let result = match query.execute(&mut *tx).await {
        Ok(result) => result,
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(error = %rollback_error, "Rollback failed");
            }
            return Err(SandboxError::execution_failed(sql, e));
        }
    };
    tx.commit()
        .await
        .map_err(|e| SandboxError::execution_failed("COMMIT", e))?;

    Ok(result.rows_affected())
}
