//! Row transfer for PostgreSQL.
//!
//! Rows leave the source as `row_to_json` documents and enter the sandbox
//! through `json_populate_recordset`, so every column type PostgreSQL can
//! render as JSON round-trips without a Rust-side decoder. The payload stays
//! `json` rather than `jsonb`: `json` columns keep their key order,
//! whitespace and duplicate keys. One batch binds a single parameter
//! regardless of its width.

use super::PgConnection;
use crate::models::{TransferRow, TransferSet};
use crate::{Dialect, Result, error::SandboxError};
use sqlx::Connection;

/// Wraps a select so each row comes back as one JSON text column.
pub(crate) fn build_document_query(query: &str) -> String {
    format!("SELECT row_to_json(t.*)::text AS row_data FROM ({query}) AS t")
}

/// `INSERT INTO t (a, b) SELECT a, b FROM json_populate_recordset(NULL::t, $1::json)`.
pub(crate) fn build_insert_sql(table: &str, columns: &[&str]) -> String {
    let quoted_table = Dialect::Postgres.quote_ident(table);
    let column_list = columns
        .iter()
        .map(|c| Dialect::Postgres.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {quoted_table} ({column_list}) SELECT {column_list} \
         FROM json_populate_recordset(NULL::{quoted_table}, $1::json)"
    )
}

/// Joins row documents into one JSON array.
pub(crate) fn documents_payload<'a>(documents: impl Iterator<Item = &'a str>) -> String {
    let mut payload = String::from("[");
    for (index, document) in documents.enumerate() {
        if index > 0 {
            payload.push(',');
        }
        payload.push_str(document);
    }
    payload.push(']');
    payload
}

impl PgConnection {
    pub(crate) async fn read_rows(&mut self, table: &str, query: &str) -> Result<TransferSet> {
        let columns = self
            .table_columns(table)
            .await
            .map_err(|e| SandboxError::source_read(table, e))?
            .into_iter()
            .map(|column| column.name)
            .collect();

        let sql = build_document_query(query);
        let conn = self.connection()?;
        let documents: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(conn)
            .await
            .map_err(|e| SandboxError::source_read(table, e))?;

        Ok(TransferSet {
            columns,
            rows: documents.into_iter().map(TransferRow::Document).collect(),
        })
    }

    /// Inserts one batch in its own transaction.
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
            .filter(|column| column.is_generated())
            .map(|column| column.name)
            .collect();
        let names: Vec<&str> = columns
            .iter()
            .map(String::as_str)
            .filter(|name| !generated.iter().any(|g| g == name))
            .collect();
        let sql = build_insert_sql(table, &names);

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let TransferRow::Document(document) = row else {
                return Err(SandboxError::unsupported_feature(
                    "positional row values",
                    Dialect::Postgres.as_str(),
                ));
            };
            documents.push(document.as_str());
        }
        let payload = documents_payload(documents.into_iter());

        let conn = self.connection()?;
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| SandboxError::execution_failed("BEGIN", e))?;
        let result = match sqlx::query(&sql).bind(payload).execute(&mut *tx).await {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(error = %rollback_error, "Rollback failed");
                }
                return Err(SandboxError::execution_failed(&sql, e));
            }
        };
        tx.commit()
            .await
            .map_err(|e| SandboxError::execution_failed("COMMIT", e))?;

        Ok(result.rows_affected())
    }
}
