//! Table metadata for PostgreSQL, scoped to `current_schema()`.

use super::PgConnection;
use super::ddl::{
    COLUMNS_QUERY, PRIMARY_KEY_QUERY, PgColumn, SequenceFixup, build_create_table,
    sequence_fixups, setval_sql,
};
use crate::adapters::helpers::RowExt;
use crate::models::{ObjectKind, SchemaObject};
use crate::{Dialect, Result, error::SandboxError};
use sqlx::postgres::PgRow;

impl PgConnection {
    pub(crate) async fn fetch_table_exists(&mut self, table: &str) -> Result<bool> {
        let conn = self.connection()?;
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                  AND table_name = $1
                  AND table_type = 'BASE TABLE'
            )
            "#,
        )
        .bind(table)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            SandboxError::introspection_failed(format!("Failed to look up table '{table}'"), e)
        })
    }

    pub(crate) async fn fetch_row_count(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Dialect::Postgres.quote_ident(table));
        let conn = self.connection()?;
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(conn)
            .await
            .map_err(|e| {
                SandboxError::introspection_failed(format!("Failed to count rows in '{table}'"), e)
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Column metadata in `attnum` order, cached per table.
    pub(crate) async fn table_columns(&mut self, table: &str) -> Result<Vec<PgColumn>> {
        if let Some(cached) = self.columns.get(table) {
            return Ok(cached.clone());
        }

        let conn = self.connection()?;
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(Dialect::Postgres.quote_ident(table))
            .fetch_all(conn)
            .await
            .map_err(|e| {
                SandboxError::introspection_failed(format!("Failed to read columns of '{table}'"), e)
            })?;
        let columns = rows
            .iter()
            .map(|row| pg_column(row, table))
            .collect::<Result<Vec<_>>>()?;

        self.columns.insert(table.to_string(), columns.clone());
        Ok(columns)
    }

    /// Rebuilds `CREATE TABLE` from the catalog.
    pub(crate) async fn fetch_create_table(&mut self, table: &str) -> Result<String> {
        let columns = self.table_columns(table).await.map_err(|e| match e {
            SandboxError::NotConnected => e,
            other => SandboxError::ddl_extraction(table, other.to_string()),
        })?;
        if columns.is_empty() {
            return Err(SandboxError::ddl_extraction(table, "table has no columns"));
        }

        let conn = self.connection()?;
        let rows = sqlx::query(PRIMARY_KEY_QUERY)
            .bind(Dialect::Postgres.quote_ident(table))
            .fetch_all(conn)
            .await
            .map_err(|e| SandboxError::ddl_extraction(table, e.to_string()))?;
        let primary_key = rows
            .iter()
            .map(|row| -> Result<String> { row.get_field("column_name", Some(table)) })
            .collect::<Result<Vec<_>>>()
            .map_err(|e| SandboxError::ddl_extraction(table, e.to_string()))?;

        Ok(build_create_table(table, &columns, &primary_key))
    }

    pub(crate) async fn fetch_objects(&mut self) -> Result<Vec<SchemaObject>> {
        let conn = self.connection()?;
        let rows = sqlx::query(
            r#"
            SELECT c.relname::text AS object_name,
                   c.relkind::text AS object_kind
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = current_schema()
              AND c.relkind IN ('r', 'p', 'v', 'm', 'f', 'S')
            ORDER BY c.relname
            "#,
        )
        .fetch_all(conn)
        .await
        .map_err(|e| SandboxError::disposal_failed("Failed to enumerate schema objects", e))?;

        let mut objects = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_field("object_name", None)?;
            let relkind: String = row.get_field("object_kind", Some(&name))?;
            match map_relkind(&relkind) {
                Some(kind) => objects.push(SchemaObject::new(name, kind)),
                None => tracing::debug!(object = %name, relkind = %relkind, "Skipping schema object"),
            }
        }
        Ok(objects)
    }

    /// Moves every sequence feeding `table` past the copied key values.
    pub(crate) async fn advance_sequences(&mut self, table: &str) -> Result<()> {
        let columns = self.table_columns(table).await?;
        let quoted_table = Dialect::Postgres.quote_ident(table);

        for fixup in sequence_fixups(&columns) {
            let sql = setval_sql(table, &fixup);
            let query = match &fixup {
                SequenceFixup::Named { sequence, .. } => sqlx::query(&sql).bind(sequence.as_str()),
                SequenceFixup::Identity { column } => sqlx::query(&sql)
                    .bind(quoted_table.as_str())
                    .bind(column.as_str()),
            };
            let conn = self.connection()?;
            query
                .execute(conn)
                .await
                .map_err(|e| SandboxError::execution_failed(&sql, e))?;
            tracing::debug!(table, column = fixup.column(), "Sequence advanced");
        }
        Ok(())
    }
}

fn pg_column(row: &PgRow, table: &str) -> Result<PgColumn> {
    Ok(PgColumn {
        name: row.get_field("column_name", Some(table))?,
        data_type: row.get_field("data_type", Some(table))?,
        not_null: row.get_field("not_null", Some(table))?,
        default_expr: row.get_field("default_expr", Some(table))?,
        identity_kind: row.get_field("identity_kind", Some(table))?,
        generated_kind: row.get_field("generated_kind", Some(table))?,
    })
}

/// Maps `pg_class.relkind` to an object kind.
pub(crate) fn map_relkind(relkind: &str) -> Option<ObjectKind> {
    match relkind {
        "r" | "p" => Some(ObjectKind::Table),
        "v" => Some(ObjectKind::View),
        "m" => Some(ObjectKind::MaterializedView),
        "f" => Some(ObjectKind::ForeignTable),
        "S" => Some(ObjectKind::Sequence),
        _ => None,
    }
}
