//! Table metadata for MySQL: existence, row counts, DDL and schema objects.

use super::MySqlConnection;
use super::transfer::MySqlColumn;
use crate::adapters::helpers::RowExt;
use crate::models::{ObjectKind, SchemaObject};
use crate::{Dialect, Result, error::SandboxError};
use sqlx::Row;

impl MySqlConnection {
    pub(crate) async fn fetch_table_exists(&mut self, table: &str) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
              AND TABLE_TYPE = 'BASE TABLE'
            "#,
        )
        .bind(table)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            SandboxError::introspection_failed(format!("Failed to look up table '{table}'"), e)
        })?;
        Ok(count > 0)
    }

    pub(crate) async fn fetch_row_count(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Dialect::MySql.quote_ident(table));
        let conn = self.connection()?;
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(conn)
            .await
            .map_err(|e| {
                SandboxError::introspection_failed(format!("Failed to count rows in '{table}'"), e)
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// `SHOW CREATE TABLE`, returned verbatim.
    pub(crate) async fn fetch_create_table(&mut self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", Dialect::MySql.quote_ident(table));
        let conn = self.connection()?;
        let row = sqlx::query(&sql)
            .fetch_optional(conn)
            .await
            .map_err(|e| SandboxError::ddl_extraction(table, e.to_string()))?
            .ok_or_else(|| SandboxError::ddl_extraction(table, "SHOW CREATE TABLE returned no rows"))?;

        // Some server versions report the column as binary
        let text: Result<String> = row.get_field("Create Table", Some(table));
        let ddl = match text {
            Ok(ddl) => ddl,
            Err(_) => {
                let bytes: Vec<u8> = row
                    .try_get("Create Table")
                    .map_err(|_| SandboxError::ddl_extraction(table, "object is not a base table"))?;
                String::from_utf8(bytes)
                    .map_err(|_| SandboxError::ddl_extraction(table, "DDL is not valid UTF-8"))?
            }
        };

        if ddl.trim().is_empty() {
            return Err(SandboxError::ddl_extraction(table, "server returned empty DDL"));
        }
        Ok(ddl)
    }

    pub(crate) async fn fetch_objects(&mut self) -> Result<Vec<SchemaObject>> {
        let conn = self.connection()?;
        let rows = sqlx::query(
            r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
                   CAST(TABLE_TYPE AS CHAR) AS table_type
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            ORDER BY TABLE_NAME
            "#,
        )
        .fetch_all(conn)
        .await
        .map_err(|e| SandboxError::disposal_failed("Failed to enumerate schema objects", e))?;

        let mut objects = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_field("table_name", None)?;
            let table_type: String = row.get_field("table_type", Some(&name))?;
            match map_table_type(&table_type) {
                Some(kind) => objects.push(SchemaObject::new(name, kind)),
                None => tracing::debug!(object = %name, table_type = %table_type, "Skipping schema object"),
            }
        }
        Ok(objects)
    }

    /// Column names, types and generation flags in ordinal order.
    pub(crate) async fn fetch_columns(&mut self, table: &str) -> Result<Vec<MySqlColumn>> {
        let conn = self.connection()?;
        let rows = sqlx::query(
            r#"
            SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
                   CAST(DATA_TYPE AS CHAR) AS data_type,
                   CAST(COALESCE(GENERATION_EXPRESSION, '') <> '' AS SIGNED) AS is_generated
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(conn)
        .await
        .map_err(|e| {
            SandboxError::introspection_failed(format!("Failed to read columns of '{table}'"), e)
        })?;

        rows.iter()
            .map(|row| {
                let is_generated: i64 = row.get_field("is_generated", Some(table))?;
                Ok(MySqlColumn {
                    name: row.get_field("column_name", Some(table))?,
                    data_type: row.get_field("data_type", Some(table))?,
                    is_generated: is_generated != 0,
                })
            })
            .collect()
    }

    /// The active `sql_mode` of this session.
    pub(crate) async fn fetch_sql_mode(&mut self) -> Result<String> {
        let conn = self.connection()?;
        sqlx::query_scalar("SELECT CAST(@@SESSION.sql_mode AS CHAR)")
            .fetch_one(conn)
            .await
            .map_err(|e| SandboxError::introspection_failed("Failed to read sql_mode", e))
    }
}

/// Maps `INFORMATION_SCHEMA.TABLES.TABLE_TYPE` to an object kind.
pub(crate) fn map_table_type(table_type: &str) -> Option<ObjectKind> {
    match table_type.to_ascii_uppercase().as_str() {
        "BASE TABLE" => Some(ObjectKind::Table),
        "VIEW" => Some(ObjectKind::View),
        // MariaDB sequences
        "SEQUENCE" => Some(ObjectKind::Sequence),
        _ => None,
    }
}
