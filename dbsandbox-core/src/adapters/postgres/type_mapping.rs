//! PostgreSQL value decoding.
//!
//! Statements run through the simple-query protocol, so most values arrive
//! in text format. Types without a dedicated decoder are shown in their
//! server text form.

use crate::adapters::helpers::{DriverExt, ValueClass};
use crate::models::SqlValue;
use sqlx::postgres::{PgQueryResult, PgRow, PgValueFormat, Postgres};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Maps a PostgreSQL type name (`PgTypeInfo::name()`) to the Rust type it is decoded as.
pub(crate) fn classify_pg_type(type_name: &str) -> ValueClass {
    match type_name.to_ascii_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => ValueClass::Bool,
        "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" => ValueClass::Signed,
        "FLOAT4" | "REAL" => ValueClass::Float32,
        "FLOAT8" | "DOUBLE PRECISION" => ValueClass::Float64,
        "NUMERIC" | "DECIMAL" => ValueClass::Decimal,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" | "UNKNOWN" => ValueClass::Text,
        "BYTEA" => ValueClass::Bytes,
        "DATE" => ValueClass::Date,
        "TIME" => ValueClass::Time,
        "TIMESTAMP" => ValueClass::DateTime,
        "TIMESTAMPTZ" => ValueClass::Timestamp,
        "UUID" => ValueClass::Uuid,
        "JSON" | "JSONB" => ValueClass::Json,
        _ => ValueClass::Other,
    }
}

impl DriverExt for Postgres {
    fn decode_value(row: &PgRow, index: usize) -> SqlValue {
        let format = match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(raw) => raw.format(),
            Err(_) => return SqlValue::Unsupported("unknown".to_string()),
        };
        let type_name = row
            .columns()
            .get(index)
            .map(|c| c.type_info().name().to_string())
            .unwrap_or_default();

        let decoded = match classify_pg_type(&type_name) {
            ValueClass::Bool => row.try_get::<bool, _>(index).ok().map(SqlValue::Bool),
            ValueClass::Signed | ValueClass::Unsigned => decode_integer(row, index),
            ValueClass::Float32 => row
                .try_get::<f32, _>(index)
                .ok()
                .map(|v| SqlValue::Float(f64::from(v))),
            ValueClass::Float64 => row.try_get::<f64, _>(index).ok().map(SqlValue::Float),
            ValueClass::Decimal => row
                .try_get::<sqlx::types::Decimal, _>(index)
                .ok()
                .map(|v| SqlValue::Decimal(v.to_string())),
            ValueClass::Text => row.try_get::<String, _>(index).ok().map(SqlValue::Text),
            ValueClass::Bytes => row.try_get::<Vec<u8>, _>(index).ok().map(SqlValue::Bytes),
            ValueClass::Date => row
                .try_get::<chrono::NaiveDate, _>(index)
                .ok()
                .map(SqlValue::Date),
            ValueClass::Time => row
                .try_get::<chrono::NaiveTime, _>(index)
                .ok()
                .map(SqlValue::Time),
            ValueClass::DateTime => row
                .try_get::<chrono::NaiveDateTime, _>(index)
                .ok()
                .map(SqlValue::DateTime),
            ValueClass::Timestamp => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .ok()
                .map(SqlValue::Timestamp),
            ValueClass::Uuid => row.try_get::<uuid::Uuid, _>(index).ok().map(SqlValue::Uuid),
            ValueClass::Json => row
                .try_get::<serde_json::Value, _>(index)
                .ok()
                .map(SqlValue::Json),
            ValueClass::Other => None,
        };

        decoded.unwrap_or_else(|| {
            // NUMERIC beyond Decimal range, NaN, intervals, arrays, enums, ...
            if matches!(format, PgValueFormat::Text) {
                if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
                    return SqlValue::Text(text);
                }
            }
            SqlValue::Unsupported(type_name)
        })
    }

    fn rows_affected(result: &PgQueryResult) -> u64 {
        result.rows_affected()
    }
}

fn decode_integer(row: &PgRow, index: usize) -> Option<SqlValue> {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Some(SqlValue::Int(v));
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Some(SqlValue::Int(i64::from(v)));
    }
    row.try_get::<i16, _>(index)
        .ok()
        .map(|v| SqlValue::Int(i64::from(v)))
}
