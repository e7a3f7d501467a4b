//! MySQL value decoding and parameter binding.
//!
//! Column type names come from `MySqlTypeInfo::name()` (for example
//! `BIGINT UNSIGNED`, `DECIMAL`, `DATETIME`). The driver names every
//! `TINYINT(1)` column `BOOLEAN` whatever it holds, so those decode as
//! integers.

use crate::adapters::helpers::{DriverExt, ValueClass};
use crate::models::SqlValue;
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySql, MySqlArguments, MySqlQueryResult, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

static NULL_VALUE: SqlValue = SqlValue::Null;

/// Maps a MySQL type name to the Rust type it is decoded as.
pub(crate) fn classify_mysql_type(type_name: &str) -> ValueClass {
    let upper = type_name.to_ascii_uppercase();
    let is_unsigned = upper.contains("UNSIGNED");
    let base_type = upper.split_whitespace().next().unwrap_or_default();

    match base_type {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" if is_unsigned => {
            ValueClass::Unsigned
        }
        "BOOLEAN" | "BOOL" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER"
        | "BIGINT" => ValueClass::Signed,
        "YEAR" => ValueClass::Unsigned,
        "FLOAT" => ValueClass::Float32,
        "DOUBLE" | "REAL" => ValueClass::Float64,
        "DECIMAL" | "NUMERIC" => ValueClass::Decimal,
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            ValueClass::Text
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => ValueClass::Bytes,
        "DATE" => ValueClass::Date,
        "TIME" => ValueClass::Time,
        "DATETIME" => ValueClass::DateTime,
        "TIMESTAMP" => ValueClass::Timestamp,
        "JSON" => ValueClass::Json,
        _ => ValueClass::Other,
    }
}

impl DriverExt for MySql {
    fn decode_value(row: &MySqlRow, index: usize) -> SqlValue {
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(_) => {}
            Err(_) => return SqlValue::Unsupported("unknown".to_string()),
        }
        let type_name = row
            .columns()
            .get(index)
            .map(|c| c.type_info().name().to_string())
            .unwrap_or_default();

        let decoded = match classify_mysql_type(&type_name) {
            ValueClass::Bool => row.try_get::<bool, _>(index).ok().map(SqlValue::Bool),
            // An unsigned TINYINT(1) is still named BOOLEAN
            ValueClass::Signed => row
                .try_get::<i64, _>(index)
                .map(SqlValue::Int)
                .or_else(|_| row.try_get::<u64, _>(index).map(SqlValue::UInt))
                .ok(),
            // YEAR may arrive without the UNSIGNED flag
            ValueClass::Unsigned => row
                .try_get::<u64, _>(index)
                .or_else(|_| row.try_get_unchecked::<u64, _>(index))
                .ok()
                .map(SqlValue::UInt),
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
            ValueClass::Bytes => row
                .try_get_unchecked::<Vec<u8>, _>(index)
                .ok()
                .map(SqlValue::Bytes),
            ValueClass::Date => row
                .try_get::<chrono::NaiveDate, _>(index)
                .ok()
                .map(SqlValue::Date),
            ValueClass::Time => row.try_get::<MySqlTime, _>(index).ok().map(time_value),
            ValueClass::DateTime => row
                .try_get::<chrono::NaiveDateTime, _>(index)
                .ok()
                .map(SqlValue::DateTime),
            ValueClass::Timestamp => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .ok()
                .map(SqlValue::Timestamp),
            ValueClass::Json => row
                .try_get::<serde_json::Value, _>(index)
                .ok()
                .map(SqlValue::Json),
            ValueClass::Uuid | ValueClass::Other => None,
        };

        decoded.unwrap_or_else(|| fallback_value(row, index, &type_name))
    }

    fn rows_affected(result: &MySqlQueryResult) -> u64 {
        result.rows_affected()
    }
}

/// A TIME value as a time of day when it is one, otherwise in MySQL's own
/// text form (`-12:30:00`, `838:59:59.5`), which the server reads back
/// unchanged.
pub(crate) fn time_value(time: MySqlTime) -> SqlValue {
    if time.is_valid_time_of_day() {
        if let Ok(time_of_day) = chrono::NaiveTime::try_from(time) {
            return SqlValue::Time(time_of_day);
        }
    }
    SqlValue::Text(time.to_string())
}

/// Raw value of a column no typed decoder accepted, such as a zero date in
/// a statement result. Text-protocol values are UTF-8 and come back as
/// text; binary ones come back as bytes.
fn fallback_value(row: &MySqlRow, index: usize, type_name: &str) -> SqlValue {
    if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
        return SqlValue::Text(text);
    }
    if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(index) {
        return SqlValue::Bytes(bytes);
    }
    SqlValue::Unsupported(type_name.to_string())
}

/// Binds one value as a positional `?` parameter.
pub(crate) fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null | SqlValue::Unsupported(_) => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::UInt(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) | SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

/// Value at `index`, NULL when the row is shorter than the column list.
pub(crate) fn value_at(values: &[SqlValue], index: usize) -> &SqlValue {
    values.get(index).unwrap_or(&NULL_VALUE)
}
