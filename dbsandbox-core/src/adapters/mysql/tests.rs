//! Unit tests for the MySQL connection.
//!
//! These tests cover the parts that need no server:
//! - Type name classification and TIME conversion
//! - Transfer select and INSERT statement construction
//! - sql_mode relaxation for zero dates
//! - Session settings and connect options

use super::connection::{connect_options, session_statements};
use super::introspection::map_table_type;
use super::transfer::{MySqlColumn, build_insert_sql, build_transfer_query, relaxed_sql_mode};
use super::type_mapping::{classify_mysql_type, time_value, value_at};
use super::MySqlConnection;
use crate::adapters::SqlConnection;
use crate::adapters::helpers::ValueClass;
use crate::models::{ObjectKind, SqlValue};
use crate::security::Credentials;
use crate::{ConnectionConfig, Dialect, SandboxError};
use chrono::NaiveTime;
use sqlx::mysql::types::{MySqlTime, MySqlTimeSign};
use std::time::Duration;

fn config() -> ConnectionConfig {
    ConnectionConfig::new(Dialect::MySql, "db.internal".to_string())
        .with_database("shop".to_string())
        .with_username("reader".to_string())
}

// =============================================================================
// Type Classification Tests
// =============================================================================

#[test]
fn test_classify_integer_types() {
    assert_eq!(classify_mysql_type("INT"), ValueClass::Signed);
    assert_eq!(classify_mysql_type("BIGINT"), ValueClass::Signed);
    assert_eq!(classify_mysql_type("tinyint"), ValueClass::Signed);
    assert_eq!(classify_mysql_type("INT UNSIGNED"), ValueClass::Unsigned);
    assert_eq!(classify_mysql_type("BIGINT UNSIGNED"), ValueClass::Unsigned);
}

#[test]
fn test_tinyint_one_is_copied_as_an_integer() {
    // TINYINT(1) columns are reported as BOOLEAN but may hold 2, -1 or 127
    assert_eq!(classify_mysql_type("BOOLEAN"), ValueClass::Signed);
    assert_eq!(classify_mysql_type("BOOL"), ValueClass::Signed);
}

#[test]
fn test_classify_exact_and_float_types() {
    assert_eq!(classify_mysql_type("DECIMAL"), ValueClass::Decimal);
    assert_eq!(classify_mysql_type("FLOAT"), ValueClass::Float32);
    assert_eq!(classify_mysql_type("DOUBLE"), ValueClass::Float64);
}

#[test]
fn test_classify_temporal_types() {
    assert_eq!(classify_mysql_type("DATE"), ValueClass::Date);
    assert_eq!(classify_mysql_type("TIME"), ValueClass::Time);
    assert_eq!(classify_mysql_type("DATETIME"), ValueClass::DateTime);
    assert_eq!(classify_mysql_type("TIMESTAMP"), ValueClass::Timestamp);
    assert_eq!(classify_mysql_type("YEAR"), ValueClass::Unsigned);
}

#[test]
fn test_time_of_day_decodes_as_time() {
    let time = MySqlTime::new(MySqlTimeSign::Positive, 13, 45, 7, 250_000).unwrap();
    assert_eq!(
        time_value(time),
        SqlValue::Time(NaiveTime::from_hms_micro_opt(13, 45, 7, 250_000).unwrap())
    );
}

#[test]
fn test_time_outside_a_day_keeps_mysql_text_form() {
    let long = MySqlTime::new(MySqlTimeSign::Positive, 838, 59, 59, 0).unwrap();
    assert_eq!(time_value(long), SqlValue::Text("838:59:59".to_string()));

    let negative = MySqlTime::new(MySqlTimeSign::Negative, 12, 30, 0, 500_000).unwrap();
    assert_eq!(time_value(negative), SqlValue::Text("-12:30:00.5".to_string()));
}

#[test]
fn test_classify_text_binary_and_json() {
    assert_eq!(classify_mysql_type("VARCHAR"), ValueClass::Text);
    assert_eq!(classify_mysql_type("ENUM"), ValueClass::Text);
    assert_eq!(classify_mysql_type("LONGTEXT"), ValueClass::Text);
    assert_eq!(classify_mysql_type("VARBINARY"), ValueClass::Bytes);
    assert_eq!(classify_mysql_type("BLOB"), ValueClass::Bytes);
    assert_eq!(classify_mysql_type("GEOMETRY"), ValueClass::Bytes);
    assert_eq!(classify_mysql_type("JSON"), ValueClass::Json);
}

#[test]
fn test_map_table_type() {
    assert_eq!(map_table_type("BASE TABLE"), Some(ObjectKind::Table));
    assert_eq!(map_table_type("VIEW"), Some(ObjectKind::View));
    assert_eq!(map_table_type("SEQUENCE"), Some(ObjectKind::Sequence));
    assert_eq!(map_table_type("SYSTEM VIEW"), None);
}

// =============================================================================
// Insert Construction Tests
// =============================================================================

#[test]
fn test_build_insert_sql_multi_row() {
    let sql = build_insert_sql("orders", &["id", "status"], 3);
    assert_eq!(
        sql,
        "INSERT INTO `orders` (`id`, `status`) VALUES (?, ?), (?, ?), (?, ?)"
    );
}

#[test]
fn test_build_insert_sql_quotes_identifiers() {
    let sql = build_insert_sql("order items", &["key", "we`ird"], 1);
    assert_eq!(
        sql,
        "INSERT INTO `order items` (`key`, `we``ird`) VALUES (?, ?)"
    );
}

fn column(name: &str, data_type: &str) -> MySqlColumn {
    MySqlColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_generated: false,
    }
}

#[test]
fn test_transfer_query_reads_dates_as_text() {
    let columns = vec![
        column("id", "int"),
        column("shipped_on", "date"),
        column("created_at", "DATETIME"),
        column("touched", "timestamp"),
        column("start_time", "time"),
    ];
    let sql = build_transfer_query("SELECT * FROM `orders` LIMIT 5", &columns);
    assert_eq!(
        sql,
        "SELECT t.`id`, CAST(t.`shipped_on` AS CHAR) AS `shipped_on`, \
         CAST(t.`created_at` AS CHAR) AS `created_at`, CAST(t.`touched` AS CHAR) AS `touched`, \
         t.`start_time` FROM (SELECT * FROM `orders` LIMIT 5) AS t"
    );
}

#[test]
fn test_transfer_query_unchanged_without_dates() {
    let columns = vec![column("id", "bigint"), column("flag", "tinyint")];
    assert_eq!(
        build_transfer_query("SELECT * FROM `orders`", &columns),
        "SELECT * FROM `orders`"
    );
    assert_eq!(
        build_transfer_query("SELECT * FROM `orders`", &[]),
        "SELECT * FROM `orders`"
    );
}

#[test]
fn test_relaxed_sql_mode_allows_zero_dates() {
    assert_eq!(
        relaxed_sql_mode(
            "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION"
        ),
        "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION"
    );
    assert_eq!(relaxed_sql_mode("NO_ZERO_DATE"), "");
    assert_eq!(relaxed_sql_mode(""), "");
    assert_eq!(
        relaxed_sql_mode("STRICT_TRANS_TABLES"),
        "STRICT_TRANS_TABLES"
    );
}

#[test]
fn test_value_at_pads_short_rows_with_null() {
    let values = vec![SqlValue::Int(1)];
    assert_eq!(value_at(&values, 0), &SqlValue::Int(1));
    assert_eq!(value_at(&values, 5), &SqlValue::Null);
}

// =============================================================================
// Session Settings Tests
// =============================================================================

#[test]
fn test_session_statements_read_only_source() {
    let statements = session_statements(&config().with_query_timeout(Duration::from_secs(45)));
    assert_eq!(
        statements,
        vec![
            "SET time_zone = '+00:00'".to_string(),
            "SET SESSION max_execution_time = 45000".to_string(),
            "SET SESSION TRANSACTION READ ONLY".to_string(),
        ]
    );
}

#[test]
fn test_session_statements_writable_sandbox() {
    let statements = session_statements(&config().with_read_only(false));
    assert!(!statements.iter().any(|s| s.contains("READ ONLY")));
}

#[test]
fn test_connect_options_use_config_and_credentials() {
    let credentials = Credentials::new("reader".to_string(), Some("pw".to_string()));
    let options = connect_options(&config().with_port(3307), &credentials);

    assert_eq!(options.get_host(), "db.internal");
    assert_eq!(options.get_port(), 3307);
    assert_eq!(options.get_username(), "reader");
    assert_eq!(options.get_database(), Some("shop"));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_operations_require_connect() {
    let mut connection = MySqlConnection::new(config(), Credentials::new("reader".to_string(), None));

    assert!(!connection.is_connected());
    assert!(matches!(
        connection.execute("SELECT 1", true).await,
        Err(SandboxError::NotConnected)
    ));
    assert!(matches!(
        connection.row_count("orders").await,
        Err(SandboxError::NotConnected)
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut connection = MySqlConnection::new(config(), Credentials::new("reader".to_string(), None));
    assert!(connection.close().await.is_ok());
    assert!(connection.close().await.is_ok());
}

#[test]
fn test_forget_metadata_clears_column_cache() {
    let mut connection = MySqlConnection::new(config(), Credentials::new("reader".to_string(), None));
    connection
        .columns
        .insert("orders".to_string(), vec![column("id", "int")]);

    connection.forget_metadata();

    assert!(connection.columns.is_empty());
}

#[test]
fn test_debug_omits_credentials() {
    let connection = MySqlConnection::new(
        config(),
        Credentials::new("reader".to_string(), Some("s3cret".to_string())),
    );
    let rendered = format!("{connection:?}");
    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("connected: false"));
}
