//! Data structures shared by connections, the provisioner and the gateway.
//!
//! Row data is decoded once into [`SqlValue`] and carried unchanged from the
//! driver to the formatter or to the sandbox insert path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single decoded cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact numeric kept as its canonical text form
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    /// A column whose type the driver could not decode; holds the type name
    Unsupported(String),
}

impl SqlValue {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(v) | Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(bytes) => {
                write!(f, "0x")?;
                for byte in bytes.iter().take(32) {
                    write!(f, "{byte:02x}")?;
                }
                if bytes.len() > 32 {
                    write!(f, "...")?;
                }
                Ok(())
            }
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f%:z")),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
            Self::Unsupported(type_name) => write!(f, "<{type_name}>"),
        }
    }
}

/// Ordered rows returned by a read statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }
}

/// What one statement produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementOutcome {
    Rows(RowSet),
    Affected(u64),
}

/// Result of one statement inside an `execute()` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    /// Statement text as submitted (trimmed, without the trailing `;`)
    pub sql: String,
    pub outcome: StatementOutcome,
    pub duration: Duration,
}

impl StatementResult {
    pub fn rows(sql: impl Into<String>, rows: RowSet, duration: Duration) -> Self {
        Self {
            sql: sql.into(),
            outcome: StatementOutcome::Rows(rows),
            duration,
        }
    }

    pub fn affected(sql: impl Into<String>, count: u64, duration: Duration) -> Self {
        Self {
            sql: sql.into(),
            outcome: StatementOutcome::Affected(count),
            duration,
        }
    }

    /// Returns the row set for read statements.
    pub fn row_set(&self) -> Option<&RowSet> {
        match &self.outcome {
            StatementOutcome::Rows(rows) => Some(rows),
            StatementOutcome::Affected(_) => None,
        }
    }

    /// Returns the affected-row count for write statements.
    pub fn affected_rows(&self) -> Option<u64> {
        match self.outcome {
            StatementOutcome::Affected(count) => Some(count),
            StatementOutcome::Rows(_) => None,
        }
    }
}

/// A source row on its way to the sandbox.
///
/// MySQL rows travel as decoded values. PostgreSQL rows travel as the
/// `row_to_json` document the server produced, so no value is ever
/// re-typed on the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferRow {
    Values(Vec<SqlValue>),
    Document(String),
}

/// Rows materialized from the source for one table copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferSet {
    pub columns: Vec<String>,
    pub rows: Vec<TransferRow>,
}

impl TransferSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Kind of a schema object found in the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    View,
    MaterializedView,
    ForeignTable,
    Sequence,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "TABLE"),
            Self::View => write!(f, "VIEW"),
            Self::MaterializedView => write!(f, "MATERIALIZED VIEW"),
            Self::ForeignTable => write!(f, "FOREIGN TABLE"),
            Self::Sequence => write!(f, "SEQUENCE"),
        }
    }
}

/// A table, view or sequence in the connected schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub name: String,
    pub kind: ObjectKind,
}

impl SchemaObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Record of one provisioned table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name on the source database
    pub original: String,
    /// Table name inside the sandbox
    pub sandbox_name: String,
    /// Row count observed on the source before copying
    pub source_rows: u64,
    /// True when only a sample was copied
    pub is_sampled: bool,
    /// Rows actually written into the sandbox
    pub copied_rows: u64,
    /// Row count of every INSERT batch, in order
    pub batches: Vec<usize>,
}

/// Result of a successful `provision()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSummary {
    pub tables: Vec<TableDescriptor>,
}

impl ProvisionSummary {
    /// Descriptors of the tables that were sampled rather than fully copied.
    pub fn sampled_tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter().filter(|t| t.is_sampled)
    }

    pub fn table(&self, original: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.original.eq_ignore_ascii_case(original))
    }

    pub fn total_copied_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.copied_rows).sum()
    }
}

/// Outcome of a sandbox wipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalReport {
    /// Objects present before the wipe
    pub objects_found: usize,
    /// Objects dropped successfully
    pub objects_dropped: usize,
    /// `(object, error)` for every drop that failed
    pub failures: Vec<(String, String)>,
}

impl DisposalReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
