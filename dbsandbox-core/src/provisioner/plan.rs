//! Pure planning helpers for a table copy: row selection, batch sizes and
//! sandbox naming.

use crate::config::{NamingPolicy, SamplingStrategy, SandboxConfig};
use crate::models::TransferRow;
use crate::{Dialect, Result, error::SandboxError};
use regex::Regex;
use std::collections::HashSet;

/// Which rows of a source table are copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelection {
    /// Every row, in source order
    All,
    /// `limit` rows in random order
    Random { limit: u64 },
    /// The `limit` newest rows by `column`
    Newest { column: String, limit: u64 },
}

impl RowSelection {
    /// Chooses the selection for a table with `row_count` rows.
    pub fn for_table(row_count: u64, config: &SandboxConfig) -> Self {
        if row_count <= config.copy_threshold {
            return Self::All;
        }
        match config.sampling_strategy {
            SamplingStrategy::Random => Self::Random {
                limit: config.sample_size,
            },
            SamplingStrategy::TimeBased => Self::Newest {
                column: config.sampling_params.time_column.clone(),
                limit: config.sample_size,
            },
        }
    }

    pub fn is_sampled(&self) -> bool {
        !matches!(self, Self::All)
    }

    /// The `SELECT` reading this selection from `table`.
    pub fn select_sql(&self, dialect: Dialect, table: &str) -> String {
        let base = format!("SELECT * FROM {}", dialect.quote_ident(table));
        match self {
            Self::All => base,
            Self::Random { limit } => {
                format!("{base} ORDER BY {} LIMIT {limit}", dialect.random_function())
            }
            Self::Newest { column, limit } => format!(
                "{base} ORDER BY {} DESC LIMIT {limit}",
                dialect.quote_ident(column)
            ),
        }
    }
}

/// `tables` in first-seen order with repeats removed.
pub fn distinct_tables(tables: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .filter(|table| seen.insert(table.as_str()))
        .cloned()
        .collect()
}

/// Splits `total` rows into batches of at most `batch_size`.
///
/// ```rust
/// use dbsandbox_core::provisioner::plan_batches;
///
/// assert_eq!(plan_batches(2500, 1000), vec![1000, 1000, 500]);
/// assert!(plan_batches(0, 1000).is_empty());
/// ```
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<usize> {
    let size = batch_size.max(1);
    let mut batches = vec![size; total / size];
    if total % size > 0 {
        batches.push(total % size);
    }
    batches
}

/// Rows per INSERT, capped so one statement stays under the dialect's
/// bind parameter ceiling. Document rows bind one parameter per batch.
pub fn effective_batch_size(
    dialect: Dialect,
    batch_size: usize,
    column_count: usize,
    sample: Option<&TransferRow>,
) -> usize {
    let requested = batch_size.max(1);
    match sample {
        Some(TransferRow::Values(_)) if column_count > 0 => {
            requested.min((dialect.max_bind_params() / column_count).max(1))
        }
        _ => requested,
    }
}

/// Picks the sandbox name for `original`.
///
/// `taken` reports names already used in the sandbox.
pub fn sandbox_table_name(original: &str, naming: NamingPolicy, taken: impl Fn(&str) -> bool) -> String {
    match naming {
        NamingPolicy::Preserve => original.to_string(),
        NamingPolicy::Suffix => {
            let base = format!("{original}_sandbox");
            let mut candidate = base.clone();
            let mut n = 2u32;
            while taken(&candidate) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        }
    }
}

/// Points a `CREATE TABLE` statement at a different table name.
///
/// # Errors
/// Returns `DdlExtraction` when the statement does not create `original`
pub fn retarget_ddl(ddl: &str, dialect: Dialect, original: &str, sandbox: &str) -> Result<String> {
    if original == sandbox {
        return Ok(ddl.to_string());
    }

    let quoted = dialect.quote_ident(original);
    let pattern = Regex::new(&format!(
        r"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:{}|{}\b)",
        regex::escape(&quoted),
        regex::escape(original)
    ))
    .map_err(|e| SandboxError::ddl_extraction(original, e.to_string()))?;

    let replacement = format!("CREATE TABLE {}", dialect.quote_ident(sandbox));
    match pattern.find(ddl) {
        Some(found) => Ok(format!(
            "{}{replacement}{}",
            &ddl[..found.start()],
            &ddl[found.end()..]
        )),
        None => Err(SandboxError::ddl_extraction(
            original,
            "no CREATE TABLE statement for this table",
        )),
    }
}
