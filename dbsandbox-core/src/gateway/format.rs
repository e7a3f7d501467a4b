//! Text rendering of statement results.

use crate::error::error_chain;
use crate::models::{RowSet, StatementOutcome, StatementResult};
use std::fmt::Write as _;
use std::time::Duration;

/// Rows shown per result set.
pub const PREVIEW_ROWS: usize = 20;

/// Report used when a call contained no statements.
pub const NO_STATEMENTS: &str = "No SQL statements were executed.";

/// Renders every statement result of one call.
///
/// ```rust
/// use dbsandbox_core::gateway::format_results;
/// use dbsandbox_core::models::StatementResult;
/// use std::time::Duration;
///
/// let report = format_results(&[StatementResult::affected(
///     "DELETE FROM orders WHERE id = 7",
///     1,
///     Duration::from_millis(3),
/// )]);
/// assert!(report.contains("[Statement 1] DELETE FROM orders WHERE id = 7"));
/// assert!(report.contains("Affected 1 rows"));
/// ```
pub fn format_results(results: &[StatementResult]) -> String {
    if results.is_empty() {
        return NO_STATEMENTS.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(index, result)| format_statement(index + 1, result))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Failure text for an error, including its source chain.
pub fn format_failure(error: &(dyn std::error::Error + 'static)) -> String {
    format!("ERROR: {}", error_chain(error))
}

fn format_statement(number: usize, result: &StatementResult) -> String {
    let mut text = format!(
        "[Statement {number}] {}\nExecution time: {}",
        result.sql,
        format_duration(result.duration)
    );
    match &result.outcome {
        StatementOutcome::Rows(rows) => {
            text.push('\n');
            text.push_str(&format_rows(rows));
        }
        StatementOutcome::Affected(count) => {
            let _ = write!(text, "\nAffected {count} rows");
        }
    }
    text
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2} ms", duration.as_secs_f64() * 1000.0)
}

fn format_rows(rows: &RowSet) -> String {
    if rows.is_empty() {
        return "Returned 0 rows (empty result set)".to_string();
    }

    let mut text = format!("Returned {} rows:\n{}", rows.len(), rows.columns.join(" | "));
    for row in rows.rows.iter().take(PREVIEW_ROWS) {
        let line = row
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        text.push('\n');
        text.push_str(&line);
    }
    if rows.len() > PREVIEW_ROWS {
        let _ = write!(text, "\n... ({} more rows not shown)", rows.len() - PREVIEW_ROWS);
    }
    text
}
