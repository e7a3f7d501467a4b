//! In-memory `SqlConnection` used to drive the provisioner, gateway and
//! session without a database server.
//!
//! The fake understands just enough SQL for the statements the library
//! itself issues (`CREATE TABLE`, `DROP ... IF EXISTS`, `SELECT * FROM`,
//! `SELECT COUNT(*) FROM`, `DELETE FROM`) and treats every `execute()`
//! call as one transaction: any failing statement restores the state from
//! before the call.

#![allow(dead_code)]

use async_trait::async_trait;
use dbsandbox_core::error::SandboxError;
use dbsandbox_core::models::{
    ObjectKind, RowSet, SchemaObject, SqlValue, StatementResult, TransferRow, TransferSet,
};
use dbsandbox_core::sql_text::split_statements;
use dbsandbox_core::{ConnectionConfig, Dialect, Result, SqlConnection};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Everything a fake database holds, shared with the test body.
#[derive(Debug, Default)]
pub struct MemoryState {
    pub tables: BTreeMap<String, MemoryTable>,
    pub views: Vec<String>,
    /// Every statement passed to `execute()`, in order
    pub executed: Vec<String>,
    /// `(table, rows)` of every `insert_rows()` call
    pub insert_batches: Vec<(String, usize)>,
    /// Every `set_foreign_key_checks()` argument, in order
    pub fk_checks: Vec<bool>,
    pub finalized: Vec<String>,
    /// Column names per table as first read by `fetch_rows()`, kept until
    /// `forget_metadata()`
    pub column_cache: BTreeMap<String, Vec<String>>,
    /// Number of `forget_metadata()` calls
    pub metadata_resets: usize,
    /// Column list passed to the latest `insert_rows()` call
    pub last_insert_columns: Vec<String>,
    /// `insert_rows()` into this table fails
    pub fail_insert_into: Option<String>,
    /// `execute()` of a statement containing this text fails
    pub fail_statement_containing: Option<String>,
    /// Dropping this object fails
    pub fail_drop_of: Option<String>,
}

pub type SharedState = Arc<Mutex<MemoryState>>;

pub fn lock(state: &SharedState) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap()
}

#[derive(Debug)]
pub struct MemoryConnection {
    config: ConnectionConfig,
    connected: bool,
    state: SharedState,
}

/// A connected fake plus a handle on its state.
pub fn memory(dialect: Dialect, database: &str) -> (Box<dyn SqlConnection>, SharedState) {
    let state = SharedState::default();
    let config = ConnectionConfig::new(dialect, "memory".to_string())
        .with_database(database.to_string());
    let connection = MemoryConnection {
        config,
        connected: true,
        state: Arc::clone(&state),
    };
    (Box::new(connection), state)
}

/// Adds `table` with `rows` rows of `(id, status, created_at)`; ids and
/// timestamps ascend with insertion order.
pub fn seed_table(state: &SharedState, table: &str, rows: usize) {
    let mut state = lock(state);
    let rows = (1..=rows)
        .map(|i| {
            vec![
                SqlValue::Int(i as i64),
                SqlValue::Text(if i % 2 == 0 { "paid" } else { "new" }.to_string()),
                SqlValue::Int(1_700_000_000 + i as i64),
            ]
        })
        .collect();
    state.tables.insert(
        table.to_string(),
        MemoryTable {
            columns: vec!["id".into(), "status".into(), "created_at".into()],
            rows,
        },
    );
}

pub fn row_count(state: &SharedState, table: &str) -> Option<usize> {
    lock(state).tables.get(table).map(|t| t.rows.len())
}

pub fn object_count(state: &SharedState) -> usize {
    let state = lock(state);
    state.tables.len() + state.views.len()
}

fn simulated(statement: &str, message: &str) -> SandboxError {
    SandboxError::execution_failed(statement, std::io::Error::other(message.to_string()))
}

/// Name after `prefix`, with quotes and a trailing `(`/`;` removed.
fn object_name(statement: &str, prefix: &str) -> Option<String> {
    let rest = statement.get(prefix.len()..)?.trim_start();
    let rest = rest
        .strip_prefix("IF EXISTS ")
        .or_else(|| rest.strip_prefix("if exists "))
        .unwrap_or(rest);
    let name: String = rest
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()?
        .trim_matches(|c| c == '`' || c == '"')
        .to_string();
    (!name.is_empty()).then_some(name)
}

fn column_list(statement: &str) -> Vec<String> {
    let start = statement.find('(').map_or(statement.len(), |i| i + 1);
    let end = statement.rfind(')').unwrap_or(statement.len());
    statement[start..end.max(start)]
        .split(',')
        .map(|c| c.trim().trim_matches(|q| q == '`' || q == '"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl MemoryState {
    fn run_statement(&mut self, statement: &str, want_results: bool) -> Result<StatementResult> {
        self.executed.push(statement.to_string());
        if let Some(needle) = &self.fail_statement_containing {
            if statement.contains(needle.as_str()) {
                return Err(simulated(statement, "simulated statement failure"));
            }
        }

        let upper = statement.to_ascii_uppercase();
        let affected = |count: usize| {
            Ok(StatementResult::affected(statement, count as u64, Duration::from_micros(10)))
        };

        if upper.starts_with("CREATE TABLE") {
            let name = object_name(statement, "CREATE TABLE")
                .ok_or_else(|| simulated(statement, "missing table name"))?;
            if self.tables.contains_key(&name) {
                return Err(simulated(statement, "table already exists"));
            }
            let columns = column_list(statement);
            self.tables.insert(name, MemoryTable { columns, rows: Vec::new() });
            return affected(0);
        }
        if upper.starts_with("CREATE VIEW") {
            let name = object_name(statement, "CREATE VIEW")
                .ok_or_else(|| simulated(statement, "missing view name"))?;
            self.views.push(name);
            return affected(0);
        }
        for (prefix, kind) in [("DROP TABLE", ObjectKind::Table), ("DROP VIEW", ObjectKind::View)] {
            if upper.starts_with(prefix) {
                let name = object_name(statement, prefix)
                    .ok_or_else(|| simulated(statement, "missing object name"))?;
                if self.fail_drop_of.as_deref() == Some(name.as_str()) {
                    return Err(simulated(statement, "simulated drop failure"));
                }
                match kind {
                    ObjectKind::View => self.views.retain(|v| v != &name),
                    _ => {
                        self.tables.remove(&name);
                    }
                }
                return affected(0);
            }
        }
        if upper.starts_with("DELETE FROM") {
            let name = object_name(statement, "DELETE FROM")
                .ok_or_else(|| simulated(statement, "missing table name"))?;
            let table = self
                .tables
                .get_mut(&name)
                .ok_or_else(|| simulated(statement, "no such table"))?;
            let count = table.rows.len();
            table.rows.clear();
            return affected(count);
        }
        if upper.starts_with("SELECT COUNT(*) FROM") {
            let name = object_name(statement, "SELECT COUNT(*) FROM")
                .ok_or_else(|| simulated(statement, "missing table name"))?;
            let count = self
                .tables
                .get(&name)
                .map(|t| t.rows.len())
                .ok_or_else(|| simulated(statement, "no such table"))?;
            let mut rows = RowSet::new(vec!["count".to_string()]);
            rows.rows.push(vec![SqlValue::Int(count as i64)]);
            return Ok(if want_results {
                StatementResult::rows(statement, rows, Duration::from_micros(10))
            } else {
                StatementResult::affected(statement, 1, Duration::from_micros(10))
            });
        }
        if upper.starts_with("SELECT * FROM") {
            let name = object_name(statement, "SELECT * FROM")
                .ok_or_else(|| simulated(statement, "missing table name"))?;
            let table = self
                .tables
                .get(&name)
                .ok_or_else(|| simulated(statement, "no such table"))?;
            let mut rows = RowSet::new(table.columns.clone());
            rows.rows = table.rows.clone();
            return Ok(if want_results {
                StatementResult::rows(statement, rows, Duration::from_micros(10))
            } else {
                StatementResult::affected(statement, table.rows.len() as u64, Duration::from_micros(10))
            });
        }
        if upper.starts_with("SELECT") || upper.starts_with("SET") || upper.starts_with("UPDATE") {
            return affected(0);
        }

        Err(simulated(statement, "syntax error"))
    }

    fn snapshot(&self) -> (BTreeMap<String, MemoryTable>, Vec<String>) {
        (self.tables.clone(), self.views.clone())
    }
}

impl MemoryConnection {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        if !self.connected {
            return Err(SandboxError::NotConnected);
        }
        Ok(self.state.lock().unwrap())
    }
}

#[async_trait]
impl SqlConnection for MemoryConnection {
    fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, want_results: bool) -> Result<Vec<StatementResult>> {
        let dialect = self.dialect();
        let mut state = self.state()?;
        let snapshot = state.snapshot();

        let mut results = Vec::new();
        for statement in split_statements(sql, dialect) {
            match state.run_statement(&statement, want_results) {
                Ok(result) => results.push(result),
                Err(error) => {
                    (state.tables, state.views) = snapshot;
                    return Err(error);
                }
            }
        }
        Ok(results)
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        Ok(self.state()?.tables.contains_key(table))
    }

    async fn row_count(&mut self, table: &str) -> Result<u64> {
        self.state()?
            .tables
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| {
                SandboxError::introspection_failed(
                    format!("Failed to count rows in '{table}'"),
                    std::io::Error::other("no such table"),
                )
            })
    }

    async fn create_table_ddl(&mut self, table: &str) -> Result<String> {
        let quote = self.dialect().quote_char();
        let state = self.state()?;
        let definition = state
            .tables
            .get(table)
            .ok_or_else(|| SandboxError::ddl_extraction(table, "no such table"))?;
        Ok(format!(
            "CREATE TABLE {quote}{table}{quote} ({})",
            definition.columns.join(", ")
        ))
    }

    async fn fetch_rows(&mut self, table: &str, query: &str) -> Result<TransferSet> {
        let mut state = self.state()?;
        let definition = state.tables.get(table).cloned().ok_or_else(|| {
            SandboxError::source_read(table, std::io::Error::other("no such table"))
        })?;
        let columns = state
            .column_cache
            .entry(table.to_string())
            .or_insert_with(|| definition.columns.clone())
            .clone();

        let mut rows = definition.rows.clone();
        if query.contains(" DESC ") {
            rows.reverse();
        }
        if let Some(limit) = query
            .rsplit_once(" LIMIT ")
            .and_then(|(_, n)| n.trim().parse::<usize>().ok())
        {
            rows.truncate(limit);
        }

        Ok(TransferSet {
            columns,
            rows: rows.into_iter().map(TransferRow::Values).collect(),
        })
    }

    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[TransferRow],
    ) -> Result<u64> {
        let mut state = self.state()?;
        if state.fail_insert_into.as_deref() == Some(table) {
            return Err(simulated("INSERT INTO", "simulated insert failure"));
        }
        state.insert_batches.push((table.to_string(), rows.len()));
        state.last_insert_columns = columns.to_vec();

        let values: Vec<Vec<SqlValue>> = rows
            .iter()
            .filter_map(|row| match row {
                TransferRow::Values(values) => Some(values.clone()),
                TransferRow::Document(_) => None,
            })
            .collect();
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| simulated("INSERT INTO", "no such table"))?;
        let inserted = values.len() as u64;
        target.rows.extend(values);
        Ok(inserted)
    }

    async fn list_objects(&mut self) -> Result<Vec<SchemaObject>> {
        let state = self.state()?;
        let mut objects: Vec<SchemaObject> = state
            .tables
            .keys()
            .map(|name| SchemaObject::new(name.clone(), ObjectKind::Table))
            .collect();
        objects.extend(
            state
                .views
                .iter()
                .map(|name| SchemaObject::new(name.clone(), ObjectKind::View)),
        );
        Ok(objects)
    }

    async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        self.state()?.fk_checks.push(enabled);
        Ok(())
    }

    fn forget_metadata(&mut self) {
        let mut state = lock(&self.state);
        state.column_cache.clear();
        state.metadata_resets += 1;
    }

    async fn finalize_table(&mut self, table: &str) -> Result<()> {
        self.state()?.finalized.push(table.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
