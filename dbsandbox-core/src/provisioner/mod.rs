//! Sandbox provisioning and disposal.
//!
//! The provisioner copies a set of source tables into the sandbox database:
//! structure first, then all rows or a bounded sample in batches. The
//! sandbox database is owned outright, so disposal wipes every table, view
//! and sequence in it rather than only the tables this session created.
//!
//! # State Machine
//! `Idle → Provisioning → Ready → Disposing → Idle`. A failure while
//! provisioning runs disposal before the original error is returned.

mod plan;

pub use plan::{
    RowSelection, distinct_tables, effective_batch_size, plan_batches, retarget_ddl,
    sandbox_table_name,
};

use crate::adapters::SqlConnection;
use crate::config::{NamingPolicy, SandboxConfig};
use crate::mapper::NameMapper;
use crate::models::{DisposalReport, ProvisionSummary, TableDescriptor};
use crate::{Dialect, Result, error::SandboxError};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::{Instrument, Span};

/// Lifecycle state of a [`Provisioner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerState {
    Idle,
    Provisioning,
    Ready,
    Disposing,
}

impl fmt::Display for ProvisionerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Ready => write!(f, "ready"),
            Self::Disposing => write!(f, "disposing"),
        }
    }
}

/// Copies source tables into a sandbox and tears the sandbox down again.
pub struct Provisioner {
    source: Box<dyn SqlConnection>,
    sandbox: Box<dyn SqlConnection>,
    config: SandboxConfig,
    mapper: NameMapper,
    state: ProvisionerState,
    summary: Option<ProvisionSummary>,
    span: Span,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("source", self.source.config())
            .field("sandbox", self.sandbox.config())
            .field("state", &self.state)
            .field("tables", &self.mapper.len())
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Creates a provisioner over two opened connections.
    ///
    /// # Errors
    /// Returns a configuration error if the options are invalid or the two
    /// connections speak different dialects
    pub fn new(
        source: Box<dyn SqlConnection>,
        sandbox: Box<dyn SqlConnection>,
        config: SandboxConfig,
    ) -> Result<Self> {
        config.validate()?;
        if source.dialect() != sandbox.dialect() {
            return Err(SandboxError::configuration(format!(
                "source ({}) and sandbox ({}) must use the same dialect",
                source.dialect(),
                sandbox.dialect()
            )));
        }

        Ok(Self {
            source,
            sandbox,
            config,
            mapper: NameMapper::new(),
            state: ProvisionerState::Idle,
            summary: None,
            span: Span::none(),
        })
    }

    /// Sets the span provisioning and disposal events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> ProvisionerState {
        self.state
    }

    pub fn dialect(&self) -> Dialect {
        self.sandbox.dialect()
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn mapper(&self) -> &NameMapper {
        &self.mapper
    }

    /// Summary of the current provisioning, while `Ready`.
    pub fn summary(&self) -> Option<&ProvisionSummary> {
        self.summary.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut dyn SqlConnection {
        self.source.as_mut()
    }

    pub fn sandbox_mut(&mut self) -> &mut dyn SqlConnection {
        self.sandbox.as_mut()
    }

    /// Copies `tables` from the source into the sandbox.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the provisioner is idle. Any other
    /// failure (`TableNotFound`, `DdlExtraction`, `BatchInsert`, ...) is
    /// returned after the sandbox has been wiped.
    pub async fn provision(&mut self, tables: &[String]) -> Result<ProvisionSummary> {
        if self.state != ProvisionerState::Idle {
            return Err(SandboxError::invalid_state("provision", self.state));
        }

        let span = self.span.clone();
        async {
            self.state = ProvisionerState::Provisioning;
            let started = Instant::now();
            tracing::info!(tables = tables.len(), "Provisioning sandbox");

            match self.provision_tables(tables).await {
                Ok(summary) => {
                    self.state = ProvisionerState::Ready;
                    tracing::info!(
                        tables = summary.tables.len(),
                        rows = summary.total_copied_rows(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Sandbox ready"
                    );
                    self.summary = Some(summary.clone());
                    Ok(summary)
                }
                Err(error) => {
                    tracing::error!(error = %error, "Provisioning failed, wiping sandbox");
                    if let Err(cleanup_error) = self.wipe().await {
                        tracing::warn!(error = %cleanup_error, "Cleanup after failed provisioning also failed");
                    }
                    self.state = ProvisionerState::Idle;
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Wipes the sandbox and clears the name mapping.
    ///
    /// Individual drop failures are logged and reported but do not stop the
    /// sweep. Calling this on an idle provisioner does nothing.
    ///
    /// # Errors
    /// Returns `InvalidState` while provisioning, or `Disposal` when the
    /// sandbox objects cannot even be listed
    pub async fn dispose(&mut self) -> Result<DisposalReport> {
        match self.state {
            ProvisionerState::Idle => return Ok(DisposalReport::default()),
            ProvisionerState::Provisioning | ProvisionerState::Disposing => {
                return Err(SandboxError::invalid_state("dispose", self.state));
            }
            ProvisionerState::Ready => {}
        }

        let span = self.span.clone();
        async {
            self.state = ProvisionerState::Disposing;
            let result = self.wipe().await;
            self.state = ProvisionerState::Idle;
            result
        }
        .instrument(span)
        .await
    }

    /// Wipes the sandbox regardless of state, for leftovers of an earlier run.
    ///
    /// # Errors
    /// Returns `InvalidState` unless idle
    pub async fn reset(&mut self) -> Result<DisposalReport> {
        if self.state != ProvisionerState::Idle {
            return Err(SandboxError::invalid_state("reset", self.state));
        }
        let span = self.span.clone();
        self.wipe().instrument(span).await
    }

    /// Closes both connections.
    ///
    /// # Errors
    /// Returns the first close failure; both connections are always attempted
    pub async fn close(&mut self) -> Result<()> {
        let source = self.source.close().await;
        let sandbox = self.sandbox.close().await;
        source.and(sandbox)
    }

    async fn provision_tables(&mut self, tables: &[String]) -> Result<ProvisionSummary> {
        // Source tables may have changed since the previous provisioning
        self.source.forget_metadata();
        self.sandbox.forget_metadata();

        if self.config.reset_on_provision {
            let report = self.wipe().await?;
            if report.objects_found > 0 {
                tracing::info!(objects = report.objects_dropped, "Removed leftover sandbox objects");
            }
        }

        let tables = distinct_tables(tables);
        self.sandbox.set_foreign_key_checks(false).await?;
        let result = self.copy_tables(&tables).await;
        let restored = self.sandbox.set_foreign_key_checks(true).await;

        let summary = result?;
        restored?;
        Ok(summary)
    }

    async fn copy_tables(&mut self, tables: &[String]) -> Result<ProvisionSummary> {
        let mut summary = ProvisionSummary::default();
        let mut taken: HashSet<String> = HashSet::new();
        if self.config.naming == NamingPolicy::Suffix {
            taken.extend(
                self.sandbox
                    .list_objects()
                    .await?
                    .into_iter()
                    .map(|object| object.name.to_lowercase()),
            );
        }

        for table in tables {
            let sandbox_name = sandbox_table_name(table, self.config.naming, |name| {
                taken.contains(&name.to_lowercase())
            });
            taken.insert(sandbox_name.to_lowercase());

            let descriptor = self.copy_table(table, &sandbox_name).await?;
            self.mapper.add_mapping(table, &sandbox_name)?;
            summary.tables.push(descriptor);
        }
        Ok(summary)
    }

    async fn copy_table(&mut self, table: &str, sandbox_name: &str) -> Result<TableDescriptor> {
        let dialect = self.source.dialect();
        let started = Instant::now();

        if !self.source.table_exists(table).await? {
            return Err(SandboxError::TableNotFound {
                table: table.to_string(),
            });
        }
        let source_rows = self.source.row_count(table).await?;
        let selection = RowSelection::for_table(source_rows, &self.config);

        let mut ddl = self.source.create_table_ddl(table).await?;
        if self.config.naming == NamingPolicy::Suffix {
            ddl = retarget_ddl(&ddl, dialect, table, sandbox_name)?;
        }
        self.sandbox.execute(&ddl, false).await?;

        let select = selection.select_sql(dialect, table);
        let data = self.source.fetch_rows(table, &select).await?;

        let batch_size = effective_batch_size(
            dialect,
            self.config.batch_size,
            data.columns.len(),
            data.rows.first(),
        );
        let batches = plan_batches(data.len(), batch_size);

        let mut copied_rows = 0u64;
        let mut offset = 0usize;
        for (index, &rows) in batches.iter().enumerate() {
            let chunk = &data.rows[offset..offset + rows];
            let inserted = self
                .sandbox
                .insert_rows(sandbox_name, &data.columns, chunk)
                .await
                .map_err(|e| SandboxError::BatchInsert {
                    table: sandbox_name.to_string(),
                    batch: index + 1,
                    rows,
                    source: Box::new(e),
                })?;
            copied_rows += inserted;
            offset += rows;
            tracing::debug!(table = sandbox_name, batch = index + 1, rows, "Batch inserted");
        }

        self.sandbox.finalize_table(sandbox_name).await?;

        tracing::info!(
            table,
            sandbox_table = sandbox_name,
            source_rows,
            rows = copied_rows,
            sampled = selection.is_sampled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Table provisioned"
        );

        Ok(TableDescriptor {
            original: table.to_string(),
            sandbox_name: sandbox_name.to_string(),
            source_rows,
            is_sampled: selection.is_sampled(),
            copied_rows,
            batches,
        })
    }

    /// Drops every object in the sandbox schema and clears the mapper.
    async fn wipe(&mut self) -> Result<DisposalReport> {
        self.mapper.clear();
        self.summary = None;

        let mut objects = self.sandbox.list_objects().await?;
        objects.sort_by_key(|object| Dialect::drop_rank(object.kind));

        let mut report = DisposalReport {
            objects_found: objects.len(),
            ..DisposalReport::default()
        };
        if objects.is_empty() {
            return Ok(report);
        }

        let dialect = self.sandbox.dialect();
        if let Err(e) = self.sandbox.set_foreign_key_checks(false).await {
            tracing::warn!(error = %e, "Could not disable foreign key checks before wipe");
        }

        for object in &objects {
            let statement = dialect.drop_statement(object);
            match self.sandbox.execute(&statement, false).await {
                Ok(_) => {
                    report.objects_dropped += 1;
                    tracing::debug!(object = %object.name, kind = %object.kind, "Dropped");
                }
                Err(e) => {
                    tracing::warn!(object = %object.name, kind = %object.kind, error = %e, "Drop failed");
                    report.failures.push((object.name.clone(), e.to_string()));
                }
            }
        }

        if let Err(e) = self.sandbox.set_foreign_key_checks(true).await {
            tracing::warn!(error = %e, "Could not re-enable foreign key checks after wipe");
        }

        tracing::info!(
            found = report.objects_found,
            dropped = report.objects_dropped,
            failed = report.failures.len(),
            "Sandbox wiped"
        );
        Ok(report)
    }
}
