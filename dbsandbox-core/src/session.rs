//! One sandbox session: provisioning, fixtures and gateway calls.
//!
//! A session owns both connections through its [`Provisioner`]. It lives
//! from provisioning until disposal, and every event it emits is recorded
//! under a `sandbox_session` span carrying the session id.

use crate::adapters::connect;
use crate::config::ResolvedConfig;
use crate::gateway::{Fixtures, SandboxGateway, SqlTool};
use crate::models::{DisposalReport, ProvisionSummary};
use crate::provisioner::Provisioner;
use crate::Result;
use async_trait::async_trait;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// A provisioner plus the fixtures wrapped around every gateway call.
#[derive(Debug)]
pub struct SandboxSession {
    id: Uuid,
    provisioner: Provisioner,
    fixtures: Fixtures,
    span: Span,
}

impl SandboxSession {
    /// Wraps an existing provisioner.
    pub fn new(provisioner: Provisioner) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("sandbox_session", session_id = %id);
        Self {
            id,
            provisioner: provisioner.with_span(span.clone()),
            fixtures: Fixtures::default(),
            span,
        }
    }

    /// Connects both sides of a resolved configuration.
    ///
    /// # Errors
    /// Returns the first connection failure; a source connection that was
    /// already open is closed again
    pub async fn open(config: &ResolvedConfig) -> Result<Self> {
        let source = connect(
            config.source.config.clone(),
            config.source.credentials.clone(),
        )
        .await?;
        tracing::info!(source = %config.source.config, "Connected to source database");

        let sandbox = match connect(
            config.sandbox.config.clone(),
            config.sandbox.credentials.clone(),
        )
        .await
        {
            Ok(sandbox) => sandbox,
            Err(error) => {
                let mut source = source;
                if let Err(close_error) = source.close().await {
                    tracing::warn!(error = %close_error, "Failed to close source connection");
                }
                return Err(error);
            }
        };
        tracing::info!(sandbox = %config.sandbox.config, "Connected to sandbox database");

        let provisioner = Provisioner::new(source, sandbox, config.provisioning.clone())?;
        Ok(Self::new(provisioner))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut Provisioner {
        &mut self.provisioner
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    /// Registers SQL run before every gateway call.
    pub fn register_preprocess_sql(&mut self, sql: impl Into<String>) {
        if self.fixtures.preprocess_sql.is_some() {
            tracing::warn!(parent: &self.span, "Replacing registered preprocess SQL");
        }
        self.fixtures.preprocess_sql = Some(sql.into());
    }

    /// Registers SQL run after every gateway call.
    pub fn register_clean_up_sql(&mut self, sql: impl Into<String>) {
        if self.fixtures.clean_up_sql.is_some() {
            tracing::warn!(parent: &self.span, "Replacing registered clean-up SQL");
        }
        self.fixtures.clean_up_sql = Some(sql.into());
    }

    /// See [`Provisioner::provision`].
    ///
    /// # Errors
    /// Same as [`Provisioner::provision`]
    pub async fn provision(&mut self, tables: &[String]) -> Result<ProvisionSummary> {
        self.provisioner.provision(tables).await
    }

    /// Gateway over this session's sandbox and fixtures.
    pub fn gateway(&mut self) -> SandboxGateway<'_> {
        SandboxGateway::new(&mut self.provisioner, &self.fixtures)
    }

    /// Runs caller SQL through the gateway. Never fails.
    pub async fn execute_sql(&mut self, sql: &str) -> String {
        let span = self.span.clone();
        self.gateway().execute_sql(sql).instrument(span).await
    }

    /// See [`Provisioner::dispose`].
    ///
    /// # Errors
    /// Same as [`Provisioner::dispose`]
    pub async fn dispose(&mut self) -> Result<DisposalReport> {
        self.provisioner.dispose().await
    }

    /// Disposes the sandbox and closes both connections.
    ///
    /// The connections are closed even when disposal fails.
    ///
    /// # Errors
    /// Returns the disposal error, or else the first close error
    pub async fn close(mut self) -> Result<DisposalReport> {
        let disposed = self.provisioner.dispose().await;
        let closed = self.provisioner.close().await;
        tracing::info!(parent: &self.span, "Session closed");
        let report = disposed?;
        closed?;
        Ok(report)
    }
}

#[async_trait]
impl SqlTool for SandboxSession {
    async fn call(&mut self, sql: &str) -> String {
        self.execute_sql(sql).await
    }
}
