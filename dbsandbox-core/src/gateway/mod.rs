//! The text-in, text-out SQL execution boundary.
//!
//! Callers such as an automated agent submit free-form SQL and always get a
//! string back. Failures are reported in that string and never returned as
//! errors.

mod format;

pub use format::{NO_STATEMENTS, PREVIEW_ROWS, format_failure, format_results};

use crate::provisioner::{Provisioner, ProvisionerState};
use crate::{Result, error::SandboxError, error::error_chain};
use async_trait::async_trait;

/// A tool callable with one SQL string.
#[async_trait]
pub trait SqlTool: Send {
    /// Name the tool is registered under.
    fn name(&self) -> &'static str {
        "execute_sql"
    }

    /// One-line description for tool listings.
    fn description(&self) -> &'static str {
        "Execute SQL against the sandbox database copy and return the results as text"
    }

    /// Runs `sql` and reports the outcome. Never fails.
    async fn call(&mut self, sql: &str) -> String;
}

/// SQL run around every gateway call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fixtures {
    /// Runs before the caller's SQL; its results are only logged
    pub preprocess_sql: Option<String>,
    /// Runs after the caller's SQL, including after a failure
    pub clean_up_sql: Option<String>,
}

/// Executes caller SQL against a provisioned sandbox.
#[derive(Debug)]
pub struct SandboxGateway<'a> {
    provisioner: &'a mut Provisioner,
    fixtures: &'a Fixtures,
}

impl<'a> SandboxGateway<'a> {
    pub fn new(provisioner: &'a mut Provisioner, fixtures: &'a Fixtures) -> Self {
        Self {
            provisioner,
            fixtures,
        }
    }

    /// Rewrites, executes and formats `sql`.
    ///
    /// Table names are rewritten to their sandbox names first, and the
    /// fixtures (also rewritten) are run around the call. If the
    /// pre-processing SQL succeeded, the clean-up SQL runs even when the
    /// caller's SQL failed; a clean-up failure is appended to the report.
    pub async fn execute_sql(&mut self, sql: &str) -> String {
        if self.provisioner.state() != ProvisionerState::Ready {
            let error = SandboxError::invalid_state("execute SQL", self.provisioner.state());
            return format_failure(&error);
        }

        let fixtures = self.fixtures;
        if let Some(preprocess) = &fixtures.preprocess_sql {
            if let Err(error) = self.run_fixture("preprocess", preprocess).await {
                return format!("{} (preprocess SQL)", format_failure(&error));
            }
        }

        let rewritten = self.rewrite(sql);
        let mut report = match self.provisioner.sandbox_mut().execute(&rewritten, true).await {
            Ok(results) => {
                tracing::debug!(statements = results.len(), "Gateway call succeeded");
                format_results(&results)
            }
            Err(error) => {
                tracing::info!(error = %error, "Gateway call failed");
                format_failure(&error)
            }
        };

        if let Some(clean_up) = &fixtures.clean_up_sql {
            if let Err(error) = self.run_fixture("clean_up", clean_up).await {
                report.push_str("\n\nClean-up SQL failed: ");
                report.push_str(&error_chain(&error));
            }
        }

        report
    }

    fn rewrite(&self, sql: &str) -> String {
        self.provisioner
            .mapper()
            .rewrite(sql, self.provisioner.dialect())
    }

    async fn run_fixture(&mut self, label: &str, sql: &str) -> Result<()> {
        let rewritten = self.rewrite(sql);
        match self.provisioner.sandbox_mut().execute(&rewritten, true).await {
            Ok(results) => {
                tracing::debug!(
                    fixture = label,
                    report = %format_results(&results),
                    "Fixture executed"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(fixture = label, error = %error, "Fixture failed");
                Err(error)
            }
        }
    }
}

#[async_trait]
impl SqlTool for SandboxGateway<'_> {
    async fn call(&mut self, sql: &str) -> String {
        self.execute_sql(sql).await
    }
}
