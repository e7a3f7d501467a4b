//! Provisioning options.
//!
//! Keys accept the short forms used by older configuration files
//! (`copy_thr`), so existing `sandbox` sections load unchanged.

use serde::{Deserialize, Serialize};

/// How rows are chosen when a table is too large to copy in full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Dialect random order plus LIMIT
    #[default]
    Random,
    /// Most recent rows by a time column, newest first
    TimeBased,
}

/// How sandbox tables are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Reuse the source table name
    #[default]
    Preserve,
    /// `<name>_sandbox`, with a numeric suffix on collision
    Suffix,
}

/// Parameters for the sampling strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Column ordered by for `time_based` sampling
    pub time_column: String,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            time_column: "created_at".to_string(),
        }
    }
}

/// Configuration for provisioning a sandbox.
///
/// # Example
/// ```rust
/// use dbsandbox_core::config::{SamplingStrategy, SandboxConfig};
///
/// let config: SandboxConfig = serde_json::from_str(
///     r#"{"copy_thr": 5000, "sampling_strategy": "time_based"}"#,
/// ).unwrap();
///
/// assert_eq!(config.copy_threshold, 5000);
/// assert_eq!(config.sampling_strategy, SamplingStrategy::TimeBased);
/// assert_eq!(config.sampling_params.time_column, "created_at");
/// assert_eq!(config.batch_size, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Tables with at most this many rows are copied in full
    #[serde(alias = "copy_thr")]
    pub copy_threshold: u64,
    /// Row cap for sampled tables
    pub sample_size: u64,
    /// Row selection for tables above the threshold
    pub sampling_strategy: SamplingStrategy,
    /// Strategy parameters
    pub sampling_params: SamplingParams,
    /// Rows per INSERT batch
    pub batch_size: usize,
    /// Sandbox table naming
    pub naming: NamingPolicy,
    /// Wipe leftovers in the sandbox before provisioning
    pub reset_on_provision: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            copy_threshold: 10_000,
            sample_size: 10_000,
            sampling_strategy: SamplingStrategy::Random,
            sampling_params: SamplingParams::default(),
            batch_size: 1000,
            naming: NamingPolicy::Preserve,
            reset_on_provision: true,
        }
    }
}

impl SandboxConfig {
    /// Validates provisioning options.
    ///
    /// # Errors
    /// Returns a configuration error for zero sizes or a missing time column
    pub fn validate(&self) -> crate::Result<()> {
        if self.sample_size == 0 {
            return Err(crate::error::SandboxError::configuration(
                "sample_size must be greater than 0",
            ));
        }

        if self.batch_size == 0 {
            return Err(crate::error::SandboxError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        if self.sampling_strategy == SamplingStrategy::TimeBased
            && self.sampling_params.time_column.trim().is_empty()
        {
            return Err(crate::error::SandboxError::configuration(
                "sampling_params.time_column is required for time_based sampling",
            ));
        }

        Ok(())
    }

    pub fn with_copy_threshold(mut self, threshold: u64) -> Self {
        self.copy_threshold = threshold;
        self
    }

    pub fn with_sample_size(mut self, sample_size: u64) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_sampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.sampling_strategy = strategy;
        self
    }

    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.sampling_params.time_column = column.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_reset_on_provision(mut self, reset: bool) -> Self {
        self.reset_on_provision = reset;
        self
    }
}
