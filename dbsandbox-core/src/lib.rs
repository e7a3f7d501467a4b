//! Sandbox provisioning and safe SQL execution for dbsandbox.
//!
//! This crate copies selected tables from a source database into a
//! disposable sandbox database, lets arbitrary SQL (including DDL and
//! writes) run against the copy, and wipes the sandbox afterward.
//!
//! # Security Guarantees
//! - The source connection is opened read-only and only ever read
//! - The sandbox database is owned by the session and wiped on every exit
//!   path, including failed provisioning
//! - Rows are copied with bound parameters, never spliced into SQL text
//! - Credentials are zeroized and never logged or rendered in errors
//!
//! # Architecture
//! - [`adapters`]: one [`SqlConnection`] trait, one driver per dialect
//! - [`mapper`]: original-to-sandbox table names and SQL rewriting
//! - [`provisioner`]: copy-vs-sample decisions, batched transfer, disposal
//! - [`gateway`]: text-in, text-out execution for tool callers
//! - [`session`]: one provisioner plus its fixtures

pub mod adapters;
pub mod config;
pub mod dialect;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod provisioner;
pub mod security;
pub mod session;
pub mod sql_text;

// Re-export commonly used types
pub use adapters::{SqlConnection, connect, create_connection};
pub use config::{AppConfig, ConnectionConfig, NamingPolicy, SamplingStrategy, SandboxConfig};
pub use dialect::Dialect;
pub use error::{Result, SandboxError};
pub use gateway::{Fixtures, SandboxGateway, SqlTool};
pub use mapper::NameMapper;
pub use models::{
    DisposalReport, ProvisionSummary, RowSet, SqlValue, StatementResult, TableDescriptor,
};
pub use provisioner::{Provisioner, ProvisionerState};
pub use session::SandboxSession;
