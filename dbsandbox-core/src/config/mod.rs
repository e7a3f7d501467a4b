//! Configuration types.
//!
//! - `ConnectionConfig`: one side of a session (source or sandbox)
//! - `SandboxConfig`: provisioning options
//! - `AppConfig`: the `dbsandbox.json` file tying both together
//!
//! # Security
//! Connection configs never store passwords. Passwords resolved from the
//! configuration file are handed out as [`crate::security::Credentials`].

mod connection;
mod file;
mod sandbox;

pub use connection::ConnectionConfig;
pub use file::{AppConfig, DatabaseProfile, ResolvedConfig, ResolvedProfile};
pub use sandbox::{NamingPolicy, SamplingParams, SamplingStrategy, SandboxConfig};
