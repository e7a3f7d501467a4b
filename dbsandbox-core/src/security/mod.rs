//! Security utilities for credential protection.
//!
//! # Security Guarantees
//! - Credentials are stored in `Zeroizing` containers for automatic memory clearing
//! - Connection URLs are parsed so the password never reaches `ConnectionConfig`
//! - All sensitive data is redacted from logs and error messages
//!
//! # Module Structure
//! - `credentials`: Secure credential container with automatic memory zeroing
//! - `connection`: Connection URL parsing and credential extraction

mod connection;
mod credentials;

pub use connection::parse_connection_url;
pub use credentials::Credentials;
