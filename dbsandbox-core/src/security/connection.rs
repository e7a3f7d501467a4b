//! Connection URL parsing and credential extraction.
//!
//! # Security
//! - Credentials are immediately moved into `Zeroizing` containers
//! - The returned `ConnectionConfig` carries no password
//! - Error messages never echo the URL

use super::credentials::Credentials;
use crate::{ConnectionConfig, Dialect, error::SandboxError};
use percent_encoding::percent_decode_str;
use std::time::Duration;

/// Parses a `mysql://` or `postgres://` URL into a connection config and
/// credentials.
///
/// Recognized query parameters: `connect_timeout` and `statement_timeout`
/// (seconds), `read_only` and `profiling` (`true`/`false`). Others are
/// ignored.
///
/// # Errors
/// Returns a configuration error if the URL, scheme or a parameter is invalid
///
/// # Example
/// ```rust
/// use dbsandbox_core::{Dialect, security::parse_connection_url};
///
/// let (config, creds) = parse_connection_url("postgres://app:pa%40ss@db:6432/shop?read_only=false")?;
/// assert_eq!(config.dialect, Dialect::Postgres);
/// assert_eq!(config.port, Some(6432));
/// assert_eq!(config.database.as_deref(), Some("shop"));
/// assert!(!config.read_only);
/// assert_eq!(creds.expose_password(), Some("pa@ss"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_connection_url(
    connection_string: &str,
) -> crate::Result<(ConnectionConfig, Credentials)> {
    let url = url::Url::parse(connection_string).map_err(|e| {
        SandboxError::configuration(format!("Invalid connection URL format: {e}"))
    })?;

    let dialect = Dialect::from_scheme(url.scheme()).ok_or_else(|| {
        SandboxError::configuration(format!(
            "Unsupported connection URL scheme '{}': use mysql:// or postgres://",
            url.scheme()
        ))
    })?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SandboxError::configuration("Missing host in connection URL"))?;

    let mut config = ConnectionConfig::new(dialect, host.to_string());
    config.port = url.port();

    let database = url.path().trim_start_matches('/');
    if !database.is_empty() {
        config.database = Some(percent_decode(database)?);
    }

    let username = percent_decode(url.username())?;
    if !username.is_empty() {
        config.username = Some(username.clone());
    }
    let password = url.password().map(percent_decode).transpose()?;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "connect_timeout" => {
                config.connect_timeout = Duration::from_secs(parse_param(&key, &value)?);
            }
            "statement_timeout" | "query_timeout" => {
                config.query_timeout = Duration::from_secs(parse_param(&key, &value)?);
            }
            "read_only" => config.read_only = parse_param(&key, &value)?,
            "profiling" => config.enable_profiling = parse_param(&key, &value)?,
            _ => {}
        }
    }

    config.validate()?;
    Ok((config, Credentials::new(username, password)))
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> crate::Result<T> {
    value.parse().map_err(|_| {
        SandboxError::configuration(format!("Invalid value '{value}' for parameter '{key}'"))
    })
}

/// Decodes `%XX` escapes in URL user-info and path components.
fn percent_decode(input: &str) -> crate::Result<String> {
    percent_decode_str(input)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| SandboxError::configuration("Connection URL component is not valid UTF-8"))
}
