//! Secure credential container with automatic memory zeroing.
//!
//! # Security
//! - Credentials are stored in `Zeroizing<T>` containers
//! - Memory is automatically cleared when credentials go out of scope
//! - Passwords are never exposed in debug output or logs

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Username and optional password for one connection.
///
/// # Example
///
/// ```rust
/// use dbsandbox_core::security::Credentials;
///
/// let creds = Credentials::new("admin".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "admin");
/// assert!(creds.has_password());
/// assert!(!format!("{creds:?}").contains("secret"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if a password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Borrows the password for handing it to a driver.
    ///
    /// Callers must not log, format or store the returned value.
    pub fn expose_password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Replaces the password, zeroing the previous one.
    pub fn set_password(&mut self, password: String) {
        self.password.zeroize();
        *self.password = Some(password);
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username())
            .field("password", &self.has_password().then_some("****"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("testuser".to_string(), Some("testpass".to_string()));
        assert_eq!(creds.username(), "testuser");
        assert!(creds.has_password());
        assert_eq!(creds.expose_password(), Some("testpass"));
    }

    #[test]
    fn test_credentials_no_password() {
        let creds = Credentials::new("testuser".to_string(), None);
        assert!(!creds.has_password());
        assert_eq!(creds.expose_password(), None);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let creds = Credentials::new("svc".to_string(), Some("hunter2".to_string()));
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("svc"));
        assert!(rendered.contains("****"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_credential_set_password() {
        let mut creds = Credentials::new("svc".to_string(), None);
        creds.set_password("prompted".to_string());
        assert_eq!(creds.expose_password(), Some("prompted"));
    }
}
