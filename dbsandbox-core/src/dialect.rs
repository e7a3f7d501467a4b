//! SQL dialect differences.
//!
//! Everything that differs between MySQL and PostgreSQL at the text level
//! lives here: identifier quoting, the random function used for sampling,
//! drop statements for disposal and the bind-parameter ceiling. Statement
//! splitting, batching and select building are shared on top of these.

use crate::models::{ObjectKind, SchemaObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl Dialect {
    /// Resolves a connection URL scheme.
    ///
    /// # Example
    /// ```rust
    /// use dbsandbox_core::Dialect;
    ///
    /// assert_eq!(Dialect::from_scheme("postgresql"), Some(Dialect::Postgres));
    /// assert_eq!(Dialect::from_scheme("MySQL"), Some(Dialect::MySql));
    /// assert_eq!(Dialect::from_scheme("sqlite"), None);
    /// ```
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }

    /// Identifier quote character: backtick for MySQL, double quote for PostgreSQL.
    pub fn quote_char(self) -> char {
        match self {
            Self::MySql => '`',
            Self::Postgres => '"',
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    ///
    /// # Example
    /// ```rust
    /// use dbsandbox_core::Dialect;
    ///
    /// assert_eq!(Dialect::MySql.quote_ident("order"), "`order`");
    /// assert_eq!(Dialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
    /// ```
    pub fn quote_ident(self, name: &str) -> String {
        let quote = self.quote_char();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for c in name.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Function producing a random sort key.
    pub fn random_function(self) -> &'static str {
        match self {
            Self::MySql => "RAND()",
            Self::Postgres => "RANDOM()",
        }
    }

    /// Most bind parameters one statement may carry.
    pub fn max_bind_params(self) -> usize {
        match self {
            Self::MySql | Self::Postgres => 65_535,
        }
    }

    /// Statement that removes one object during disposal.
    pub fn drop_statement(self, object: &SchemaObject) -> String {
        let name = self.quote_ident(&object.name);
        match self {
            Self::MySql => format!("DROP {} IF EXISTS {name}", object.kind),
            Self::Postgres => format!("DROP {} IF EXISTS {name} CASCADE", object.kind),
        }
    }

    /// Order in which object kinds are dropped: views, then tables, then sequences.
    pub(crate) fn drop_rank(kind: ObjectKind) -> u8 {
        match kind {
            ObjectKind::View | ObjectKind::MaterializedView => 0,
            ObjectKind::Table | ObjectKind::ForeignTable => 1,
            ObjectKind::Sequence => 2,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
