//! SQL dialect identities.
//!
//! A closed enum with exhaustive matching at the builder boundary: adding a
//! dialect is a compile-time-checked enumeration change, and no component
//! outside [`crate::sql`] branches on dialect for text generation.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Includes MariaDB
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
}

impl Dialect {
    /// Parse a dialect from a configured driver name.
    ///
    /// Accepts the common aliases used by legacy configuration files.
    pub fn from_driver_name(name: &str) -> Result<Self, Error> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mysqli" | "mariadb" => Ok(Self::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mssql" | "sqlsrv" | "sqlserver" => Ok(Self::SqlServer),
            other => Err(Error::configuration(format!(
                "Unknown database driver '{}'",
                other
            ))),
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
            Self::SqlServer => "SQL Server",
        }
    }

    /// Get the default port for this dialect's native server.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
            Self::SqlServer => Some(1433),
        }
    }

    /// Quote a single identifier (table or column name) for this dialect.
    ///
    /// A `*` passes through unquoted. Embedded quote characters are doubled.
    pub fn quote_identifier(&self, ident: &str) -> String {
        if ident == "*" {
            return ident.to_string();
        }
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::SqlServer => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    /// Render the placeholder for the `index`-th parameter (1-based).
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::MySql | Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${}", index),
            Self::SqlServer => format!("@p{}", index),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_driver_name_aliases() {
        assert_eq!(Dialect::from_driver_name("mysql").unwrap(), Dialect::MySql);
        assert_eq!(
            Dialect::from_driver_name("mariadb").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::from_driver_name("pgsql").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_driver_name("PostgreSQL").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_driver_name("sqlite3").unwrap(),
            Dialect::Sqlite
        );
        assert_eq!(
            Dialect::from_driver_name("sqlsrv").unwrap(),
            Dialect::SqlServer
        );
        assert!(Dialect::from_driver_name("oracle").is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::Sqlite.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::SqlServer.quote_identifier("users"), "[users]");
        assert_eq!(Dialect::MySql.quote_identifier("*"), "*");
    }

    #[test]
    fn test_quote_identifier_escapes_embedded_quotes() {
        assert_eq!(Dialect::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::SqlServer.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_placeholder_styles() {
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::Sqlite.placeholder(1), "?");
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::SqlServer.placeholder(2), "@p2");
    }
}
