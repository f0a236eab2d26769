//! Error types for the database access core.
//!
//! Two failure classes exist and they are deliberately distinct:
//!
//! - [`Error::Configuration`] — malformed or missing connection/table
//!   configuration, raised synchronously at configure or resolve time.
//!   Table-mapping and cache-config shape violations surface here.
//! - [`Error::Database`] — wraps any driver-level failure during
//!   prepare/execute/transaction. It carries the offending SQL text and
//!   bound parameters when available, purely for diagnosis; callers never
//!   need them for control flow.

use crate::models::SqlValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        /// The SQL text that failed, when known.
        query: Option<String>,
        /// The parameters bound to the failing statement, when known.
        bindings: Option<Vec<SqlValue>>,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a database error without attached context.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state: None,
            query: None,
            bindings: None,
        }
    }

    /// Attach the failing SQL text and bound parameters to a database error.
    ///
    /// Configuration errors pass through unchanged.
    pub fn with_statement(self, sql: impl Into<String>, params: &[SqlValue]) -> Self {
        match self {
            Self::Database {
                message, sql_state, ..
            } => Self::Database {
                message,
                sql_state,
                query: Some(sql.into()),
                bindings: Some(params.to_vec()),
            },
            other => other,
        }
    }

    /// The SQL text attached to this error, if any.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Database { query, .. } => query.as_deref(),
            _ => None,
        }
    }

    /// The bound parameters attached to this error, if any.
    pub fn bindings(&self) -> Option<&[SqlValue]> {
        match self {
            Self::Database { bindings, .. } => bindings.as_deref(),
            _ => None,
        }
    }

    /// The SQLSTATE code reported by the engine, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// True for configuration-class failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Convert sqlx errors to our taxonomy.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => Error::configuration(msg.to_string()),
            sqlx::Error::Database(db_err) => Error::Database {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
                query: None,
                bindings: None,
            },
            sqlx::Error::RowNotFound => Error::database("No rows returned"),
            sqlx::Error::PoolTimedOut => Error::database("Connection pool acquire timed out"),
            sqlx::Error::PoolClosed => Error::database("Connection pool is closed"),
            sqlx::Error::Io(io_err) => Error::database(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => Error::database(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => Error::database(format!("Protocol error: {}", msg)),
            sqlx::Error::ColumnNotFound(col) => {
                Error::database(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => Error::database(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                Error::database(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => Error::database(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => Error::database("Database worker crashed"),
            _ => Error::database(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("unknown connection 'reports'");
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_with_statement_attaches_context() {
        let err =
            Error::database("syntax error").with_statement("SELECT * FROM t", &[SqlValue::Int(1)]);
        assert_eq!(err.query(), Some("SELECT * FROM t"));
        assert_eq!(err.bindings().unwrap().len(), 1);
    }

    #[test]
    fn test_with_statement_ignores_configuration_errors() {
        let err = Error::configuration("bad config").with_statement("SELECT 1", &[]);
        assert!(err.is_configuration());
        assert!(err.query().is_none());
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_database() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database { .. }));
    }
}
