//! Dialect-specific rendering of common SQL functions.
//!
//! The engines disagree on the spelling of everyday scalar functions; this
//! secondary builder keeps those differences behind the same [`Dialect`]
//! enum the statement builder uses. The rendered text is meant to be used
//! inside raw select expressions or raw conditions.

use crate::sql::Dialect;

/// A scalar SQL function with dialect-dependent spelling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlFunction {
    /// Current timestamp.
    Now,
    /// A pseudo-random number.
    Random,
    /// String concatenation of the given expressions.
    Concat(Vec<String>),
    /// Character length of an expression.
    Length(String),
    /// First non-null expression.
    Coalesce(Vec<String>),
    /// Extract a value from a JSON column at the given path, e.g. `$.a.b`.
    JsonExtract { column: String, path: String },
}

impl SqlFunction {
    /// Render this function for the given dialect.
    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            Self::Now => match dialect {
                Dialect::MySql => "NOW()".to_string(),
                Dialect::Postgres => "NOW()".to_string(),
                Dialect::Sqlite => "CURRENT_TIMESTAMP".to_string(),
                Dialect::SqlServer => "GETDATE()".to_string(),
            },
            Self::Random => match dialect {
                Dialect::MySql => "RAND()".to_string(),
                Dialect::Postgres => "RANDOM()".to_string(),
                Dialect::Sqlite => "RANDOM()".to_string(),
                Dialect::SqlServer => "NEWID()".to_string(),
            },
            Self::Concat(parts) => match dialect {
                Dialect::MySql => format!("CONCAT({})", parts.join(", ")),
                // Standard || operator
                Dialect::Postgres | Dialect::Sqlite => parts.join(" || "),
                Dialect::SqlServer => format!("CONCAT({})", parts.join(", ")),
            },
            Self::Length(expr) => match dialect {
                Dialect::MySql => format!("CHAR_LENGTH({})", expr),
                Dialect::Postgres | Dialect::Sqlite => format!("LENGTH({})", expr),
                Dialect::SqlServer => format!("LEN({})", expr),
            },
            Self::Coalesce(parts) => format!("COALESCE({})", parts.join(", ")),
            Self::JsonExtract { column, path } => {
                let col = dialect.quote_identifier(column);
                match dialect {
                    Dialect::MySql => format!("JSON_EXTRACT({}, '{}')", col, path),
                    Dialect::Postgres => {
                        // jsonb path operator; `$.a.b` becomes `{a,b}`
                        let segments: Vec<&str> = path
                            .trim_start_matches('$')
                            .split('.')
                            .filter(|s| !s.is_empty())
                            .collect();
                        format!("{} #>> '{{{}}}'", col, segments.join(","))
                    }
                    Dialect::Sqlite => format!("json_extract({}, '{}')", col, path),
                    Dialect::SqlServer => format!("JSON_VALUE({}, '{}')", col, path),
                }
            }
        }
    }
}
