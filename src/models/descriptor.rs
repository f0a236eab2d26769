//! The dialect-neutral intermediate representation of a query's intent.
//!
//! A [`QueryDescriptor`] is accumulated by the fluent builders in
//! [`crate::query`] and handed, complete and immutable, to the dialect SQL
//! builder in [`crate::sql`]. One descriptor produces exactly one SQL
//! statement and one ordered parameter list.

use crate::models::SqlValue;

/// The statement class a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

/// Typed column specification for SELECT statements.
///
/// Replaces variadic `select()` argument overloading: the caller-facing API
/// constructs one of these before the descriptor is built, so normalization
/// is deterministic and independent of call style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// `*`
    All,
    /// A single column or raw select expression.
    Named(String),
    /// An explicit column list.
    List(Vec<String>),
}

impl ColumnSpec {
    /// True when every column is selected.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self::All
    }
}

/// Comparison operators available to simple conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    /// The SQL spelling of this operator (identical across dialects).
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// How a condition combines with the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// One WHERE clause term.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column <op> ?`
    Compare {
        conjunction: Conjunction,
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    /// `column IS NULL` / `column IS NOT NULL`
    Null {
        conjunction: Conjunction,
        column: String,
        negated: bool,
    },
    /// `column IN (?, ?, ...)` / `column NOT IN (...)`
    In {
        conjunction: Conjunction,
        column: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    /// Raw SQL fragment with its own positional parameters.
    Raw {
        conjunction: Conjunction,
        sql: String,
        params: Vec<SqlValue>,
    },
}

impl Condition {
    pub fn conjunction(&self) -> Conjunction {
        match self {
            Self::Compare { conjunction, .. }
            | Self::Null { conjunction, .. }
            | Self::In { conjunction, .. }
            | Self::Raw { conjunction, .. } => *conjunction,
        }
    }
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// One JOIN clause. The table name is logical; terminals resolve it to a
/// physical name before SQL generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    /// Raw ON expression, e.g. `"orders"."user_id" = "users"."id"`.
    pub on: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The complete intent of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub operation: Operation,
    /// Physical table name by the time the SQL builder sees it.
    pub table: String,
    pub columns: ColumnSpec,
    /// Column/value pairs for INSERT and UPDATE, in insertion order.
    pub values: Vec<(String, SqlValue)>,
    pub conditions: Vec<Condition>,
    pub joins: Vec<Join>,
    pub ordering: Vec<(String, OrderDir)>,
    pub grouping: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryDescriptor {
    /// Create a descriptor for the given operation and table.
    pub fn new(operation: Operation, table: impl Into<String>) -> Self {
        Self {
            operation,
            table: table.into(),
            columns: ColumnSpec::All,
            values: Vec::new(),
            conditions: Vec::new(),
            joins: Vec::new(),
            ordering: Vec::new(),
            grouping: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_spec_default_is_all() {
        assert!(ColumnSpec::default().is_all());
    }

    #[test]
    fn test_compare_op_sql() {
        assert_eq!(CompareOp::Eq.as_sql(), "=");
        assert_eq!(CompareOp::Like.as_sql(), "LIKE");
    }

    #[test]
    fn test_descriptor_starts_unfiltered() {
        let d = QueryDescriptor::new(Operation::Select, "users");
        assert!(d.conditions.is_empty());
        assert!(d.limit.is_none());
    }
}
