//! Fluent query builders.
//!
//! Each builder accumulates a [`crate::models::QueryDescriptor`] and, at its
//! terminal method, resolves logical table names, renders dialect SQL, runs
//! the statement, and maintains the query cache: selects consult it, writes
//! invalidate every cached select for the touched table.
//!
//! Builder methods never touch the connection; all I/O and all fallibility
//! live in the terminals.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use select::SelectQuery;
pub use update::UpdateQuery;

use crate::db::{CacheHandle, Connection};
use crate::models::SqlValue;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Execution context handed to every builder: the connection to run on and
/// the cache installed on the manager, if any.
#[derive(Clone)]
pub(crate) struct QueryContext {
    pub conn: Arc<Connection>,
    pub cache: Option<CacheHandle>,
}

/// Cache key for one rendered select: connection, physical table, and a
/// hash of the SQL text plus parameters. The table segment is what write
/// invalidation matches on.
pub(crate) fn cache_key(
    conn: &Connection,
    physical_table: &str,
    sql: &str,
    params: &[SqlValue],
) -> String {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    format!("{:?}", params).hash(&mut hasher);
    format!(
        "{}:{}:{:016x}",
        conn.name(),
        physical_table,
        hasher.finish()
    )
}

/// The prefix shared by every cached select against one table.
pub(crate) fn invalidation_prefix(conn: &Connection, physical_table: &str) -> String {
    format!("{}:{}:", conn.name(), physical_table)
}

/// Drop every cached select for the given table. Called by write terminals
/// after a successful execute.
pub(crate) fn invalidate_table(ctx: &QueryContext, physical_table: &str) {
    if let Some(handle) = &ctx.cache {
        handle
            .store
            .invalidate(&invalidation_prefix(&ctx.conn, physical_table));
    }
}

/// Generates the WHERE-clause methods shared by the filterable builders.
/// The descriptor field is named `descriptor` in each of them.
macro_rules! impl_condition_methods {
    ($builder:ty) => {
        impl $builder {
            /// Add an AND `column = value` condition.
            pub fn where_eq(
                mut self,
                column: impl Into<String>,
                value: impl Into<$crate::models::SqlValue>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Compare {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        op: $crate::models::CompareOp::Eq,
                        value: value.into(),
                    });
                self
            }

            /// Add an AND condition with an explicit operator.
            pub fn where_op(
                mut self,
                column: impl Into<String>,
                op: $crate::models::CompareOp,
                value: impl Into<$crate::models::SqlValue>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Compare {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        op,
                        value: value.into(),
                    });
                self
            }

            /// Add an OR `column = value` condition.
            pub fn or_where_eq(
                mut self,
                column: impl Into<String>,
                value: impl Into<$crate::models::SqlValue>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Compare {
                        conjunction: $crate::models::Conjunction::Or,
                        column: column.into(),
                        op: $crate::models::CompareOp::Eq,
                        value: value.into(),
                    });
                self
            }

            /// Add an OR condition with an explicit operator.
            pub fn or_where_op(
                mut self,
                column: impl Into<String>,
                op: $crate::models::CompareOp,
                value: impl Into<$crate::models::SqlValue>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Compare {
                        conjunction: $crate::models::Conjunction::Or,
                        column: column.into(),
                        op,
                        value: value.into(),
                    });
                self
            }

            /// Add an AND `column IS NULL` condition.
            pub fn where_null(mut self, column: impl Into<String>) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Null {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        negated: false,
                    });
                self
            }

            /// Add an AND `column IS NOT NULL` condition.
            pub fn where_not_null(mut self, column: impl Into<String>) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Null {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        negated: true,
                    });
                self
            }

            /// Add an AND `column IN (...)` condition.
            pub fn where_in<V: Into<$crate::models::SqlValue>>(
                mut self,
                column: impl Into<String>,
                values: impl IntoIterator<Item = V>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::In {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        values: values.into_iter().map(Into::into).collect(),
                        negated: false,
                    });
                self
            }

            /// Add an AND `column NOT IN (...)` condition.
            pub fn where_not_in<V: Into<$crate::models::SqlValue>>(
                mut self,
                column: impl Into<String>,
                values: impl IntoIterator<Item = V>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::In {
                        conjunction: $crate::models::Conjunction::And,
                        column: column.into(),
                        values: values.into_iter().map(Into::into).collect(),
                        negated: true,
                    });
                self
            }

            /// Add a raw AND condition. `?` markers bind the given
            /// parameters positionally, in any dialect.
            pub fn where_raw(
                mut self,
                sql: impl Into<String>,
                params: impl IntoIterator<Item = $crate::models::SqlValue>,
            ) -> Self {
                self.descriptor
                    .conditions
                    .push($crate::models::Condition::Raw {
                        conjunction: $crate::models::Conjunction::And,
                        sql: sql.into(),
                        params: params.into_iter().collect(),
                    });
                self
            }
        }
    };
}

pub(crate) use impl_condition_methods;
