//! The UPDATE builder.

use crate::error::{DbResult, Error};
use crate::models::{Operation, QueryDescriptor, SqlValue};
use crate::sql;

use super::{QueryContext, impl_condition_methods, invalidate_table};

/// Fluent UPDATE. Construct through [`crate::Database::update`].
///
/// An update with no conditions updates every row; narrowing is the
/// caller's responsibility.
pub struct UpdateQuery {
    pub(crate) ctx: QueryContext,
    pub(crate) descriptor: QueryDescriptor,
    logical_table: String,
}

impl UpdateQuery {
    pub(crate) fn new(ctx: QueryContext, table: impl Into<String>) -> Self {
        Self {
            descriptor: QueryDescriptor::new(Operation::Update, ""),
            logical_table: table.into(),
            ctx,
        }
    }

    /// Assign one column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.descriptor.values.push((column.into(), value.into()));
        self
    }

    /// Assign several columns at once.
    pub fn set_all<C, V>(mut self, pairs: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<SqlValue>,
    {
        for (column, value) in pairs {
            self.descriptor.values.push((column.into(), value.into()));
        }
        self
    }

    /// Execute the update and return the affected-row count. Invalidates
    /// every cached select against the table.
    pub async fn execute(self) -> DbResult<u64> {
        if self.descriptor.values.is_empty() {
            return Err(Error::database("UPDATE requires at least one assignment"));
        }
        let mut descriptor = self.descriptor;
        descriptor.table = self.ctx.conn.tables().resolve(&self.logical_table);
        let (sql, params) = sql::build(&descriptor, self.ctx.conn.dialect());

        let affected = self
            .ctx
            .conn
            .execute(&sql, &params)
            .await
            .map_err(|e| e.with_statement(&sql, &params))?;
        invalidate_table(&self.ctx, &descriptor.table);
        Ok(affected)
    }
}

impl_condition_methods!(UpdateQuery);

impl std::fmt::Debug for UpdateQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQuery")
            .field("table", &self.logical_table)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
