//! The INSERT builder.

use crate::error::{DbResult, Error};
use crate::models::{Operation, QueryDescriptor, SqlValue};
use crate::sql;

use super::{QueryContext, invalidate_table};

/// Fluent INSERT. Construct through [`crate::Database::insert`].
pub struct InsertQuery {
    ctx: QueryContext,
    descriptor: QueryDescriptor,
    logical_table: String,
}

impl InsertQuery {
    pub(crate) fn new(ctx: QueryContext, table: impl Into<String>) -> Self {
        Self {
            descriptor: QueryDescriptor::new(Operation::Insert, ""),
            logical_table: table.into(),
            ctx,
        }
    }

    /// Set one column. Order of calls is the column order in the statement.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.descriptor.values.push((column.into(), value.into()));
        self
    }

    /// Set several columns at once.
    pub fn values<C, V>(mut self, pairs: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<SqlValue>,
    {
        for (column, value) in pairs {
            self.descriptor.values.push((column.into(), value.into()));
        }
        self
    }

    /// Execute the insert and return the affected-row count. Invalidates
    /// every cached select against the table.
    pub async fn execute(self) -> DbResult<u64> {
        if self.descriptor.values.is_empty() {
            return Err(Error::database("INSERT requires at least one column"));
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

impl std::fmt::Debug for InsertQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertQuery")
            .field("table", &self.logical_table)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
