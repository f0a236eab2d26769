//! The DELETE builder.

use crate::error::DbResult;
use crate::models::{Operation, QueryDescriptor};
use crate::sql;

use super::{QueryContext, impl_condition_methods, invalidate_table};

/// Fluent DELETE. Construct through [`crate::Database::delete`].
///
/// A delete with no conditions deletes every row; narrowing is the
/// caller's responsibility.
pub struct DeleteQuery {
    pub(crate) ctx: QueryContext,
    pub(crate) descriptor: QueryDescriptor,
    logical_table: String,
}

impl DeleteQuery {
    pub(crate) fn new(ctx: QueryContext, table: impl Into<String>) -> Self {
        Self {
            descriptor: QueryDescriptor::new(Operation::Delete, ""),
            logical_table: table.into(),
            ctx,
        }
    }

    /// Execute the delete and return the affected-row count. Invalidates
    /// every cached select against the table.
    pub async fn execute(self) -> DbResult<u64> {
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

impl_condition_methods!(DeleteQuery);

impl std::fmt::Debug for DeleteQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteQuery")
            .field("table", &self.logical_table)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
