//! The SELECT builder.

use crate::error::DbResult;
use crate::models::{
    ColumnSpec, Join, JoinKind, Operation, OrderDir, QueryDescriptor, QueryResult,
};
use crate::sql;
use serde_json::Map;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use super::{QueryContext, cache_key, impl_condition_methods};

/// Fluent SELECT. Construct through [`crate::Database::select`].
pub struct SelectQuery {
    pub(crate) ctx: QueryContext,
    pub(crate) descriptor: QueryDescriptor,
    /// Logical table name as given; resolved at terminal time.
    logical_table: String,
    logical_joins: Vec<Join>,
    ttl: Option<Duration>,
    use_cache: bool,
}

impl SelectQuery {
    pub(crate) fn new(ctx: QueryContext, table: impl Into<String>) -> Self {
        let logical_table = table.into();
        Self {
            descriptor: QueryDescriptor::new(Operation::Select, ""),
            logical_table,
            logical_joins: Vec::new(),
            ttl: None,
            use_cache: true,
            ctx,
        }
    }

    /// Select a single column or raw expression.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.descriptor.columns = ColumnSpec::Named(column.into());
        self
    }

    /// Select an explicit column list.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.descriptor.columns = ColumnSpec::List(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Join another table. The name is logical and goes through the same
    /// resolution as the main table; the ON expression is raw SQL.
    pub fn join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        on: impl Into<String>,
    ) -> Self {
        self.logical_joins.push(Join {
            kind,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, dir: OrderDir) -> Self {
        self.descriptor.ordering.push((column.into(), dir));
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.descriptor.grouping.push(column.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.descriptor.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.descriptor.offset = Some(offset);
        self
    }

    /// Cache this select's result for the given TTL instead of the
    /// manager-wide default.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Bypass the query cache for this select only.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Resolve table names and render the final SQL without executing it.
    pub fn to_sql(&self) -> (String, Vec<crate::models::SqlValue>) {
        let descriptor = self.resolved_descriptor();
        sql::build(&descriptor, self.ctx.conn.dialect())
    }

    fn resolved_descriptor(&self) -> QueryDescriptor {
        let tables = self.ctx.conn.tables();
        let mut descriptor = self.descriptor.clone();
        descriptor.table = tables.resolve(&self.logical_table);
        descriptor.joins = self
            .logical_joins
            .iter()
            .map(|join| Join {
                kind: join.kind,
                table: tables.resolve(&join.table),
                on: join.on.clone(),
            })
            .collect();
        descriptor
    }

    /// Execute and return every row.
    ///
    /// The cache is bypassed entirely while a transaction is open on the
    /// connection: uncommitted rows must never be stored, and a pre-existing
    /// entry must not hide the transaction's own writes.
    pub async fn fetch_all(self) -> DbResult<QueryResult> {
        let descriptor = self.resolved_descriptor();
        let (sql, params) = sql::build(&descriptor, self.ctx.conn.dialect());

        if self.use_cache && !self.ctx.conn.in_transaction().await {
            if let Some(handle) = &self.ctx.cache {
                let key = cache_key(&self.ctx.conn, &descriptor.table, &sql, &params);
                if let Some(hit) = handle.store.get(&key) {
                    debug!(key = %key, "Query cache hit");
                    return Ok(hit);
                }
                let result = self
                    .ctx
                    .conn
                    .fetch_rows(&sql, &params)
                    .await
                    .map_err(|e| e.with_statement(&sql, &params))?;
                let ttl = self.ttl.unwrap_or(handle.default_ttl);
                handle.store.set(&key, result.clone(), ttl);
                return Ok(result);
            }
        }

        self.ctx
            .conn
            .fetch_rows(&sql, &params)
            .await
            .map_err(|e| e.with_statement(&sql, &params))
    }

    /// Execute with `LIMIT 1` and return the first row, if any.
    pub async fn first(mut self) -> DbResult<Option<Map<String, JsonValue>>> {
        self.descriptor.limit = Some(1);
        Ok(self.fetch_all().await?.into_first())
    }
}

impl_condition_methods!(SelectQuery);

impl std::fmt::Debug for SelectQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectQuery")
            .field("table", &self.logical_table)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
