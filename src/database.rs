//! The application-facing database facade.
//!
//! A [`Database`] is a cheap, cloneable handle bound to one named
//! connection on a shared [`ConnectionManager`]. It is the construction
//! point for the fluent builders and the home of the transaction helper and
//! the best-effort convenience operations.

use crate::db::ConnectionManager;
use crate::db::connection::Connection;
use crate::error::DbResult;
use crate::models::{QueryResult, SqlValue};
use crate::query::{DeleteQuery, InsertQuery, QueryContext, SelectQuery, UpdateQuery};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// A handle bound to one named connection.
///
/// Clones share the manager; rebinding with [`connection`](Self::connection)
/// produces a new handle and leaves the original untouched.
#[derive(Clone)]
pub struct Database {
    manager: Arc<ConnectionManager>,
    connection_name: String,
}

impl Database {
    /// A handle bound to the `default` connection.
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self::with_connection(manager, "default")
    }

    /// A handle bound to the given connection name. The name is resolved
    /// on first use, not here.
    pub fn with_connection(manager: Arc<ConnectionManager>, name: impl Into<String>) -> Self {
        Self {
            manager,
            connection_name: name.into(),
        }
    }

    /// A new handle on the same manager, bound to another connection.
    pub fn connection(&self, name: impl Into<String>) -> Self {
        Self::with_connection(Arc::clone(&self.manager), name)
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    fn conn(&self) -> DbResult<Arc<Connection>> {
        self.manager.get_connection(&self.connection_name)
    }

    fn ctx(&self) -> DbResult<QueryContext> {
        Ok(QueryContext {
            conn: self.conn()?,
            cache: self.manager.cache(),
        })
    }

    // -------------------------------------------------------------------------
    // Builder factories
    // -------------------------------------------------------------------------

    /// Start a SELECT against a logical table.
    pub fn select(&self, table: impl Into<String>) -> DbResult<SelectQuery> {
        Ok(SelectQuery::new(self.ctx()?, table))
    }

    /// Start an INSERT into a logical table.
    pub fn insert(&self, table: impl Into<String>) -> DbResult<InsertQuery> {
        Ok(InsertQuery::new(self.ctx()?, table))
    }

    /// Start an UPDATE of a logical table.
    pub fn update(&self, table: impl Into<String>) -> DbResult<UpdateQuery> {
        Ok(UpdateQuery::new(self.ctx()?, table))
    }

    /// Start a DELETE from a logical table.
    pub fn delete(&self, table: impl Into<String>) -> DbResult<DeleteQuery> {
        Ok(DeleteQuery::new(self.ctx()?, table))
    }

    // -------------------------------------------------------------------------
    // Raw statements
    // -------------------------------------------------------------------------

    /// Run a raw row-returning statement. `?` markers are rewritten to the
    /// connection's placeholder style before execution.
    pub async fn raw(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        let conn = self.conn()?;
        let (sql, params) = rewrite_placeholders(sql, params, conn.dialect());
        conn.fetch_rows(&sql, &params)
            .await
            .map_err(|e| e.with_statement(&sql, &params))
    }

    /// Run a raw non-returning statement; yields the affected-row count.
    pub async fn execute_raw(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let conn = self.conn()?;
        let (sql, params) = rewrite_placeholders(sql, params, conn.dialect());
        conn.execute(&sql, &params)
            .await
            .map_err(|e| e.with_statement(&sql, &params))
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    pub async fn begin_transaction(&self) -> DbResult<()> {
        self.conn()?.begin_transaction().await
    }

    pub async fn commit(&self) -> DbResult<()> {
        self.conn()?.commit().await
    }

    pub async fn rollback(&self) -> DbResult<()> {
        self.conn()?.rollback().await
    }

    /// Run a closure inside a transaction.
    ///
    /// Commits on `Ok`. On `Err`, rolls back and propagates the closure's
    /// error unmodified; a rollback failure is logged, never surfaced over
    /// the original error.
    pub async fn transaction<T, F, Fut>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let conn = self.conn()?;
        conn.begin_transaction().await?;
        match f(self.clone()).await {
            Ok(value) => {
                conn.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    /// The auto-generated id of the most recent INSERT on this connection.
    pub async fn last_insert_id(&self, sequence: Option<&str>) -> DbResult<u64> {
        self.conn()?.last_insert_id(sequence).await
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Physical name for a logical table. Never fails: if the connection
    /// cannot be resolved, the logical name comes back unchanged.
    pub fn table_name(&self, logical: &str) -> String {
        match self.conn() {
            Ok(conn) => conn.tables().resolve(logical),
            Err(e) => {
                warn!(
                    connection = %self.connection_name,
                    error = %e,
                    "Cannot resolve table name, returning logical name"
                );
                logical.to_string()
            }
        }
    }

    /// Text of the most recent statement on this connection, if any.
    pub fn last_query(&self) -> Option<String> {
        self.conn().ok().and_then(|conn| conn.last_query())
    }

    /// Message of the most recent failure on this connection, if any.
    pub fn last_error(&self) -> Option<String> {
        self.conn().ok().and_then(|conn| conn.last_error())
    }

    // -------------------------------------------------------------------------
    // Best-effort helpers
    // -------------------------------------------------------------------------
    //
    // These swallow every failure and report success as a bool. They exist
    // for maintenance paths where the caller has no error handling of its
    // own; everything else should use the strict API above.

    /// Insert one row; `true` on success.
    pub async fn try_insert_row<C, V>(
        &self,
        table: &str,
        values: impl IntoIterator<Item = (C, V)>,
    ) -> bool
    where
        C: Into<String>,
        V: Into<SqlValue>,
    {
        let result = match self.insert(table) {
            Ok(query) => query.values(values).execute().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(table = %table, error = %e, "Best-effort insert failed");
                false
            }
        }
    }

    /// Whether the given column exists on the table, answered from the
    /// engine's catalog. Any failure reads as `false`.
    pub async fn try_field_exists(&self, table: &str, column: &str) -> bool {
        let result = match self.conn() {
            Ok(conn) => {
                let physical = conn.tables().resolve(table);
                conn.field_exists(&physical, column).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(exists) => exists,
            Err(e) => {
                warn!(table = %table, column = %column, error = %e, "Field lookup failed");
                false
            }
        }
    }

    /// Delete every row from the table; `true` on success.
    pub async fn try_empty_table(&self, table: &str) -> bool {
        let result = match self.conn() {
            Ok(conn) => {
                let physical = conn.tables().resolve(table);
                conn.empty_table(&physical).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(table = %table, error = %e, "Best-effort empty table failed");
                false
            }
        }
    }

    /// Run the engine's maintenance command for the table; `true` on
    /// success.
    pub async fn try_optimize_table(&self, table: &str) -> bool {
        let result = match self.conn() {
            Ok(conn) => {
                let physical = conn.tables().resolve(table);
                conn.optimize_table(&physical).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(table = %table, error = %e, "Best-effort optimize failed");
                false
            }
        }
    }
}

/// Rewrite `?` markers in a raw statement to the dialect's positional
/// placeholders. Markers beyond the parameter count stay literal.
fn rewrite_placeholders(
    sql: &str,
    params: &[SqlValue],
    dialect: crate::sql::Dialect,
) -> (String, Vec<SqlValue>) {
    let mut out = String::with_capacity(sql.len());
    let mut index = 0usize;
    for ch in sql.chars() {
        if ch == '?' && index < params.len() {
            index += 1;
            out.push_str(&dialect.placeholder(index));
        } else {
            out.push(ch);
        }
    }
    (out, params.to_vec())
}
