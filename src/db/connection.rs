//! A named, ready-to-use connection.

use crate::error::DbResult;
use crate::models::{QueryResult, SqlValue};
use crate::settings::ConnectionConfig;
use crate::sql::Dialect;
use std::sync::Mutex;
use tracing::debug;

use super::driver::Driver;
use super::tables::TableConfig;

/// One configured connection: the engine driver, the table name resolver,
/// and the last-statement diagnostics.
///
/// Shared via `Arc`; all interior state is synchronized.
pub struct Connection {
    name: String,
    driver: Driver,
    tables: TableConfig,
    last_query: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
}

impl Connection {
    pub fn new(name: impl Into<String>, config: &ConnectionConfig) -> DbResult<Self> {
        let name = name.into();
        debug!(connection = %name, "Opening connection");
        Ok(Self {
            driver: Driver::from_config(config)?,
            tables: TableConfig::from_config(config),
            name,
            last_query: Mutex::new(None),
            last_error: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn tables(&self) -> &TableConfig {
        &self.tables
    }

    /// Run a row-returning statement, recording diagnostics.
    pub async fn fetch_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        self.record_query(sql);
        self.track(self.driver.fetch_rows(sql, params).await)
    }

    /// Run a non-returning statement, recording diagnostics.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        self.record_query(sql);
        self.track(self.driver.execute(sql, params).await)
    }

    /// Whether a transaction is currently open on this connection.
    pub async fn in_transaction(&self) -> bool {
        self.driver.in_transaction().await
    }

    pub async fn begin_transaction(&self) -> DbResult<()> {
        self.track(self.driver.begin_transaction().await)
    }

    pub async fn commit(&self) -> DbResult<()> {
        self.track(self.driver.commit().await)
    }

    pub async fn rollback(&self) -> DbResult<()> {
        self.track(self.driver.rollback().await)
    }

    pub async fn last_insert_id(&self, sequence: Option<&str>) -> DbResult<u64> {
        self.track(self.driver.last_insert_id(sequence).await)
    }

    pub async fn field_exists(&self, physical_table: &str, column: &str) -> DbResult<bool> {
        self.track(self.driver.field_exists(physical_table, column).await)
    }

    pub async fn empty_table(&self, physical_table: &str) -> DbResult<u64> {
        self.track(self.driver.empty_table(physical_table).await)
    }

    pub async fn optimize_table(&self, physical_table: &str) -> DbResult<()> {
        self.track(self.driver.optimize_table(physical_table).await)
    }

    /// The text of the most recent statement issued through this connection.
    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().expect("diagnostics lock poisoned").clone()
    }

    /// The message of the most recent failure on this connection.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("diagnostics lock poisoned").clone()
    }

    fn record_query(&self, sql: &str) {
        *self.last_query.lock().expect("diagnostics lock poisoned") = Some(sql.to_string());
    }

    fn track<T>(&self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            *self.last_error.lock().expect("diagnostics lock poisoned") = Some(e.to_string());
        }
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("dialect", &self.dialect())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_connection() -> Connection {
        let settings = crate::settings::Settings::from_value(json!({
            "main": {
                "driver": "sqlite",
                "database": ":memory:",
                "prefix": "app_"
            }
        }))
        .unwrap();
        Connection::new("main", settings.get("main").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_diagnostics_record_query_and_error() {
        let conn = memory_connection();
        assert!(conn.last_query().is_none());

        conn.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();
        assert_eq!(conn.last_query().as_deref(), Some("CREATE TABLE t (id INTEGER)"));
        assert!(conn.last_error().is_none());

        assert!(conn.fetch_rows("SELECT * FROM missing", &[]).await.is_err());
        assert!(conn.last_error().is_some());
    }

    #[tokio::test]
    async fn test_table_resolution_uses_prefix() {
        let conn = memory_connection();
        assert_eq!(conn.tables().resolve("users"), "app_users");
    }
}
