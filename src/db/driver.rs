//! Engine drivers.
//!
//! One [`Driver`] wraps one sqlx pool for one configured connection. Pools
//! are created lazily, so constructing a driver never touches the network;
//! the first statement does.
//!
//! A driver owns at most one active transaction. While a transaction is
//! open, every statement issued through the driver runs inside it.

use crate::error::{DbResult, Error};
use crate::models::{QueryResult, SqlValue};
use crate::settings::ConnectionConfig;
use crate::sql::Dialect;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use super::rows::RowToJson;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

enum EnginePool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

enum ActiveTransaction {
    MySql(sqlx::Transaction<'static, sqlx::MySql>),
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
    Sqlite(sqlx::Transaction<'static, sqlx::Sqlite>),
}

/// A lazily-connected pool plus the transaction slot for one connection.
pub struct Driver {
    pool: EnginePool,
    dialect: Dialect,
    tx: tokio::sync::Mutex<Option<ActiveTransaction>>,
}

impl Driver {
    /// Build a driver from a validated configuration. No connection is
    /// opened here; failures that depend on the server surface on first
    /// use.
    pub fn from_config(config: &ConnectionConfig) -> DbResult<Self> {
        let dialect = config.dialect()?;
        debug!(target = %config.masked(), "Creating driver");

        let pool = match dialect {
            Dialect::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(config.host.as_deref().unwrap_or("localhost"))
                    .charset("utf8mb4");
                if let Some(port) = config.port {
                    options = options.port(port);
                }
                if let Some(username) = &config.username {
                    options = options.username(username);
                }
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                if let Some(database) = &config.database {
                    options = options.database(database);
                }
                EnginePool::MySql(
                    MySqlPoolOptions::new()
                        .max_connections(DEFAULT_MAX_CONNECTIONS)
                        .connect_lazy_with(options),
                )
            }
            Dialect::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(config.host.as_deref().unwrap_or("localhost"));
                if let Some(port) = config.port {
                    options = options.port(port);
                }
                if let Some(username) = &config.username {
                    options = options.username(username);
                }
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                if let Some(database) = &config.database {
                    options = options.database(database);
                }
                EnginePool::Postgres(
                    PgPoolOptions::new()
                        .max_connections(DEFAULT_MAX_CONNECTIONS)
                        .connect_lazy_with(options),
                )
            }
            Dialect::Sqlite => {
                let path = config.database.as_deref().ok_or_else(|| {
                    Error::configuration("SQLite connections require a database path")
                })?;
                let options = if path == ":memory:" {
                    SqliteConnectOptions::from_str("sqlite::memory:")?
                } else {
                    SqliteConnectOptions::new()
                        .filename(path)
                        .create_if_missing(true)
                };
                // A single long-lived connection keeps in-memory databases
                // and the transaction slot coherent.
                EnginePool::Sqlite(
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect_lazy_with(options),
                )
            }
            Dialect::SqlServer => {
                return Err(Error::configuration(
                    "SQL Server connections are not supported by this build; \
                     the dialect is available for SQL generation only",
                ));
            }
        };

        Ok(Self {
            pool,
            dialect,
            tx: tokio::sync::Mutex::new(None),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Whether a transaction is currently open on this driver.
    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Run a row-returning statement.
    pub async fn fetch_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        let started = Instant::now();
        let mut slot = self.tx.lock().await;
        match &self.pool {
            EnginePool::MySql(pool) => {
                let query = mysql::bind_params(sqlx::query(sql), params);
                let rows = match slot.as_mut() {
                    Some(ActiveTransaction::MySql(tx)) => query.fetch_all(&mut **tx).await?,
                    _ => query.fetch_all(pool).await?,
                };
                Ok(rows_to_result(&rows, started))
            }
            EnginePool::Postgres(pool) => {
                let query = postgres::bind_params(sqlx::query(sql), params);
                let rows = match slot.as_mut() {
                    Some(ActiveTransaction::Postgres(tx)) => query.fetch_all(&mut **tx).await?,
                    _ => query.fetch_all(pool).await?,
                };
                Ok(rows_to_result(&rows, started))
            }
            EnginePool::Sqlite(pool) => {
                let query = sqlite::bind_params(sqlx::query(sql), params);
                let rows = match slot.as_mut() {
                    Some(ActiveTransaction::Sqlite(tx)) => query.fetch_all(&mut **tx).await?,
                    _ => query.fetch_all(pool).await?,
                };
                Ok(rows_to_result(&rows, started))
            }
        }
    }

    /// Run a statement that returns no rows; yields the affected-row count.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let mut slot = self.tx.lock().await;
        match &self.pool {
            EnginePool::MySql(pool) => {
                let query = mysql::bind_params(sqlx::query(sql), params);
                let done = match slot.as_mut() {
                    Some(ActiveTransaction::MySql(tx)) => query.execute(&mut **tx).await?,
                    _ => query.execute(pool).await?,
                };
                Ok(done.rows_affected())
            }
            EnginePool::Postgres(pool) => {
                let query = postgres::bind_params(sqlx::query(sql), params);
                let done = match slot.as_mut() {
                    Some(ActiveTransaction::Postgres(tx)) => query.execute(&mut **tx).await?,
                    _ => query.execute(pool).await?,
                };
                Ok(done.rows_affected())
            }
            EnginePool::Sqlite(pool) => {
                let query = sqlite::bind_params(sqlx::query(sql), params);
                let done = match slot.as_mut() {
                    Some(ActiveTransaction::Sqlite(tx)) => query.execute(&mut **tx).await?,
                    _ => query.execute(pool).await?,
                };
                Ok(done.rows_affected())
            }
        }
    }

    /// Open a transaction. At most one can be active per driver; a second
    /// `begin` is a caller error and fails without touching the open one.
    pub async fn begin_transaction(&self) -> DbResult<()> {
        let mut slot = self.tx.lock().await;
        if slot.is_some() {
            return Err(Error::database(
                "A transaction is already active on this connection",
            ));
        }
        let tx = match &self.pool {
            EnginePool::MySql(pool) => ActiveTransaction::MySql(pool.begin().await?),
            EnginePool::Postgres(pool) => ActiveTransaction::Postgres(pool.begin().await?),
            EnginePool::Sqlite(pool) => ActiveTransaction::Sqlite(pool.begin().await?),
        };
        *slot = Some(tx);
        debug!("Transaction started");
        Ok(())
    }

    pub async fn commit(&self) -> DbResult<()> {
        let mut slot = self.tx.lock().await;
        match slot.take() {
            Some(ActiveTransaction::MySql(tx)) => tx.commit().await?,
            Some(ActiveTransaction::Postgres(tx)) => tx.commit().await?,
            Some(ActiveTransaction::Sqlite(tx)) => tx.commit().await?,
            None => return Err(Error::database("No active transaction to commit")),
        }
        debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(&self) -> DbResult<()> {
        let mut slot = self.tx.lock().await;
        match slot.take() {
            Some(ActiveTransaction::MySql(tx)) => tx.rollback().await?,
            Some(ActiveTransaction::Postgres(tx)) => tx.rollback().await?,
            Some(ActiveTransaction::Sqlite(tx)) => tx.rollback().await?,
            None => return Err(Error::database("No active transaction to roll back")),
        }
        debug!("Transaction rolled back");
        Ok(())
    }

    /// The auto-generated id of the most recent INSERT on this connection.
    ///
    /// PostgreSQL needs the sequence name unless the insert used a column
    /// with a session-visible sequence (`lastval`).
    pub async fn last_insert_id(&self, sequence: Option<&str>) -> DbResult<u64> {
        let sql = match self.dialect {
            Dialect::MySql => "SELECT LAST_INSERT_ID()".to_string(),
            Dialect::Sqlite => "SELECT last_insert_rowid()".to_string(),
            Dialect::Postgres => match sequence {
                Some(seq) => format!(
                    "SELECT currval({})",
                    quote_string_literal(seq)
                ),
                None => "SELECT lastval()".to_string(),
            },
            Dialect::SqlServer => "SELECT SCOPE_IDENTITY()".to_string(),
        };
        let result = self.fetch_rows(&sql, &[]).await?;
        result
            .rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|v| v.as_u64().or_else(|| v.as_i64().map(|i| i as u64)))
            .ok_or_else(|| Error::database("Could not determine last insert id"))
    }

    /// Whether the table has a column with the given name, answered from
    /// the engine's catalog. A missing table reads as no columns.
    pub async fn field_exists(&self, physical_table: &str, column: &str) -> DbResult<bool> {
        match self.dialect {
            Dialect::Sqlite => {
                let sql = format!(
                    "PRAGMA table_info({})",
                    self.dialect.quote_identifier(physical_table)
                );
                let result = self.fetch_rows(&sql, &[]).await?;
                Ok(result
                    .rows
                    .iter()
                    .any(|row| row.get("name").and_then(|v| v.as_str()) == Some(column)))
            }
            Dialect::MySql => {
                let params = [SqlValue::from(physical_table), SqlValue::from(column)];
                let result = self
                    .fetch_rows(
                        "SELECT column_name FROM information_schema.columns \
                         WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?",
                        &params,
                    )
                    .await?;
                Ok(!result.rows.is_empty())
            }
            Dialect::Postgres => {
                let params = [SqlValue::from(physical_table), SqlValue::from(column)];
                let result = self
                    .fetch_rows(
                        "SELECT column_name FROM information_schema.columns \
                         WHERE table_name = $1 AND column_name = $2",
                        &params,
                    )
                    .await?;
                Ok(!result.rows.is_empty())
            }
            Dialect::SqlServer => {
                let params = [SqlValue::from(physical_table), SqlValue::from(column)];
                let result = self
                    .fetch_rows(
                        "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
                         WHERE TABLE_NAME = @p1 AND COLUMN_NAME = @p2",
                        &params,
                    )
                    .await?;
                Ok(!result.rows.is_empty())
            }
        }
    }

    /// Delete every row from a table.
    pub async fn empty_table(&self, physical_table: &str) -> DbResult<u64> {
        let sql = format!(
            "DELETE FROM {}",
            self.dialect.quote_identifier(physical_table)
        );
        self.execute(&sql, &[]).await
    }

    /// Run the engine's storage maintenance command for a table.
    pub async fn optimize_table(&self, physical_table: &str) -> DbResult<()> {
        let quoted = self.dialect.quote_identifier(physical_table);
        match self.dialect {
            Dialect::MySql => {
                // OPTIMIZE TABLE returns a status row set
                self.fetch_rows(&format!("OPTIMIZE TABLE {}", quoted), &[])
                    .await?;
            }
            Dialect::Postgres => {
                self.execute(&format!("VACUUM ANALYZE {}", quoted), &[])
                    .await?;
            }
            // VACUUM is database-wide in SQLite
            Dialect::Sqlite => {
                self.execute("VACUUM", &[]).await?;
            }
            Dialect::SqlServer => {
                self.execute(
                    &format!("ALTER INDEX ALL ON {} REORGANIZE", quoted),
                    &[],
                )
                .await?;
            }
        }
        Ok(())
    }
}

// Pools hold credentials; show only the engine identity.
impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

fn rows_to_result<R: RowToJson>(rows: &[R], started: Instant) -> QueryResult {
    QueryResult {
        columns: rows
            .first()
            .map(RowToJson::column_metadata)
            .unwrap_or_default(),
        rows: rows.iter().map(RowToJson::to_json_map).collect(),
        rows_affected: None,
        execution_time_ms: started.elapsed().as_millis() as u64,
    }
}

/// Quote a string literal for inline use, doubling embedded quotes.
fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// =============================================================================
// Parameter binding
// =============================================================================
//
// One module per engine. The bodies are intentionally parallel; sqlx query
// types are engine-specific so they cannot share a signature.

mod mysql {
    use super::SqlValue;
    use sqlx::MySql;
    use sqlx::mysql::MySqlArguments;
    use sqlx::query::Query;

    pub fn bind_params<'q>(
        mut query: Query<'q, MySql, MySqlArguments>,
        params: &'q [SqlValue],
    ) -> Query<'q, MySql, MySqlArguments> {
        for param in params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::String(v) => query.bind(v.as_str()),
                SqlValue::Bytes(v) => query.bind(v.as_slice()),
            };
        }
        query
    }
}

mod postgres {
    use super::SqlValue;
    use sqlx::Postgres;
    use sqlx::postgres::PgArguments;
    use sqlx::query::Query;

    pub fn bind_params<'q>(
        mut query: Query<'q, Postgres, PgArguments>,
        params: &'q [SqlValue],
    ) -> Query<'q, Postgres, PgArguments> {
        for param in params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::String(v) => query.bind(v.as_str()),
                SqlValue::Bytes(v) => query.bind(v.as_slice()),
            };
        }
        query
    }
}

mod sqlite {
    use super::SqlValue;
    use sqlx::Sqlite;
    use sqlx::query::Query;
    use sqlx::sqlite::SqliteArguments;

    pub fn bind_params<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &'q [SqlValue],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for param in params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::String(v) => query.bind(v.as_str()),
                SqlValue::Bytes(v) => query.bind(v.as_slice()),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sqlite_config(database: &str) -> ConnectionConfig {
        let settings = crate::settings::Settings::from_value(json!({
            "main": { "driver": "sqlite", "database": database }
        }))
        .unwrap();
        settings.get("main").unwrap().clone()
    }

    #[test]
    fn test_from_config_is_lazy() {
        // Construction must not touch the filesystem or the network.
        let driver = Driver::from_config(&sqlite_config("/nonexistent/dir/x.db")).unwrap();
        assert_eq!(driver.dialect(), Dialect::Sqlite);
    }

    #[test]
    fn test_sqlserver_config_is_rejected() {
        let settings = crate::settings::Settings::from_value(json!({
            "main": { "driver": "mssql", "database": "d" }
        }))
        .unwrap();
        let err = Driver::from_config(settings.get("main").unwrap()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sqlite_requires_database_path() {
        let settings = crate::settings::Settings::from_value(json!({
            "main": { "driver": "sqlite" }
        }))
        .unwrap();
        let err = Driver::from_config(settings.get("main").unwrap()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_fetch_and_execute_roundtrip() {
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        driver
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        let affected = driver
            .execute(
                "INSERT INTO t (name) VALUES (?)",
                &[SqlValue::from("alice")],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(driver.last_insert_id(None).await.unwrap(), 1);

        let result = driver.fetch_rows("SELECT id, name FROM t", &[]).await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0]["name"], json!("alice"));
    }

    #[tokio::test]
    async fn test_expression_columns_decode_by_stored_value() {
        // Expressions have no declared column type; decoding must follow
        // the runtime storage class.
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        let result = driver
            .fetch_rows(
                "SELECT 1 + 1 AS total, 'a' || 'b' AS label, 1.5 AS ratio, NULL AS missing",
                &[],
            )
            .await
            .unwrap();
        let row = &result.rows[0];
        assert_eq!(row["total"], json!(2));
        assert_eq!(row["label"], json!("ab"));
        assert_eq!(row["ratio"], json!(1.5));
        assert_eq!(row["missing"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        driver
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();

        driver.begin_transaction().await.unwrap();
        driver
            .execute("INSERT INTO t (id) VALUES (1)", &[])
            .await
            .unwrap();
        driver.rollback().await.unwrap();

        let result = driver.fetch_rows("SELECT id FROM t", &[]).await.unwrap();
        assert_eq!(result.row_count(), 0);
    }

    #[tokio::test]
    async fn test_second_begin_is_an_error() {
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        driver.begin_transaction().await.unwrap();
        assert!(driver.begin_transaction().await.is_err());
        driver.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_without_transaction_is_an_error() {
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        assert!(driver.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_table() {
        let driver = Driver::from_config(&sqlite_config(":memory:")).unwrap();
        driver
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();
        driver
            .execute("INSERT INTO t (id) VALUES (1), (2), (3)", &[])
            .await
            .unwrap();
        assert_eq!(driver.empty_table("t").await.unwrap(), 3);
    }
}
