//! Database access core: a named-connection registry, dialect-aware fluent
//! query builders, logical-to-physical table name resolution, and a TTL
//! query result cache, over MySQL, PostgreSQL, and SQLite pools.
//!
//! # Quick start
//!
//! ```no_run
//! use dbcore::{ConnectionManager, Database, Settings};
//! use std::sync::Arc;
//!
//! # async fn run() -> dbcore::DbResult<()> {
//! let settings = Settings::from_json_str(r#"{
//!     "main": { "driver": "sqlite", "database": "app.db", "prefix": "app_" }
//! }"#)?;
//! let manager = Arc::new(ConnectionManager::with_settings(settings));
//! let db = Database::new(manager);
//!
//! let users = db
//!     .select("users")?
//!     .where_eq("status", "active")
//!     .fetch_all()
//!     .await?;
//! println!("{} active users", users.row_count());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod settings;
pub mod sql;

pub use database::Database;
pub use db::{
    CacheHandle, CacheOptions, Connection, ConnectionManager, DEFAULT_CACHE_TTL_SECS, FileCache,
    MemoryCache, QueryCacheStore, TableConfig,
};
pub use error::{DbResult, Error};
pub use models::{
    ColumnMetadata, ColumnSpec, CompareOp, Condition, Conjunction, Join, JoinKind, Operation,
    OrderDir, QueryDescriptor, QueryResult, SqlValue,
};
pub use query::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};
pub use settings::{ConnectionConfig, Settings};
pub use sql::{Dialect, SqlFunction};
