//! Connection management: drivers, the registry, table resolution, and the
//! query cache.

pub mod cache;
pub mod connection;
pub mod driver;
pub mod manager;
pub mod rows;
pub mod tables;

pub use cache::{CacheOptions, DEFAULT_CACHE_TTL_SECS, FileCache, MemoryCache, QueryCacheStore};
pub use connection::Connection;
pub use driver::Driver;
pub use manager::{CacheHandle, ConnectionManager};
pub use tables::TableConfig;
