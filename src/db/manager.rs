//! The connection registry.
//!
//! A [`ConnectionManager`] is created empty and then configured with a set
//! of named connection settings. Connections are created lazily on first
//! lookup and cached for the lifetime of the manager. The manager is the
//! dependency-injection root: application code holds an `Arc` to it and
//! everything else (facades, builders) borrows from there.

use crate::error::{DbResult, Error};
use crate::settings::Settings;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::cache::{CacheOptions, DEFAULT_CACHE_TTL_SECS, FileCache, MemoryCache, QueryCacheStore};
use super::connection::Connection;

/// An installed cache backend plus the TTL applied when callers do not
/// specify one.
#[derive(Clone)]
pub struct CacheHandle {
    pub store: Arc<dyn QueryCacheStore>,
    pub default_ttl: Duration,
}

#[derive(Default)]
pub struct ConnectionManager {
    settings: RwLock<Option<Settings>>,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    cache: RwLock<Option<CacheHandle>>,
}

impl ConnectionManager {
    /// Create an unconfigured manager. Every lookup fails until
    /// [`configure`](Self::configure) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager already configured with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        let manager = Self::new();
        manager.configure(settings);
        manager
    }

    /// Install (or replace) the connection settings. Replacing settings
    /// drops every cached connection; the next lookup re-creates them.
    pub fn configure(&self, settings: Settings) {
        info!(connections = settings.names().len(), "Configuring connection manager");
        *self.settings.write().expect("settings lock poisoned") = Some(settings);
        self.connections
            .write()
            .expect("connections lock poisoned")
            .clear();
    }

    pub fn is_configured(&self) -> bool {
        self.settings
            .read()
            .expect("settings lock poisoned")
            .is_some()
    }

    /// Names of all configured connections.
    pub fn names(&self) -> Vec<String> {
        self.settings
            .read()
            .expect("settings lock poisoned")
            .as_ref()
            .map(|s| s.names().iter().map(|n| n.to_string()).collect())
            .unwrap_or_default()
    }

    /// Look up a connection by name, creating it on first use.
    ///
    /// Repeated lookups for the same name return the same shared
    /// connection. Opens no server resources; drivers connect lazily.
    pub fn get_connection(&self, name: &str) -> DbResult<Arc<Connection>> {
        if let Some(conn) = self
            .connections
            .read()
            .expect("connections lock poisoned")
            .get(name)
        {
            return Ok(Arc::clone(conn));
        }

        let settings = self.settings.read().expect("settings lock poisoned");
        let settings = settings
            .as_ref()
            .ok_or_else(|| Error::configuration("Connection manager is not initialized"))?;
        let config = settings
            .get(name)
            .ok_or_else(|| Error::configuration(format!("Unknown connection '{}'", name)))?;

        let conn = Arc::new(Connection::new(name, config)?);

        let mut connections = self.connections.write().expect("connections lock poisoned");
        // Another task may have created it while we held the read lock
        let entry = connections
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&conn));
        Ok(Arc::clone(entry))
    }

    /// The connection named `default`.
    pub fn default_connection(&self) -> DbResult<Arc<Connection>> {
        self.get_connection("default")
    }

    /// Build and install one of the bundled cache backends.
    pub fn configure_cache(
        &self,
        options: CacheOptions,
        default_ttl: Option<Duration>,
    ) -> DbResult<()> {
        let store: Arc<dyn QueryCacheStore> = match options {
            CacheOptions::Memory => Arc::new(MemoryCache::new()),
            CacheOptions::File { dir } => Arc::new(FileCache::new(&dir).map_err(|e| {
                Error::configuration(format!(
                    "Cannot create cache directory {}: {}",
                    dir.display(),
                    e
                ))
            })?),
        };
        self.set_cache(store, default_ttl);
        Ok(())
    }

    /// Install a custom cache backend.
    pub fn set_cache(&self, store: Arc<dyn QueryCacheStore>, default_ttl: Option<Duration>) {
        let default_ttl = default_ttl.unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
        debug!(default_ttl_secs = default_ttl.as_secs(), "Query cache installed");
        *self.cache.write().expect("cache lock poisoned") = Some(CacheHandle { store, default_ttl });
    }

    /// The installed cache, if any. Query builders consult this on every
    /// select and invalidate through it on every write.
    pub fn cache(&self) -> Option<CacheHandle> {
        self.cache.read().expect("cache lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_value(json!({
            "main": { "driver": "sqlite", "database": ":memory:" },
            "other": { "driver": "sqlite", "database": ":memory:" }
        }))
        .unwrap()
    }

    #[test]
    fn test_unconfigured_manager_reports_it() {
        let manager = ConnectionManager::new();
        let err = manager.get_connection("default").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Connection manager is not initialized"
        );
    }

    #[test]
    fn test_unknown_connection_name() {
        let manager = ConnectionManager::with_settings(settings());
        let err = manager.get_connection("reports").unwrap_err();
        assert!(err.to_string().contains("Unknown connection 'reports'"));
    }

    #[test]
    fn test_lookup_is_cached() {
        let manager = ConnectionManager::with_settings(settings());
        let a = manager.get_connection("main").unwrap();
        let b = manager.get_connection("main").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_first_connection_available_as_default() {
        let manager = ConnectionManager::with_settings(settings());
        let conn = manager.default_connection().unwrap();
        assert_eq!(conn.name(), "default");
    }

    #[test]
    fn test_reconfigure_drops_cached_connections() {
        let manager = ConnectionManager::with_settings(settings());
        let a = manager.get_connection("main").unwrap();
        manager.configure(settings());
        let b = manager.get_connection("main").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_configuration() {
        let manager = ConnectionManager::with_settings(settings());
        assert!(manager.cache().is_none());
        manager.configure_cache(CacheOptions::Memory, None).unwrap();
        let handle = manager.cache().unwrap();
        assert_eq!(handle.default_ttl, Duration::from_secs(3600));
    }
}
