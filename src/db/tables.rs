//! Logical-to-physical table name resolution.

use crate::settings::ConnectionConfig;
use std::collections::HashMap;
use tracing::warn;

/// Resolves logical table names to physical ones using an explicit mapping
/// and/or a deployment prefix.
///
/// Resolution order: mapping hit, else prefix + logical, else the logical
/// name unchanged. An empty prefix and empty mapping is the identity
/// resolver. Validation problems are recorded as a non-fatal flag —
/// resolution keeps working on an invalid configuration.
#[derive(Debug, Clone, Default)]
pub struct TableConfig {
    prefix: String,
    mapping: HashMap<String, String>,
    valid: bool,
}

impl TableConfig {
    /// Create a table configuration, checking the mapping invariants
    /// (non-empty names on both sides). Violations are logged and flip
    /// [`is_valid`](Self::is_valid), nothing more.
    pub fn new(prefix: impl Into<String>, mapping: HashMap<String, String>) -> Self {
        let valid = mapping
            .iter()
            .all(|(logical, physical)| !logical.is_empty() && !physical.is_empty());
        if !valid {
            warn!("Table mapping contains empty names; configuration marked invalid");
        }
        Self {
            prefix: prefix.into(),
            mapping,
            valid,
        }
    }

    /// Derive a table configuration from a connection configuration.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.prefix.clone(), config.tables.clone())
    }

    /// Resolve a logical table name to its physical name.
    pub fn resolve(&self, logical: &str) -> String {
        if let Some(physical) = self.mapping.get(logical) {
            return physical.clone();
        }
        if !self.prefix.is_empty() {
            return format!("{}{}", self.prefix, logical);
        }
        logical.to_string()
    }

    /// Whether the mapping invariants held at construction time.
    ///
    /// Callers may keep using an invalid configuration; this is a
    /// diagnostic signal, never an error path.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True when resolution is the identity function.
    pub fn is_identity(&self) -> bool {
        self.prefix.is_empty() && self.mapping.is_empty()
    }
}
