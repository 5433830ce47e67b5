use std::env;
use std::path::PathBuf;

use rostersync_core::roster::{Event, Position, Qualification, User};
use rostersync_core::storage::Entity;

use crate::storage::DatabaseSchema;

/// Schema version of the collections this build stores.
///
/// Bump it whenever an entity's stored shape or the collection set changes;
/// opening an older cache then discards it and reloads from the remote.
pub const SCHEMA_VERSION: u32 = 1;

/// Collections this build stores, one per entity type.
pub const COLLECTIONS: [&str; 4] = [
    Event::COLLECTION,
    User::COLLECTION,
    Position::COLLECTION,
    Qualification::COLLECTION,
];

/// Cache configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the database file (default: ".rostersync")
    pub cache_dir: PathBuf,
    /// Database name, without extension (default: "rostersync")
    pub db_name: String,
    /// Requested schema version (default: [`SCHEMA_VERSION`])
    pub db_version: u32,
    /// Share concurrent full fetches between services (default: true)
    pub deduplicate_fetches: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROSTERSYNC_CACHE_DIR` - Directory holding the database (default: ".rostersync")
    /// - `ROSTERSYNC_DB_NAME` - Database name (default: "rostersync")
    /// - `ROSTERSYNC_DB_VERSION` - Schema version (default: [`SCHEMA_VERSION`])
    /// - `ROSTERSYNC_DEDUPLICATE_FETCHES` - "true"/"false" (default: true)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cache_dir: lookup("ROSTERSYNC_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".rostersync")),
            db_name: lookup("ROSTERSYNC_DB_NAME").unwrap_or_else(|| "rostersync".to_string()),
            db_version: lookup("ROSTERSYNC_DB_VERSION")
                .and_then(|v| v.parse().ok())
                .unwrap_or(SCHEMA_VERSION),
            deduplicate_fetches: lookup("ROSTERSYNC_DEDUPLICATE_FETCHES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Schema declaring every collection in [`COLLECTIONS`].
    pub fn database_schema(&self) -> DatabaseSchema {
        DatabaseSchema::new(self.db_name.clone(), self.db_version).with_collections(COLLECTIONS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(lookup(&[]));

        assert_eq!(config.cache_dir, PathBuf::from(".rostersync"));
        assert_eq!(config.db_name, "rostersync");
        assert_eq!(config.db_version, SCHEMA_VERSION);
        assert!(config.deduplicate_fetches);
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup(&[
            ("ROSTERSYNC_CACHE_DIR", "/tmp/cache"),
            ("ROSTERSYNC_DB_NAME", "staging"),
            ("ROSTERSYNC_DB_VERSION", "3"),
            ("ROSTERSYNC_DEDUPLICATE_FETCHES", "false"),
        ]));

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.db_name, "staging");
        assert_eq!(config.db_version, 3);
        assert!(!config.deduplicate_fetches);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("ROSTERSYNC_DB_VERSION", "two"),
            ("ROSTERSYNC_DEDUPLICATE_FETCHES", "maybe"),
        ]));

        assert_eq!(config.db_version, SCHEMA_VERSION);
        assert!(config.deduplicate_fetches);
    }

    #[test]
    fn test_database_schema_declares_every_collection() {
        let config = Config::from_lookup(lookup(&[("ROSTERSYNC_DB_VERSION", "2")]));
        let schema = config.database_schema();

        assert_eq!(schema.name(), "rostersync");
        assert_eq!(schema.version(), 2);
        assert_eq!(
            schema.collections(),
            ["events", "users", "positions", "qualifications"]
        );
    }
}
