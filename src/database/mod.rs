//! Database module
//!
//! SQLite-backed persistence for resolved resource states:
//!
//! - **connection**: `DatabaseConn` wrapper (WAL mode, pragmas)
//! - **schema**: schema definitions and version management
//! - **state_store**: the resource state cache repository
//!
//! The store is treated as an opaque persistence service by the resolution
//! pipeline; the only operations it needs are the freshness-filtered exact
//! read, the atomic full-replace upsert, and the single-field live update.

pub mod connection;
pub mod schema;
pub mod state_store;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
pub use state_store::{ResourceState, RouteRecord, StateRepository};

use anyhow::{anyhow, Result};
use tracing::info;

/// Main vantage database (SQLite backend)
///
/// Handles schema initialization and drift detection, and hands out the
/// state repository.
pub struct VantageDatabase {
    db: DatabaseConn,
}

impl VantageDatabase {
    /// Open the vantage database at the specified path
    ///
    /// Creates and initializes the database when missing. An outdated or
    /// corrupted schema is reset and reinitialized; cached states are
    /// re-fetched on demand afterwards, so nothing of value is lost.
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {}
            SchemaStatus::NotInitialized => {
                info!("Initializing vantage database schema");
                schema.initialize()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!("Vantage database needs migration from v{} to v{}", from, to);
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                info!(
                    "Vantage database schema incompatible (db: v{}, required: v{}), resetting",
                    database_version, required_version
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                info!("Vantage database schema corrupted, resetting");
                schema.reset()?;
                schema.initialize()?;
            }
        }

        Ok(Self { db })
    }

    /// Open the vantage database from a data directory
    ///
    /// Uses the standard database file path: `{data_dir}/vantage-data.sqlite3`
    pub fn open_in_dir(data_dir: &str) -> Result<Self> {
        ensure_data_dir(data_dir)?;
        let path = format!("{}/vantage-data.sqlite3", data_dir);
        Self::open(&path)
    }

    /// Create an in-memory vantage database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    /// Get a reference to the state repository
    pub fn states(&self) -> StateRepository<'_> {
        StateRepository::new(&self.db.conn)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Get metadata value from the database
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    /// Set metadata value in the database
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = VantageDatabase::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_states_repository_starts_empty() {
        let db = VantageDatabase::open_in_memory().unwrap();
        assert_eq!(db.states().count().unwrap(), 0);
    }

    #[test]
    fn test_open_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let db = VantageDatabase::open_in_dir(&data_dir.to_string_lossy()).unwrap();
        assert!(data_dir.join("vantage-data.sqlite3").exists());
        assert_eq!(db.states().count().unwrap(), 0);
    }

    #[test]
    fn test_meta_operations() {
        let db = VantageDatabase::open_in_memory().unwrap();
        db.set_meta("test_key", "test_value").unwrap();
        assert_eq!(
            db.get_meta("test_key").unwrap(),
            Some("test_value".to_string())
        );
    }
}
