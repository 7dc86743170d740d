//! Database schema management
//!
//! Schema definitions and versioning for the vantage database. All tables
//! are defined here to keep the layout in one place.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables in the vantage database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and global metadata)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS vantage_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// SQL for creating the resource state table
    ///
    /// `resources` and `collectors` hold the comma-joined lists exactly as
    /// given in the query; the UNIQUE constraint over the pair is what makes
    /// concurrent upserts for one key converge on a single row.
    pub const RESOURCE_STATE_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS resource_state (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resources TEXT NOT NULL,
            collectors TEXT NOT NULL,
            routes TEXT NOT NULL,
            prepends INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            queried_at INTEGER NOT NULL,
            live INTEGER NOT NULL DEFAULT 0,
            UNIQUE (resources, collectors)
        );
    "#;

    /// SQL for creating resource state indexes
    pub const RESOURCE_STATE_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_resource_state_queried_at ON resource_state(queried_at)",
    ];
}

/// Schema status after comparing the database against the current version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    Current,
    NotInitialized,
    NeedsMigration { from: u32, to: u32 },
    Incompatible { database_version: u32, required_version: u32 },
    Corrupted,
}

/// Schema manager for the vantage database
///
/// Handles schema initialization, version checking, and resets.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes if they don't exist and records the
    /// schema version in the meta table.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        self.conn
            .execute(SchemaDefinitions::RESOURCE_STATE_TABLE, [])
            .map_err(|e| anyhow!("Failed to create resource_state table: {}", e))?;

        for index_sql in SchemaDefinitions::RESOURCE_STATE_INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create resource_state index: {}", e))?;
        }

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let meta_exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='vantage_meta'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if meta_exists == 0 {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    /// Drop all vantage tables so the schema can be reinitialized
    pub fn reset(&self) -> Result<()> {
        for table in ["resource_state", "vantage_meta"] {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| anyhow!("Failed to drop table '{}': {}", table, e))?;
        }
        Ok(())
    }

    /// Get the current schema version from the database
    fn get_schema_version(&self) -> Result<u32> {
        let version: String = self
            .conn
            .query_row(
                "SELECT value FROM vantage_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap_or_else(|_| "0".to_string());

        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    /// Verify schema integrity by checking required tables exist
    fn verify_integrity(&self) -> Result<bool> {
        for table in ["vantage_meta", "resource_state"] {
            let exists: i32 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap_or(0);

            if exists == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO vantage_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM vantage_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::DatabaseConn;

    #[test]
    fn test_initialize_and_status() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let schema = SchemaManager::new(&db.conn);

        assert_eq!(schema.check_status().unwrap(), SchemaStatus::NotInitialized);

        schema.initialize().unwrap();
        assert_eq!(schema.check_status().unwrap(), SchemaStatus::Current);
        assert!(db.table_exists("resource_state").unwrap());
    }

    #[test]
    fn test_reset() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let schema = SchemaManager::new(&db.conn);

        schema.initialize().unwrap();
        schema.reset().unwrap();
        assert_eq!(schema.check_status().unwrap(), SchemaStatus::NotInitialized);
    }

    #[test]
    fn test_meta_roundtrip() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let schema = SchemaManager::new(&db.conn);
        schema.initialize().unwrap();

        schema.set_meta("k", "v1").unwrap();
        schema.set_meta("k", "v2").unwrap();
        assert_eq!(schema.get_meta("k").unwrap(), Some("v2".to_string()));
        assert_eq!(schema.get_meta("missing").unwrap(), None);
    }

    #[test]
    fn test_corrupted_schema_detected() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let schema = SchemaManager::new(&db.conn);
        schema.initialize().unwrap();

        db.execute("DROP TABLE resource_state").unwrap();
        assert_eq!(schema.check_status().unwrap(), SchemaStatus::Corrupted);
    }
}
