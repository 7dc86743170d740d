//! Resource state repository
//!
//! Stores resolved BGP resource states keyed by the exact
//! (resources, collectors) pair of the originating query. The pair is kept
//! as comma-joined text in the order the caller supplied it; two queries
//! with reordered but equal lists are distinct cache keys.
//!
//! Concurrent resolutions for one key are expected. The single
//! `INSERT ... ON CONFLICT DO UPDATE` statement in [`StateRepository::upsert`]
//! is the only mechanism keeping them from creating duplicate rows; there is
//! no read-then-write sequence and no application-level lock.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One observed route for a queried resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Peer identifier, the remainder of `source_id` after the first hyphen
    pub source: String,
    /// Route collector that observed the announcement
    pub collector: u32,
    /// First AS in the path
    pub peer: u32,
    /// Ordered AS path, never empty
    pub path: Vec<u32>,
    /// BGP community tags attached to the route
    pub community: Vec<String>,
    /// Whether any AS number repeats anywhere in the path
    pub prepend: bool,
}

/// Resolved routing state for a set of resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Persisted identity; `None` until the state is stored
    pub id: Option<i64>,
    pub resources: Vec<String>,
    pub collectors: Vec<u32>,
    pub routes: Vec<RouteRecord>,
    /// Count of routes with `prepend == true`
    pub prepends: u32,
    /// Instant the resolution began
    pub timestamp: DateTime<Utc>,
    /// Query time reported by the upstream provider
    pub queried_at: DateTime<Utc>,
    /// Whether the state is registered for continuous monitoring
    pub live: bool,
}

/// Canonical store key for a (resources, collectors) pair
fn state_key(resources: &[String], collectors: &[u32]) -> (String, String) {
    let resources = resources.join(",");
    let collectors = collectors
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",");
    (resources, collectors)
}

fn split_resources(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn split_collectors(joined: &str) -> Vec<u32> {
    joined
        .split(',')
        .filter_map(|s| s.parse::<u32>().ok())
        .collect()
}

/// Raw row as read from the `resource_state` table
struct StateRow {
    id: i64,
    resources: String,
    collectors: String,
    routes_json: String,
    prepends: u32,
    timestamp: i64,
    queried_at: i64,
    live: bool,
}

impl StateRow {
    const COLUMNS: &'static str =
        "id, resources, collectors, routes, prepends, timestamp, queried_at, live";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(StateRow {
            id: row.get(0)?,
            resources: row.get(1)?,
            collectors: row.get(2)?,
            routes_json: row.get(3)?,
            prepends: row.get(4)?,
            timestamp: row.get(5)?,
            queried_at: row.get(6)?,
            live: row.get(7)?,
        })
    }

    fn into_state(self) -> Result<ResourceState> {
        let routes: Vec<RouteRecord> = serde_json::from_str(&self.routes_json)
            .with_context(|| format!("Malformed routes column for state id {}", self.id))?;

        Ok(ResourceState {
            id: Some(self.id),
            resources: split_resources(&self.resources),
            collectors: split_collectors(&self.collectors),
            routes,
            prepends: self.prepends,
            timestamp: DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default(),
            queried_at: DateTime::from_timestamp(self.queried_at, 0).unwrap_or_default(),
            live: self.live,
        })
    }
}

/// Repository for resource state cache operations
pub struct StateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> StateRepository<'a> {
    /// Create a new state repository
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Find the most recent stored state for the exact key whose
    /// `queried_at` is strictly newer than `cutoff`
    pub fn find_fresh(
        &self,
        resources: &[String],
        collectors: &[u32],
        cutoff: DateTime<Utc>,
    ) -> Result<Option<ResourceState>> {
        let (res_key, col_key) = state_key(resources, collectors);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM resource_state
             WHERE resources = ?1 AND collectors = ?2 AND queried_at > ?3
             ORDER BY queried_at DESC
             LIMIT 1",
            StateRow::COLUMNS
        ))?;

        let result = stmt.query_row(
            params![res_key, col_key, cutoff.timestamp()],
            StateRow::from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.into_state()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to look up cached state: {}", e)),
        }
    }

    /// Atomically store or fully replace the state for its key
    ///
    /// A new row starts with `live = 0`; on conflict every payload column is
    /// replaced but the stored `live` flag is left alone, so a refresh never
    /// silently deregisters a monitored state. Returns the persisted record
    /// with its identity and current `live` flag.
    pub fn upsert(&self, state: &ResourceState) -> Result<ResourceState> {
        let (res_key, col_key) = state_key(&state.resources, &state.collectors);
        let routes_json =
            serde_json::to_string(&state.routes).context("Failed to serialize routes")?;

        let row = self
            .conn
            .query_row(
                &format!(
                    "INSERT INTO resource_state
                         (resources, collectors, routes, prepends, timestamp, queried_at, live)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                     ON CONFLICT (resources, collectors) DO UPDATE SET
                         routes = excluded.routes,
                         prepends = excluded.prepends,
                         timestamp = excluded.timestamp,
                         queried_at = excluded.queried_at
                     RETURNING {}",
                    StateRow::COLUMNS
                ),
                params![
                    res_key,
                    col_key,
                    routes_json,
                    state.prepends,
                    state.timestamp.timestamp(),
                    state.queried_at.timestamp(),
                ],
                StateRow::from_row,
            )
            .map_err(|e| anyhow!("Failed to upsert state for '{}': {}", res_key, e))?;

        info!(
            "Stored state for '{}' with {} routes",
            res_key,
            state.routes.len()
        );
        row.into_state()
    }

    /// Mark a stored state as live; safe to repeat
    pub fn set_live(&self, id: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE resource_state SET live = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| anyhow!("Failed to set live flag for state {}: {}", id, e))?;
        Ok(())
    }

    /// Fetch a stored state by its identity
    pub fn get(&self, id: i64) -> Result<Option<ResourceState>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM resource_state WHERE id = ?1",
                StateRow::COLUMNS
            ),
            params![id],
            StateRow::from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.into_state()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get state {}: {}", id, e)),
        }
    }

    /// List all stored states, most recently queried first
    pub fn list(&self) -> Result<Vec<ResourceState>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM resource_state ORDER BY queried_at DESC",
            StateRow::COLUMNS
        ))?;

        let rows = stmt
            .query_map([], StateRow::from_row)
            .map_err(|e| anyhow!("Failed to list states: {}", e))?;

        let mut states = Vec::new();
        for row in rows {
            states.push(row?.into_state()?);
        }
        Ok(states)
    }

    /// Get the number of stored states
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM resource_state", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count states: {}", e))?;
        Ok(count)
    }

    /// Delete all stored states, returning the number removed
    pub fn clear(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM resource_state", [])
            .map_err(|e| anyhow!("Failed to clear states: {}", e))
    }
}
