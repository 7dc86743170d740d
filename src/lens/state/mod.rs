//! Resource state resolution lens
//!
//! The resolution pipeline: validate the query, try the freshness-windowed
//! cache, fetch and normalize the upstream state on a miss, atomically
//! upsert it, optionally register the state with the live monitor, and
//! filter the returned routes by community tags.
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage::database::VantageDatabase;
//! use vantage::lens::state::{StateLens, StateQuery};
//!
//! let db = VantageDatabase::open_in_dir("~/.vantage")?;
//! let lens = StateLens::ris(&db);
//!
//! let query = StateQuery::new(vec!["1.2.3.0/24".to_string()])
//!     .with_collectors(vec![3]);
//! let state = lens.resolve(&query)?;
//!
//! println!("{} routes, {} prepended", state.routes.len(), state.prepends);
//! ```

pub mod fetch;
pub mod parse;
pub mod query;

pub use fetch::{FetchParams, RawRoute, RawState, RisFetcher, StateFetcher};
pub use parse::{has_prepend, parse_raw_state};
pub use query::StateQuery;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::VantageConfig;
use crate::database::{ResourceState, VantageDatabase};
use crate::errors::ResolveError;
use crate::monitor::{HttpMonitor, LiveMonitor, NoopMonitor};

/// Resource state resolution lens
///
/// Owns the pipeline's collaborators: the database, the upstream fetcher,
/// and the live monitor. Both collaborators are injected so tests can
/// substitute doubles.
pub struct StateLens<'a> {
    db: &'a VantageDatabase,
    fetcher: Box<dyn StateFetcher>,
    monitor: Box<dyn LiveMonitor>,
    freshness: Duration,
}

impl<'a> StateLens<'a> {
    /// Create a lens with explicit collaborators and the default 8-hour
    /// freshness window
    pub fn new(
        db: &'a VantageDatabase,
        fetcher: Box<dyn StateFetcher>,
        monitor: Box<dyn LiveMonitor>,
    ) -> Self {
        Self {
            db,
            fetcher,
            monitor,
            freshness: Duration::seconds(crate::config::DEFAULT_STATE_CACHE_TTL_SECS as i64),
        }
    }

    /// Create a lens against the public RIPEstat endpoint with no live
    /// monitor
    pub fn ris(db: &'a VantageDatabase) -> Self {
        Self::new(db, Box::new(RisFetcher::new()), Box::new(NoopMonitor))
    }

    /// Create a lens wired from a configuration
    pub fn from_config(db: &'a VantageDatabase, config: &VantageConfig) -> Self {
        let fetcher = Box::new(RisFetcher::with_base_url(config.ris_base_url.clone()));
        let monitor: Box<dyn LiveMonitor> = match &config.monitor_url {
            Some(url) => Box::new(HttpMonitor::new(url.clone())),
            None => Box::new(NoopMonitor),
        };
        Self::new(db, fetcher, monitor).with_freshness_secs(config.state_cache_ttl_secs)
    }

    /// Override the cache freshness window
    pub fn with_freshness_secs(mut self, secs: u64) -> Self {
        self.freshness = Duration::seconds(secs as i64);
        self
    }

    /// Resolve the routing state for a query
    ///
    /// Validation failures are raised before any I/O. Queries with an
    /// explicit timestamp never touch the store in either direction. Live
    /// registration failures are logged and never fail the resolution.
    pub fn resolve(&self, query: &StateQuery) -> Result<ResourceState, ResolveError> {
        let query = query.validate()?;
        let started_at = Utc::now();

        // Cache applies only to current-state queries
        let cached = if query.timestamp.is_none() {
            let cutoff = started_at - self.freshness;
            self.db
                .states()
                .find_fresh(&query.resources, &query.collectors, cutoff)
                .map_err(ResolveError::Persistence)?
        } else {
            None
        };

        let mut state = match cached {
            Some(state) => {
                info!(
                    "Cache hit for {:?} (queried_at {})",
                    query.resources, state.queried_at
                );
                state
            }
            None => {
                let raw = self
                    .fetcher
                    .fetch(&FetchParams::from_query(&query))
                    .map_err(ResolveError::Upstream)?;
                let parsed =
                    parse_raw_state(&raw, &query, started_at).map_err(ResolveError::Upstream)?;

                if query.timestamp.is_none() {
                    self.db
                        .states()
                        .upsert(&parsed)
                        .map_err(ResolveError::Persistence)?
                } else {
                    parsed
                }
            }
        };

        if query.timestamp.is_none() && query.live && !state.live {
            self.register_live(&mut state);
        }

        Ok(filter_communities(state, &query.communities))
    }

    /// Best-effort live registration; failures are logged, never propagated
    fn register_live(&self, state: &mut ResourceState) {
        match self.monitor.add_state(state) {
            Ok(()) => {
                let Some(id) = state.id else {
                    return;
                };
                match self.db.states().set_live(id) {
                    Ok(()) => state.live = true,
                    Err(e) => warn!("Failed to persist live flag for state {}: {:#}", id, e),
                }
            }
            Err(e) => {
                warn!(
                    "Live monitor registration failed for {:?}: {:#}",
                    state.resources, e
                );
            }
        }
    }
}

/// Restrict routes to those sharing at least one requested community tag
///
/// Applies to the transient return value only; the stored document keeps
/// its full route set. `prepends` still describes the unfiltered set.
fn filter_communities(mut state: ResourceState, communities: &[String]) -> ResourceState {
    if communities.is_empty() {
        return state;
    }
    state
        .routes
        .retain(|route| route.community.iter().any(|c| communities.contains(c)));
    state
}
