#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Vantage - BGP resource state resolution and caching
//!
//! Vantage resolves the current or historical BGP routing state of a set of
//! IP prefixes by querying the RIPEstat `bgp-state` endpoint, normalizes the
//! result into route records with AS-path prepend detection, and caches
//! resolved states in a local SQLite database so repeated queries within the
//! freshness window never hit the upstream provider twice.
//!
//! # Architecture
//!
//! - **[`lens::state`]**: the resolution pipeline (`StateLens`) - validation,
//!   cache lookup, upstream fetch, normalization, atomic upsert, optional
//!   live-monitor registration, community filtering
//! - **[`database`]**: SQLite persistence (`VantageDatabase`, `StateRepository`)
//! - **[`monitor`]**: the live-monitor collaborator interface (`LiveMonitor`)
//! - **[`config`]**: configuration management (`VantageConfig`)
//! - **[`errors`]**: the resolution error taxonomy (`ResolveError`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vantage::{StateLens, StateQuery, VantageConfig, VantageDatabase};
//!
//! let config = VantageConfig::new(&None)?;
//! let db = VantageDatabase::open_in_dir(&config.data_dir)?;
//! let lens = StateLens::from_config(&db, &config);
//!
//! let query = StateQuery::new(vec!["1.2.3.0/24".to_string()])
//!     .with_collectors(vec![3])
//!     .with_live(true);
//!
//! let state = lens.resolve(&query)?;
//! println!("{} routes, {} prepended", state.routes.len(), state.prepends);
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod lens;
pub mod monitor;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{VantageConfig, DEFAULT_RIS_BASE_URL, DEFAULT_STATE_CACHE_TTL_SECS};

// =============================================================================
// Database
// =============================================================================

pub use database::{
    DatabaseConn, ResourceState, RouteRecord, SchemaDefinitions, SchemaManager, SchemaStatus,
    StateRepository, VantageDatabase, SCHEMA_VERSION,
};

// =============================================================================
// Resolution pipeline
// =============================================================================

pub use lens::state::{
    FetchParams, RawRoute, RawState, RisFetcher, StateFetcher, StateLens, StateQuery,
};

// =============================================================================
// Live monitor
// =============================================================================

pub use monitor::{HttpMonitor, LiveMonitor, NoopMonitor};

// =============================================================================
// Errors
// =============================================================================

pub use errors::{FieldError, ResolveError, ValidationError};
