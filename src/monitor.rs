//! Live-monitor collaborator
//!
//! Continuous monitoring of a resolved state is handled by an external
//! collaborator whose internals (polling, streaming) are not this crate's
//! concern. The pipeline only needs one operation, registration, modeled
//! here as a trait so callers and tests can inject their own.

use anyhow::{Context, Result};
use tracing::debug;

use crate::database::ResourceState;

/// External live-monitor interface
///
/// Registration is best effort: the pipeline logs a failure and keeps the
/// resolved state, it never unwinds the resolution.
pub trait LiveMonitor {
    /// Hand a resolved state to the monitor for continuous tracking
    fn add_state(&self, state: &ResourceState) -> Result<()>;
}

/// Monitor client that POSTs the state to an HTTP endpoint
pub struct HttpMonitor {
    endpoint: String,
}

impl HttpMonitor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl LiveMonitor for HttpMonitor {
    fn add_state(&self, state: &ResourceState) -> Result<()> {
        ureq::post(&self.endpoint)
            .send_json(state)
            .with_context(|| format!("Monitor registration at '{}' failed", self.endpoint))?;
        Ok(())
    }
}

/// Monitor that accepts every registration without doing anything
///
/// Used when no monitor endpoint is configured.
pub struct NoopMonitor;

impl LiveMonitor for NoopMonitor {
    fn add_state(&self, state: &ResourceState) -> Result<()> {
        debug!(
            "No live monitor configured, skipping registration for {:?}",
            state.resources
        );
        Ok(())
    }
}
