//! Upstream BGP state fetching
//!
//! Talks to the RIPEstat `bgp-state` data endpoint. The fetcher sits behind
//! a one-method trait so the resolution pipeline can be exercised in tests
//! without the network.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::StateQuery;
use crate::config::DEFAULT_RIS_BASE_URL;

/// Minute-precision UTC format for explicit historical queries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// One raw routing table entry from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRoute {
    /// `"{collector}-{peer}"`, e.g. `"3-1234"`
    pub source_id: String,
    /// Ordered AS path
    pub path: Vec<u32>,
    /// Community tags
    #[serde(default)]
    pub community: Vec<String>,
    /// Prefix the entry was observed for
    pub target_prefix: String,
}

/// Raw payload from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawState {
    /// Provider-reported query time, free-form
    pub query_time: String,
    #[serde(default)]
    pub bgp_state: Vec<RawRoute>,
}

/// RIPEstat response envelope; only the `data` field matters here
#[derive(Debug, Deserialize)]
struct RisEnvelope {
    data: RawState,
}

/// Request parameters for an upstream fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub resources: Vec<String>,
    pub collectors: Vec<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl FetchParams {
    /// Build fetch parameters from a validated query
    pub fn from_query(query: &StateQuery) -> Self {
        Self {
            resources: query.resources.clone(),
            collectors: query.collectors.clone(),
            timestamp: query.timestamp,
        }
    }

    /// Render the query string for the provider
    fn to_query_string(&self) -> String {
        let mut params = vec![format!("resource={}", self.resources.join(","))];
        if !self.collectors.is_empty() {
            let rrcs = self
                .collectors
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(format!("rrcs={}", rrcs));
        }
        if let Some(ts) = self.timestamp {
            params.push(format!("timestamp={}", ts.format(TIMESTAMP_FORMAT)));
        }
        params.join("&")
    }
}

/// Upstream provider interface
///
/// One implementation talks to RIPEstat; tests substitute doubles to
/// observe whether the pipeline fetched at all.
pub trait StateFetcher {
    /// Retrieve the raw BGP state for the given parameters
    ///
    /// Transport failures and non-success responses are returned as-is;
    /// no retries are performed at this level.
    fn fetch(&self, params: &FetchParams) -> Result<RawState>;
}

/// Fetcher backed by the RIPEstat data API
pub struct RisFetcher {
    base_url: String,
}

impl RisFetcher {
    /// Create a fetcher against the public RIPEstat endpoint
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_RIS_BASE_URL)
    }

    /// Create a fetcher against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for RisFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateFetcher for RisFetcher {
    fn fetch(&self, params: &FetchParams) -> Result<RawState> {
        let url = format!(
            "{}/bgp-state/data.json?{}",
            self.base_url,
            params.to_query_string()
        );

        let envelope = ureq::get(&url)
            .call()
            .with_context(|| format!("Request to '{}' failed", url))?
            .body_mut()
            .read_json::<RisEnvelope>()
            .with_context(|| format!("Malformed response from '{}'", url))?;

        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_string_resources_only() {
        let params = FetchParams {
            resources: vec!["1.2.3.0/24".to_string(), "10.0.0.1".to_string()],
            collectors: vec![],
            timestamp: None,
        };
        assert_eq!(params.to_query_string(), "resource=1.2.3.0/24,10.0.0.1");
    }

    #[test]
    fn test_query_string_with_collectors() {
        let params = FetchParams {
            resources: vec!["1.2.3.0/24".to_string()],
            collectors: vec![3, 12],
            timestamp: None,
        };
        assert_eq!(
            params.to_query_string(),
            "resource=1.2.3.0/24&rrcs=3,12"
        );
    }

    #[test]
    fn test_query_string_timestamp_minute_precision() {
        let ts = Utc.with_ymd_and_hms(2023, 10, 11, 8, 30, 45).unwrap();
        let params = FetchParams {
            resources: vec!["1.2.3.0/24".to_string()],
            collectors: vec![],
            timestamp: Some(ts),
        };
        // seconds are dropped
        assert_eq!(
            params.to_query_string(),
            "resource=1.2.3.0/24&timestamp=2023-10-11T08:30"
        );
    }

    #[test]
    fn test_raw_state_deserialization() {
        let json = r#"{
            "query_time": "2023-10-11T08:00:00",
            "bgp_state": [
                {
                    "source_id": "3-1234",
                    "path": [100, 200, 300],
                    "community": ["100:200"],
                    "target_prefix": "1.2.3.0/24"
                }
            ]
        }"#;

        let raw: RawState = serde_json::from_str(json).unwrap();
        assert_eq!(raw.query_time, "2023-10-11T08:00:00");
        assert_eq!(raw.bgp_state.len(), 1);
        assert_eq!(raw.bgp_state[0].source_id, "3-1234");
        assert_eq!(raw.bgp_state[0].path, vec![100, 200, 300]);
    }
}
