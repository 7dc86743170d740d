//! Resource state query and validation

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::errors::ValidationError;

/// A request to resolve the routing state of a set of resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateQuery {
    /// IP prefixes or addresses to resolve; must be non-empty
    pub resources: Vec<String>,

    /// Numeric ids of route collectors to restrict the query to
    #[serde(default)]
    pub collectors: Vec<u32>,

    /// Community tags to filter the returned routes by
    #[serde(default)]
    pub communities: Vec<String>,

    /// Explicit historical query time; bypasses the cache entirely
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Register the resolved state for continuous monitoring
    #[serde(default)]
    pub live: bool,
}

impl StateQuery {
    /// Create a query for the given resources
    pub fn new(resources: Vec<String>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    /// Restrict the query to specific collectors
    pub fn with_collectors(mut self, collectors: Vec<u32>) -> Self {
        self.collectors = collectors;
        self
    }

    /// Filter returned routes by community tags
    pub fn with_communities(mut self, communities: Vec<String>) -> Self {
        self.communities = communities;
        self
    }

    /// Resolve the state at a specific historical instant
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Request live-monitor registration
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Normalize and check the query
    ///
    /// Trims resource and community strings, then checks that `resources`
    /// is non-empty and that every entry parses as an IP address or a CIDR
    /// block. Every violation is collected; nothing stops at the first
    /// failure. Returns the normalized query or the full list of field
    /// errors.
    pub fn validate(&self) -> Result<StateQuery, ValidationError> {
        let mut errors = ValidationError::new();

        let mut normalized = self.clone();
        normalized.resources = self
            .resources
            .iter()
            .map(|r| r.trim().to_string())
            .collect();
        normalized.communities = self
            .communities
            .iter()
            .map(|c| c.trim().to_string())
            .collect();

        if normalized.resources.is_empty() {
            errors.push("resources", "At least one resource is required.");
        }

        // Per-entry domain check, skipped when the list itself is invalid
        if !errors.includes("resources") {
            for (idx, resource) in normalized.resources.iter().enumerate() {
                if !is_valid_resource(resource) {
                    errors.push(
                        format!("resources[{}]", idx),
                        "Resource is not a valid IP address or CIDR block.",
                    );
                }
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }
}

/// Whether a string is a syntactically valid IP address or CIDR block
fn is_valid_resource(resource: &str) -> bool {
    resource.parse::<IpAddr>().is_ok() || resource.parse::<IpNet>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ips_and_cidrs_pass() {
        let query = StateQuery::new(vec![
            "1.2.3.4".to_string(),
            "1.2.3.0/24".to_string(),
            "2001:db8::1".to_string(),
            "2001:db8::/32".to_string(),
        ]);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_invalid_resources_are_tagged_per_index() {
        let query = StateQuery::new(vec![
            "1.2.3.0/24".to_string(),
            "not-a-prefix".to_string(),
            "10.0.0.1".to_string(),
            "300.1.1.1".to_string(),
        ]);

        let err = query.validate().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.includes("resources[1]"));
        assert!(err.includes("resources[3]"));
    }

    #[test]
    fn test_empty_resources_rejected() {
        let query = StateQuery::new(vec![]);
        let err = query.validate().unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.includes("resources"));
    }

    #[test]
    fn test_resources_and_communities_are_trimmed() {
        let query = StateQuery::new(vec!["  1.2.3.0/24  ".to_string()])
            .with_communities(vec![" 100:200 ".to_string()]);

        let normalized = query.validate().unwrap();
        assert_eq!(normalized.resources, vec!["1.2.3.0/24".to_string()]);
        assert_eq!(normalized.communities, vec!["100:200".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let query = StateQuery::new(vec!["1.2.3.0/24".to_string()]);
        assert!(query.collectors.is_empty());
        assert!(query.communities.is_empty());
        assert!(query.timestamp.is_none());
        assert!(!query.live);
    }
}
