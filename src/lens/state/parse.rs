//! Raw payload normalization
//!
//! Turns the provider's raw `bgp_state` entries into [`RouteRecord`]s and an
//! unpersisted [`ResourceState`], detecting AS-path prepending along the way.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::warn;

use super::fetch::RawState;
use super::query::StateQuery;
use crate::database::{ResourceState, RouteRecord};

/// Whether any AS number occurs more than once in the path
///
/// Scans the entire path, not just adjacent positions; `[100, 200, 100]`
/// counts as prepended.
pub fn has_prepend(path: &[u32]) -> bool {
    let mut seen = HashSet::with_capacity(path.len());
    path.iter().any(|asn| !seen.insert(*asn))
}

/// Split a `source_id` like `"3-1234"` into (collector, source)
///
/// Splits on the first hyphen only; the source keeps any further hyphens.
fn parse_source_id(source_id: &str) -> Result<(u32, String)> {
    let (collector, source) = source_id
        .split_once('-')
        .ok_or_else(|| anyhow!("Missing hyphen in source_id '{}'", source_id))?;
    let collector = collector
        .parse::<u32>()
        .with_context(|| format!("Non-numeric collector in source_id '{}'", source_id))?;
    Ok((collector, source.to_string()))
}

/// Parse the provider's free-form query time
///
/// Unparsable values fall back to the current instant instead of failing
/// the resolution; the fallback is logged so it stays observable.
fn parse_query_time(query_time: &str) -> DateTime<Utc> {
    match dateparser::parse(query_time) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            warn!(
                "Unparsable upstream query_time '{}', falling back to current time",
                query_time
            );
            Utc::now()
        }
    }
}

/// Convert a raw payload into an unpersisted resource state
///
/// `started_at` is the instant the resolution began and becomes the state's
/// `timestamp`; `queried_at` comes from the provider (leniently parsed).
pub fn parse_raw_state(
    raw: &RawState,
    query: &StateQuery,
    started_at: DateTime<Utc>,
) -> Result<ResourceState> {
    let mut routes = Vec::with_capacity(raw.bgp_state.len());
    let mut prepends: u32 = 0;

    for entry in &raw.bgp_state {
        let (collector, source) = parse_source_id(&entry.source_id)?;
        let peer = *entry
            .path
            .first()
            .ok_or_else(|| anyhow!("Empty AS path for source_id '{}'", entry.source_id))?;
        let prepend = has_prepend(&entry.path);

        if prepend {
            prepends += 1;
        }
        routes.push(RouteRecord {
            source,
            collector,
            peer,
            path: entry.path.clone(),
            community: entry.community.clone(),
            prepend,
        });
    }

    Ok(ResourceState {
        id: None,
        resources: query.resources.clone(),
        collectors: query.collectors.clone(),
        routes,
        prepends,
        timestamp: started_at,
        queried_at: parse_query_time(&raw.query_time),
        live: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::state::fetch::RawRoute;
    use chrono::Duration;

    fn raw_route(source_id: &str, path: Vec<u32>, community: Vec<&str>) -> RawRoute {
        RawRoute {
            source_id: source_id.to_string(),
            path,
            community: community.into_iter().map(|c| c.to_string()).collect(),
            target_prefix: "1.2.3.0/24".to_string(),
        }
    }

    fn sample_query() -> StateQuery {
        StateQuery::new(vec!["1.2.3.0/24".to_string()]).with_collectors(vec![3])
    }

    #[test]
    fn test_has_prepend() {
        assert!(has_prepend(&[100, 200, 100]));
        assert!(has_prepend(&[100, 100, 200]));
        assert!(!has_prepend(&[100, 200, 300]));
        assert!(!has_prepend(&[100]));
        assert!(!has_prepend(&[]));
    }

    #[test]
    fn test_parse_source_id() {
        let (collector, source) = parse_source_id("3-1234").unwrap();
        assert_eq!(collector, 3);
        assert_eq!(source, "1234");
    }

    #[test]
    fn test_parse_source_id_splits_on_first_hyphen() {
        let (collector, source) = parse_source_id("12-peer-a").unwrap();
        assert_eq!(collector, 12);
        assert_eq!(source, "peer-a");
    }

    #[test]
    fn test_parse_source_id_rejects_malformed() {
        assert!(parse_source_id("nohyphen").is_err());
        assert!(parse_source_id("abc-123").is_err());
    }

    #[test]
    fn test_parse_raw_state_counts_prepends() {
        let raw = RawState {
            query_time: "2023-10-11T08:00:00".to_string(),
            bgp_state: vec![
                raw_route("3-1234", vec![100, 200, 300], vec!["A"]),
                raw_route("3-5678", vec![100, 200, 100], vec!["B"]),
                raw_route("12-9999", vec![500, 500, 600], vec![]),
            ],
        };

        let state = parse_raw_state(&raw, &sample_query(), Utc::now()).unwrap();
        assert_eq!(state.routes.len(), 3);
        assert_eq!(state.prepends, 2);
        assert_eq!(
            state.prepends as usize,
            state.routes.iter().filter(|r| r.prepend).count()
        );
        assert!(state.id.is_none());
        assert!(!state.live);
    }

    #[test]
    fn test_parse_raw_state_peer_is_path_head() {
        let raw = RawState {
            query_time: "2023-10-11T08:00:00".to_string(),
            bgp_state: vec![raw_route("3-1234", vec![100, 200, 300], vec![])],
        };

        let state = parse_raw_state(&raw, &sample_query(), Utc::now()).unwrap();
        assert_eq!(state.routes[0].peer, 100);
        assert_eq!(state.routes[0].peer, state.routes[0].path[0]);
        assert_eq!(state.routes[0].collector, 3);
        assert_eq!(state.routes[0].source, "1234");
    }

    #[test]
    fn test_parse_raw_state_rejects_empty_path() {
        let raw = RawState {
            query_time: "2023-10-11T08:00:00".to_string(),
            bgp_state: vec![raw_route("3-1234", vec![], vec![])],
        };

        assert!(parse_raw_state(&raw, &sample_query(), Utc::now()).is_err());
    }

    #[test]
    fn test_query_time_parsed_as_utc() {
        let raw = RawState {
            query_time: "2023-10-11T08:00:00Z".to_string(),
            bgp_state: vec![],
        };

        let state = parse_raw_state(&raw, &sample_query(), Utc::now()).unwrap();
        assert_eq!(
            state.queried_at.to_rfc3339(),
            "2023-10-11T08:00:00+00:00"
        );
    }

    #[test]
    fn test_unparsable_query_time_falls_back_to_now() {
        let raw = RawState {
            query_time: "definitely not a time".to_string(),
            bgp_state: vec![],
        };

        let before = Utc::now() - Duration::seconds(5);
        let state = parse_raw_state(&raw, &sample_query(), Utc::now()).unwrap();
        assert!(state.queried_at > before);
    }

    #[test]
    fn test_resources_and_collectors_copied_from_query() {
        let raw = RawState {
            query_time: "2023-10-11T08:00:00".to_string(),
            bgp_state: vec![],
        };

        let state = parse_raw_state(&raw, &sample_query(), Utc::now()).unwrap();
        assert_eq!(state.resources, vec!["1.2.3.0/24".to_string()]);
        assert_eq!(state.collectors, vec![3]);
    }
}
