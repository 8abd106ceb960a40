//! Actor-keyed sessionization.
//!
//! Events are partitioned by actor key and grouped into inactivity-bounded
//! sessions: a session is a maximal run of one actor's events where
//! consecutive timestamps differ by at most the timeout. Sessions close when
//! the next same-actor event breaks the timeout or when input is exhausted,
//! and are never reopened.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::Event;

/// Default inactivity timeout in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 600;

/// A maximal run of one actor's events bounded by an inactivity timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Derived from actor key and first event timestamp, so re-running on
    /// identical input yields identical ids.
    pub session_id: String,
    pub actor: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The actor's events in chronological order.
    pub events: Vec<Event>,
}

impl Session {
    fn open(actor: &str, first: &Event) -> Self {
        Self {
            session_id: format!("{actor}-{}", first.timestamp.to_rfc3339()),
            actor: actor.to_string(),
            start: first.timestamp,
            end: first.timestamp,
            events: vec![first.clone()],
        }
    }
}

/// References to `events` sorted by `(timestamp, id)` ascending.
pub fn sorted_by_time(events: &[Event]) -> Vec<&Event> {
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| e.chrono_key());
    ordered
}

/// Group events per actor key, actors in first-seen chronological order and
/// each group internally ordered by `(timestamp, id)`.
///
/// This is the grouping every per-actor correlation heuristic consumes.
pub fn group_by_actor(events: &[Event]) -> Vec<(String, Vec<&Event>)> {
    let mut groups: Vec<(String, Vec<&Event>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in sorted_by_time(events) {
        let actor = event.actor_key();
        match index.get(actor) {
            Some(&i) => groups[i].1.push(event),
            None => {
                index.insert(actor, groups.len());
                groups.push((actor.to_string(), vec![event]));
            }
        }
    }
    groups
}

/// Split events into inactivity-bounded sessions, one open session per actor
/// at a time.
///
/// A gap exactly equal to the timeout keeps the session open. Sessions closed
/// mid-stream come first in closure order; sessions still open at end of
/// input follow in first-seen actor order.
pub fn sessionize(events: &[Event], timeout_secs: i64) -> Vec<Session> {
    let timeout = Duration::seconds(timeout_secs);
    let mut sessions: Vec<Session> = Vec::new();
    let mut open: HashMap<String, Session> = HashMap::new();
    let mut actor_order: Vec<String> = Vec::new();

    for event in sorted_by_time(events) {
        let actor = event.actor_key();

        let extends = open
            .get(actor)
            .is_some_and(|cur| event.timestamp - cur.end <= timeout);
        if extends {
            let cur = open.get_mut(actor).expect("open session for actor");
            cur.events.push(event.clone());
            cur.end = event.timestamp;
            continue;
        }

        if let Some(closed) = open.remove(actor) {
            debug!(
                session = %closed.session_id,
                events = closed.events.len(),
                "session closed on inactivity"
            );
            sessions.push(closed);
        } else {
            actor_order.push(actor.to_string());
        }
        open.insert(actor.to_string(), Session::open(actor, event));
    }

    for actor in &actor_order {
        if let Some(session) = open.remove(actor) {
            sessions.push(session);
        }
    }
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(id: u64, offset_secs: i64, src_ip: &str, message: &str) -> Event {
        let base = Utc.with_ymd_and_hms(2025, 10, 22, 10, 0, 0).unwrap();
        Event {
            id,
            timestamp: base + Duration::seconds(offset_secs),
            host: "hostA".into(),
            src_ip: src_ip.into(),
            template: String::new(),
            message: message.into(),
        }
    }

    #[test]
    fn gap_within_timeout_stays_in_one_session() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 300, "10.0.0.5", "b"),
        ];
        let sessions = sessionize(&events, 600);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].events.len(), 2);
    }

    #[test]
    fn gap_exactly_at_timeout_stays_open() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 600, "10.0.0.5", "b"),
        ];
        let sessions = sessionize(&events, 600);
        assert_eq!(sessions.len(), 1, "boundary gap must not split the session");
    }

    #[test]
    fn gap_beyond_timeout_splits() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 601, "10.0.0.5", "b"),
        ];
        let sessions = sessionize(&events, 600);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].events.len(), 1);
        assert_eq!(sessions[1].events.len(), 1);
    }

    #[test]
    fn distinct_actors_never_merge() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 1, "10.0.0.7", "b"),
            make_event(2, 2, "10.0.0.5", "c"),
        ];
        let sessions = sessionize(&events, 600);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].actor, "10.0.0.5");
        assert_eq!(sessions[0].events.len(), 2);
        assert_eq!(sessions[1].actor, "10.0.0.7");
        assert_eq!(sessions[1].events.len(), 1);
    }

    #[test]
    fn single_event_session_is_valid() {
        let events = vec![make_event(0, 0, "10.0.0.5", "a")];
        let sessions = sessionize(&events, 600);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, sessions[0].end);
    }

    #[test]
    fn session_ids_are_deterministic() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 2000, "10.0.0.5", "b"),
        ];
        let first = sessionize(&events, 600);
        let second = sessionize(&events, 600);
        assert_eq!(first, second);
        assert_eq!(first[0].session_id, "10.0.0.5-2025-10-22T10:00:00+00:00");
    }

    #[test]
    fn events_without_attribution_group_under_unknown() {
        let mut orphan = make_event(0, 0, "", "a");
        orphan.host.clear();
        let sessions = sessionize(&[orphan], 600);
        assert_eq!(sessions[0].actor, "unknown");
    }

    #[test]
    fn group_by_actor_preserves_first_seen_order() {
        let events = vec![
            make_event(0, 0, "10.0.0.5", "a"),
            make_event(1, 1, "10.0.0.7", "b"),
            make_event(2, 2, "10.0.0.5", "c"),
        ];
        let groups = group_by_actor(&events);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "10.0.0.5");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "10.0.0.7");
    }
}
