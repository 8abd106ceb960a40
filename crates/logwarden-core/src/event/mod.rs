//! Event types for logwarden.
//!
//! An [`Event`] is one normalized, timestamped, actor-attributed security
//! observation. Events arrive from an external normalization step (raw-line
//! tokenization plus semantic template clustering) as [`RawRecord`]s; the
//! engine itself never parses unstructured text. All rule matching runs on
//! `message` -- `template` is advisory metadata and no rule depends on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor key used when an event carries neither a source address nor a host.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// Severity assigned to a detection rule and carried into its detections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A log record as produced by the external normalization collaborator,
/// before ids and parsed timestamps are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// ISO-8601 timestamp, parsed by the caller.
    pub timestamp: String,
    pub host: String,
    pub message: String,
    /// Source address of the actor, when attribution is available.
    #[serde(default)]
    pub src_ip: String,
    /// Normalized message template from the external clustering step.
    #[serde(default)]
    pub template: Option<String>,
}

/// One normalized observation, the unit the engine operates on.
///
/// The event collection handed to the engine is immutable for the duration
/// of a run; rules only ever read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id, assigned in stream arrival order by the normalizer.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub host: String,
    #[serde(default)]
    pub src_ip: String,
    /// Advisory normalized form of the message; never required for a rule
    /// to fire.
    #[serde(default)]
    pub template: String,
    /// Raw text every pattern and heuristic matches against.
    pub message: String,
}

impl Event {
    /// The identity this event is correlated under: source address if
    /// present, else host, else [`UNKNOWN_ACTOR`].
    pub fn actor_key(&self) -> &str {
        if !self.src_ip.is_empty() {
            &self.src_ip
        } else if !self.host.is_empty() {
            &self.host
        } else {
            UNKNOWN_ACTOR
        }
    }

    /// Sort key giving the total order used throughout the engine:
    /// timestamp, with the id breaking ties deterministically.
    pub fn chrono_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(host: &str, src_ip: &str) -> Event {
        Event {
            id: 0,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 22, 10, 0, 0).unwrap(),
            host: host.into(),
            src_ip: src_ip.into(),
            template: String::new(),
            message: "test".into(),
        }
    }

    #[test]
    fn actor_key_prefers_src_ip() {
        assert_eq!(make_event("hostA", "10.0.0.5").actor_key(), "10.0.0.5");
    }

    #[test]
    fn actor_key_falls_back_to_host() {
        assert_eq!(make_event("hostA", "").actor_key(), "hostA");
    }

    #[test]
    fn actor_key_falls_back_to_unknown() {
        assert_eq!(make_event("", "").actor_key(), UNKNOWN_ACTOR);
    }

    #[test]
    fn severity_ordering_is_ordinal() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn raw_record_defaults_optional_fields() {
        let record: RawRecord = serde_json::from_str(
            r#"{"timestamp": "2025-10-22T10:00:00", "host": "hostA", "message": "Failed login"}"#,
        )
        .unwrap();
        assert!(record.src_ip.is_empty());
        assert!(record.template.is_none());
    }
}
