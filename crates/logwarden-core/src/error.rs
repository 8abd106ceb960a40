//! Error types for the detection engine.
//!
//! Everything here is a configuration error: raised while building the rule
//! registry, fatal at startup, and never produced while evaluating events.
//! Malformed input records degrade locally instead (see the event module)
//! and an empty detection list is a valid outcome, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("rule `{rule_id}`: pattern `{pattern}` does not compile: {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule `{rule_id}`: sensitive-path set does not compile: {source}")]
    InvalidTokenSet {
        rule_id: String,
        #[source]
        source: aho_corasick::BuildError,
    },

    #[error("rule `{rule_id}`: indicator `{indicator}` must be at least 1, got {value}")]
    InvalidIndicator {
        rule_id: String,
        indicator: &'static str,
        value: i64,
    },
}

pub type Result<T> = std::result::Result<T, DetectError>;
