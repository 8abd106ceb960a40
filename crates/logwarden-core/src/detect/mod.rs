//! Exploit detection: rule registry, pattern matching, and per-actor
//! correlation.
//!
//! A [`DetectionEngine`] holds the compiled rule registry. For each rule it
//! combines global pattern hits over the full corpus with a rule-specific
//! correlation heuristic evaluated per actor, sums the contributions into a
//! capped confidence score, and filters the results against a minimum
//! confidence threshold.

pub mod correlation;
pub mod engine;
pub mod matcher;
pub mod rules;

pub use correlation::{Correlation, CorrelationHit};
pub use engine::{filter_detections, Detection, DetectionEngine};
pub use matcher::PatternSet;
pub use rules::{builtin_rules, CompiledRule, Rule};
