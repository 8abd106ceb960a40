//! Compiled rule pattern sets.
//!
//! A rule's pattern list is compiled exactly once, at registry construction,
//! and reused for the whole run -- never per event. Compiled sets are
//! read-only and shareable across evaluations.

use regex::{Regex, RegexBuilder};

use crate::error::{DetectError, Result};
use crate::event::Event;

#[derive(Debug)]
struct CompiledPattern {
    /// The pattern as written in the rule, reported verbatim as evidence.
    literal: String,
    regex: Regex,
}

/// A rule's patterns, compiled case-insensitively.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compile `patterns` for `rule_id`. An uncompilable pattern is a fatal
    /// configuration error surfaced here, at startup.
    pub fn compile(rule_id: &str, patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| DetectError::InvalidPattern {
                    rule_id: rule_id.to_string(),
                    pattern: pattern.clone(),
                    source,
                })?;
            compiled.push(CompiledPattern {
                literal: pattern.clone(),
                regex,
            });
        }
        Ok(Self { patterns: compiled })
    }

    /// Pattern literals matching at least one message anywhere in the
    /// corpus, in declaration order.
    pub fn global_matches<'a>(&'a self, events: &[Event]) -> Vec<&'a str> {
        self.patterns
            .iter()
            .filter(|p| events.iter().any(|e| p.regex.is_match(&e.message)))
            .map(|p| p.literal.as_str())
            .collect()
    }

    /// Does any pattern in this set match any message in one actor's group?
    pub fn matches_any(&self, events: &[&Event]) -> bool {
        self.patterns
            .iter()
            .any(|p| events.iter().any(|e| p.regex.is_match(&e.message)))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
