//! The detection engine: rule evaluation, confidence aggregation, and
//! threshold filtering.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detect::correlation::CorrelationHit;
use crate::detect::rules::{builtin_rules, CompiledRule, Rule};
use crate::error::Result;
use crate::event::{Event, Severity};
use crate::session::group_by_actor;

/// Confidence points for each distinct rule pattern matching anywhere in
/// the corpus.
const PATTERN_BASE_SCORE: u32 = 5;

/// One rule's verdict for a run: severity, confidence, and evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "id")]
    pub rule_id: String,
    pub name: String,
    pub severity: Severity,
    /// 0-100, additive across pattern hits and the correlation bonus.
    pub confidence: u8,
    /// Human-readable evidence: matched pattern literals in rule order,
    /// then correlation descriptors.
    pub matched: Vec<String>,
    /// Ids of the events behind the qualifying correlation condition, for
    /// precise linkage downstream. Empty when only pattern hits fired.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_event_ids: Vec<u64>,
}

/// Evaluates the fixed rule registry over a batch of events.
///
/// Construction compiles every rule's matchers; evaluation shares them
/// read-only and mutates nothing, so identical input always produces an
/// identical detection list.
#[derive(Debug)]
pub struct DetectionEngine {
    rules: Vec<CompiledRule>,
}

impl DetectionEngine {
    /// Build an engine from a rule set. Fails fast on the first rule whose
    /// patterns or thresholds do not compile.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Build an engine with the built-in exploit registry.
    pub fn with_builtin_rules() -> Result<Self> {
        Self::new(builtin_rules())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate every rule over the corpus, in registry order. Emits one
    /// detection per rule with confidence > 0, capped at 100.
    ///
    /// Per rule: +5 for each distinct pattern matching anywhere, plus the
    /// correlation bonus of the highest-scoring qualifying actor (actors
    /// checked in first-seen order, the earliest winning ties, so the actor
    /// whose evidence is reported is deterministic).
    pub fn evaluate(&self, events: &[Event]) -> Vec<Detection> {
        let groups = group_by_actor(events);
        let mut detections = Vec::new();

        for compiled in &self.rules {
            let mut confidence: u32 = 0;
            let mut matched: Vec<String> = Vec::new();

            for literal in compiled.patterns.global_matches(events) {
                matched.push(literal.to_string());
                confidence += PATTERN_BASE_SCORE;
            }

            let mut best: Option<(String, CorrelationHit)> = None;
            for (actor, group) in &groups {
                if let Some(hit) = compiled.correlation.evaluate(group) {
                    debug!(
                        rule = %compiled.rule.id,
                        actor = %actor,
                        bonus = hit.bonus,
                        "correlation condition met"
                    );
                    // Strictly-greater keeps the earliest actor on ties.
                    let better = match &best {
                        Some((_, existing)) => hit.bonus > existing.bonus,
                        None => true,
                    };
                    if better {
                        best = Some((actor.clone(), hit));
                    }
                }
            }

            let mut evidence_event_ids = Vec::new();
            if let Some((actor, hit)) = best {
                confidence += u32::from(hit.bonus);
                if let Some(descriptor) = hit.descriptor {
                    if !matched.contains(&descriptor) {
                        matched.push(descriptor);
                    }
                }
                evidence_event_ids = hit.event_ids;
                warn!(
                    rule = %compiled.rule.id,
                    actor = %actor,
                    confidence,
                    "exploit rule fired"
                );
            }

            if confidence > 0 {
                detections.push(Detection {
                    rule_id: compiled.rule.id.clone(),
                    name: compiled.rule.name.clone(),
                    severity: compiled.rule.severity,
                    confidence: confidence.min(100) as u8,
                    matched,
                    evidence_event_ids,
                });
            }
        }

        detections
    }

    /// [`evaluate`](Self::evaluate) followed by [`filter_detections`].
    pub fn detect(&self, events: &[Event], min_confidence: u8) -> Vec<Detection> {
        filter_detections(self.evaluate(events), min_confidence)
    }
}

/// Drop detections below `min_confidence`. The threshold is clamped to
/// 0-100 and the boundary is inclusive: a detection exactly at the
/// threshold is kept.
pub fn filter_detections(detections: Vec<Detection>, min_confidence: u8) -> Vec<Detection> {
    let threshold = min_confidence.min(100);
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

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

    fn detection(confidence: u8) -> Detection {
        Detection {
            rule_id: "test_rule".into(),
            name: "Test Rule".into(),
            severity: Severity::High,
            confidence,
            matched: vec![],
            evidence_event_ids: vec![],
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let engine = DetectionEngine::with_builtin_rules().unwrap();
        assert!(engine.evaluate(&[]).is_empty());
        assert!(engine.detect(&[], 0).is_empty());
    }

    #[test]
    fn filter_boundary_is_inclusive() {
        let kept = filter_detections(vec![detection(50)], 50);
        assert_eq!(kept.len(), 1, "confidence equal to the threshold is kept");

        let dropped = filter_detections(vec![detection(49)], 50);
        assert!(dropped.is_empty(), "one point below the threshold is dropped");
    }

    #[test]
    fn filter_clamps_oversized_thresholds() {
        let kept = filter_detections(vec![detection(100)], u8::MAX);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn base_score_counts_distinct_patterns_once() {
        // Two events hit the same single pattern; the base contribution
        // stays at one increment.
        let events = vec![
            make_event(0, 0, "10.0.0.5", "core dumped in /var/crash"),
            make_event(1, 5, "10.0.0.9", "core dumped again"),
        ];
        let engine = DetectionEngine::with_builtin_rules().unwrap();
        let detections = engine.evaluate(&events);
        let bof = detections
            .iter()
            .find(|d| d.rule_id == "buffer_overflow")
            .expect("crash rule fires");
        // +5 for the one matching pattern, +65 correlation.
        assert_eq!(bof.confidence, 70);
        assert_eq!(
            bof.matched,
            vec!["core dumped".to_string(), "crash / core / SIGSEGV".to_string()]
        );
    }

    #[test]
    fn correlation_bonus_applies_once_across_actors() {
        // Both actors qualify independently; the bonus must not stack.
        let events = vec![
            make_event(0, 0, "10.0.0.9", "SIGSEGV received by pid 432"),
            make_event(1, 5, "10.0.0.13", "SIGSEGV received by pid 977"),
        ];
        let engine = DetectionEngine::with_builtin_rules().unwrap();
        let detections = engine.evaluate(&events);
        let bof = detections
            .iter()
            .find(|d| d.rule_id == "buffer_overflow")
            .expect("crash rule fires");
        // +5 base ("SIGSEGV") + 65, not +130.
        assert_eq!(bof.confidence, 70);
        // Evidence comes from the first-seen qualifying actor.
        assert_eq!(bof.evidence_event_ids, vec![0]);
    }

    #[test]
    fn higher_bonus_actor_wins_evidence_selection() {
        // First actor reaches only the outbound-transfer half of the
        // exfiltration heuristic; the second stacks file access on top.
        let events = vec![
            make_event(0, 0, "10.0.0.5", "curl https://drop.example"),
            make_event(1, 10, "10.0.0.7", "rsync -a /data remote:"),
            make_event(2, 20, "10.0.0.7", "read /data/customers.db"),
        ];
        let engine = DetectionEngine::with_builtin_rules().unwrap();
        let detections = engine.evaluate(&events);
        let exfil = detections
            .iter()
            .find(|d| d.rule_id == "data_exfiltration")
            .expect("exfiltration rule fires");
        // Base: "curl" and "rsync" matched (+10); bonus from the stacked
        // actor (+50).
        assert_eq!(exfil.confidence, 60);
        assert!(exfil
            .matched
            .contains(&"outbound transfer + file access".to_string()));
        assert_eq!(exfil.evidence_event_ids, vec![1, 2]);
    }
}
