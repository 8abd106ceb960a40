//! Report assembly for detection runs.
//!
//! The engine's output is folded into two collaborator-facing shapes: a
//! plain-text summary consumed by the narrative-summary step, and a
//! serializable [`RunReport`] that becomes one field of the persisted
//! report object. Neither function performs any I/O.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::event::Event;

/// The per-run report payload handed to the persistence collaborator.
///
/// `run_id` and `generated_at` are supplied by the caller so the engine
/// itself stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub num_events: usize,
    pub detection_threshold: u8,
    pub detections: Vec<Detection>,
}

impl RunReport {
    pub fn new(
        run_id: String,
        generated_at: DateTime<Utc>,
        num_events: usize,
        detection_threshold: u8,
        detections: Vec<Detection>,
    ) -> Self {
        Self {
            run_id,
            generated_at,
            num_events,
            detection_threshold,
            detections,
        }
    }
}

/// Render the human-readable detection summary.
pub fn render_text(detections: &[Detection], threshold: u8) -> String {
    let mut out = String::from("Exploit Detection Report:\n");
    if detections.is_empty() {
        out.push_str(&format!(
            "No known exploits detected above threshold {threshold}%.\n"
        ));
        return out;
    }
    for detection in detections {
        out.push_str(&format!(
            "- {} ({}, {}%)\n",
            detection.name, detection.severity, detection.confidence
        ));
        if !detection.matched.is_empty() {
            out.push_str(&format!(
                "   Matched patterns: {}\n",
                detection.matched.join(", ")
            ));
        }
    }
    out
}

/// Select the events backing one detection, for downstream visualization.
///
/// Prefers the detection's precise event linkage; falls back to a
/// case-insensitive scan of the matched descriptors over every message.
pub fn relevant_events<'a>(detection: &Detection, events: &'a [Event]) -> Vec<&'a Event> {
    if !detection.evidence_event_ids.is_empty() {
        let ids: HashSet<u64> = detection.evidence_event_ids.iter().copied().collect();
        return events.iter().filter(|e| ids.contains(&e.id)).collect();
    }

    let needles: Vec<String> = detection.matched.iter().map(|m| m.to_lowercase()).collect();
    events
        .iter()
        .filter(|e| {
            let message = e.message.to_lowercase();
            needles.iter().any(|needle| message.contains(needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use chrono::TimeZone;

    fn make_event(id: u64, message: &str) -> Event {
        Event {
            id,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 22, 10, 0, 0).unwrap(),
            host: "hostA".into(),
            src_ip: "10.0.0.5".into(),
            template: String::new(),
            message: message.into(),
        }
    }

    fn make_detection(evidence_event_ids: Vec<u64>, matched: Vec<&str>) -> Detection {
        Detection {
            rule_id: "buffer_overflow".into(),
            name: "Buffer Overflow Attempt".into(),
            severity: Severity::Critical,
            confidence: 75,
            matched: matched.into_iter().map(String::from).collect(),
            evidence_event_ids,
        }
    }

    #[test]
    fn text_report_lists_detections_with_matches() {
        let detections = vec![make_detection(vec![], vec!["core dumped"])];
        let text = render_text(&detections, 50);
        assert!(text.contains("Buffer Overflow Attempt (CRITICAL, 75%)"));
        assert!(text.contains("Matched patterns: core dumped"));
    }

    #[test]
    fn text_report_handles_the_empty_case() {
        let text = render_text(&[], 50);
        assert!(text.contains("No known exploits detected above threshold 50%."));
    }

    #[test]
    fn relevant_events_prefers_precise_linkage() {
        let events = vec![
            make_event(0, "core dumped in /var/crash"),
            make_event(1, "heartbeat ok"),
        ];
        let detection = make_detection(vec![0], vec!["core dumped"]);
        let selected = relevant_events(&detection, &events);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 0);
    }

    #[test]
    fn relevant_events_falls_back_to_matched_descriptors() {
        let events = vec![
            make_event(0, "CORE DUMPED in /var/crash"),
            make_event(1, "heartbeat ok"),
        ];
        let detection = make_detection(vec![], vec!["core dumped"]);
        let selected = relevant_events(&detection, &events);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 0);
    }

    #[test]
    fn run_report_round_trips_through_json() {
        let report = RunReport::new(
            "run-1".into(),
            Utc.with_ymd_and_hms(2025, 10, 22, 12, 0, 0).unwrap(),
            12,
            50,
            vec![make_detection(vec![0], vec!["core dumped"])],
        );
        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.detections.len(), 1);
        assert_eq!(parsed.detections[0].rule_id, "buffer_overflow");
    }
}
