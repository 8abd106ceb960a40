//! The `detect` subcommand: load records, evaluate, report.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use logwarden_core::config::EngineConfig;
use logwarden_core::detect::DetectionEngine;
use logwarden_core::event::{Event, RawRecord};
use logwarden_core::report::{self, RunReport};

pub fn run(
    input: &Path,
    threshold: Option<i64>,
    output: Option<&Path>,
    config: &EngineConfig,
) -> Result<()> {
    let events = load_events(input)?;
    info!(count = events.len(), "loaded events");

    let threshold = resolve_threshold(threshold, config);
    let engine = DetectionEngine::with_builtin_rules()?;
    let detections = engine.detect(&events, threshold);
    info!(
        detections = detections.len(),
        threshold, "detection run complete"
    );

    print!("{}", report::render_text(&detections, threshold));

    if let Some(path) = output {
        let run = RunReport::new(
            Uuid::new_v4().to_string(),
            Utc::now(),
            events.len(),
            threshold,
            detections,
        );
        let data = serde_json::to_string_pretty(&run)?;
        std::fs::write(path, data)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }

    Ok(())
}

/// Read a JSON array of normalized records and convert them to events.
pub(crate) fn load_events(path: &Path) -> Result<Vec<Event>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading records from {}", path.display()))?;
    let records: Vec<RawRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing records from {}", path.display()))?;
    Ok(normalize(records))
}

/// Assign sequential ids and parsed timestamps. A record with an
/// unparseable timestamp keeps flowing with the epoch timestamp rather
/// than being dropped.
pub(crate) fn normalize(records: Vec<RawRecord>) -> Vec<Event> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let timestamp = match parse_timestamp(&record.timestamp) {
                Ok(ts) => ts,
                Err(err) => {
                    warn!(record = i, raw = %record.timestamp, %err, "unparseable timestamp, using epoch");
                    DateTime::<Utc>::UNIX_EPOCH
                }
            };
            Event {
                id: i as u64,
                timestamp,
                host: record.host,
                src_ip: record.src_ip,
                template: record.template.unwrap_or_else(|| record.message.clone()),
                message: record.message,
            }
        })
        .collect()
}

/// Accept RFC 3339 timestamps as well as the naive ISO form log shippers
/// commonly emit (`2025-10-22T10:00:00`), read as UTC.
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
}

fn resolve_threshold(flag: Option<i64>, config: &EngineConfig) -> u8 {
    let raw = flag
        .or_else(|| {
            std::env::var("DETECTION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(i64::from(config.min_confidence));
    raw.clamp(0, 100) as u8
}
