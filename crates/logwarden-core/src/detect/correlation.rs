//! Per-rule correlation heuristics.
//!
//! Each rule kind carries one named heuristic from a closed set, evaluated
//! over a single actor's event group with a uniform contract: qualify or
//! not, and when qualifying, a fixed confidence bonus plus the evidence
//! behind it. Heuristic matchers are compiled once and shared across the
//! whole run.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use chrono::Duration;
use regex::{Regex, RegexBuilder};

use crate::error::{DetectError, Result};
use crate::event::Event;

/// Sliding window for counting repeated failed-login events, in seconds.
pub const DEFAULT_BRUTE_FORCE_WINDOW_SECS: i64 = 300;
/// Failed-login repeats required before the brute-force heuristic fires.
pub const DEFAULT_MIN_FAILED_ATTEMPTS: u32 = 3;
/// Distinct port tokens required before the port-scan heuristic fires.
pub const DEFAULT_MIN_SCAN_EVENTS: u32 = 2;

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("built-in heuristic pattern compiles")
}

static FAILED_LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| ci(r"failed (login|password)"));
static LOGIN_SUCCESS_RE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"successful login|accepted password"));
static ELEVATION_RE: LazyLock<Regex> = LazyLock::new(|| ci(r"\b(sudo|su -)\b"));
static PORT_RE: LazyLock<Regex> = LazyLock::new(|| ci(r":(\d+)|port\s+(\d+)"));
static OUTBOUND_TOOL_RE: LazyLock<Regex> = LazyLock::new(|| ci(r"\b(scp|rsync|curl|wget)\b"));
static FILE_ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| ci(r"\b(open|read|access)\b"));
static SQL_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"union select|' or '|drop table|select .* from"));
static SHELL_CHAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"(;\s*cat|&&\s*whoami|\|\s*nc|/bin/(sh|bash))"));
static CRASH_RE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"sigsegv|core dumped|stack smashing|memory violation"));

/// Which correlation heuristic a rule runs, with its thresholds.
///
/// One variant per rule kind; adding a kind means adding a variant here, not
/// branching on rule ids throughout the engine.
#[derive(Debug, Clone)]
pub enum Correlation {
    /// Repeated failed logins inside a sliding window, followed by a
    /// successful login from the same actor.
    BruteForceLogin {
        min_failed_attempts: u32,
        window_secs: i64,
    },
    /// A privilege-elevation event together with an event referencing a
    /// sensitive system file.
    PrivilegeEscalation { system_files: Vec<String> },
    /// Distinct port tokens across the actor's messages.
    PortScan { min_scan_events: u32 },
    /// Outbound-transfer tooling, with a stacking bonus when file access
    /// also appears.
    DataExfiltration,
    /// SQL-injection-shaped payload in any message.
    SqlInjection,
    /// Shell-chaining / command-injection tokens in any message.
    CommandInjection,
    /// Crash, core-dump, or memory-corruption signature in any message.
    BufferOverflow,
}

impl Correlation {
    /// Validate thresholds and build the matchers this heuristic owns.
    pub fn compile(&self, rule_id: &str) -> Result<CompiledCorrelation> {
        match self {
            Correlation::BruteForceLogin {
                min_failed_attempts,
                window_secs,
            } => {
                if *min_failed_attempts == 0 {
                    return Err(DetectError::InvalidIndicator {
                        rule_id: rule_id.to_string(),
                        indicator: "min_failed_attempts",
                        value: 0,
                    });
                }
                if *window_secs < 1 {
                    return Err(DetectError::InvalidIndicator {
                        rule_id: rule_id.to_string(),
                        indicator: "window_secs",
                        value: *window_secs,
                    });
                }
                Ok(CompiledCorrelation::BruteForceLogin {
                    min_failed_attempts: *min_failed_attempts,
                    window: Duration::seconds(*window_secs),
                })
            }
            Correlation::PrivilegeEscalation { system_files } => {
                let matcher = AhoCorasick::builder()
                    .ascii_case_insensitive(true)
                    .build(system_files)
                    .map_err(|source| DetectError::InvalidTokenSet {
                        rule_id: rule_id.to_string(),
                        source,
                    })?;
                Ok(CompiledCorrelation::PrivilegeEscalation {
                    system_files: matcher,
                })
            }
            Correlation::PortScan { min_scan_events } => {
                if *min_scan_events == 0 {
                    return Err(DetectError::InvalidIndicator {
                        rule_id: rule_id.to_string(),
                        indicator: "min_scan_events",
                        value: 0,
                    });
                }
                Ok(CompiledCorrelation::PortScan {
                    min_scan_events: *min_scan_events,
                })
            }
            Correlation::DataExfiltration => Ok(CompiledCorrelation::DataExfiltration),
            Correlation::SqlInjection => Ok(CompiledCorrelation::SqlInjection),
            Correlation::CommandInjection => Ok(CompiledCorrelation::CommandInjection),
            Correlation::BufferOverflow => Ok(CompiledCorrelation::BufferOverflow),
        }
    }
}

/// A heuristic with its matchers built, ready to run per actor.
#[derive(Debug)]
pub enum CompiledCorrelation {
    BruteForceLogin {
        min_failed_attempts: u32,
        window: Duration,
    },
    PrivilegeEscalation {
        system_files: AhoCorasick,
    },
    PortScan {
        min_scan_events: u32,
    },
    DataExfiltration,
    SqlInjection,
    CommandInjection,
    BufferOverflow,
}

/// Outcome of one heuristic qualifying on one actor's event group.
#[derive(Debug, Clone)]
pub struct CorrelationHit {
    /// Confidence points this heuristic contributes.
    pub bonus: u8,
    /// Human-readable evidence descriptor, when the qualifying condition
    /// carries one.
    pub descriptor: Option<String>,
    /// Ids of the events that satisfied the qualifying condition.
    pub event_ids: Vec<u64>,
}

impl CompiledCorrelation {
    /// Evaluate this heuristic over one actor's event group.
    pub fn evaluate(&self, events: &[&Event]) -> Option<CorrelationHit> {
        match self {
            CompiledCorrelation::BruteForceLogin {
                min_failed_attempts,
                window,
            } => brute_force(events, *min_failed_attempts, *window),
            CompiledCorrelation::PrivilegeEscalation { system_files } => {
                privilege_escalation(events, system_files)
            }
            CompiledCorrelation::PortScan { min_scan_events } => {
                port_scan(events, *min_scan_events)
            }
            CompiledCorrelation::DataExfiltration => data_exfiltration(events),
            CompiledCorrelation::SqlInjection => {
                message_shape(events, &SQL_SHAPE_RE, 60, "sql-like payloads")
            }
            CompiledCorrelation::CommandInjection => {
                message_shape(events, &SHELL_CHAIN_RE, 70, "command injection indicators")
            }
            CompiledCorrelation::BufferOverflow => {
                message_shape(events, &CRASH_RE, 65, "crash / core / SIGSEGV")
            }
        }
    }
}

/// Cumulative windowed count: every event matching `pattern` opens a window,
/// and every matching event from it forward (itself included) within the
/// window adds one. Overlapping windows therefore count the same event more
/// than once, so the total can exceed the number of matching events.
/// TODO(product): confirm whether that amplification for bursty event trains
/// is intended before replacing this with a deduplicated count.
fn windowed_count(ordered: &[&Event], pattern: &Regex, window: Duration) -> usize {
    let mut count = 0;
    for (i, trigger) in ordered.iter().enumerate() {
        if !pattern.is_match(&trigger.message) {
            continue;
        }
        for event in &ordered[i..] {
            if event.timestamp - trigger.timestamp > window {
                break;
            }
            if pattern.is_match(&event.message) {
                count += 1;
            }
        }
    }
    count
}

fn chronological<'a>(events: &[&'a Event]) -> Vec<&'a Event> {
    let mut ordered: Vec<&Event> = events.to_vec();
    ordered.sort_by_key(|e| e.chrono_key());
    ordered
}

fn brute_force(
    events: &[&Event],
    min_failed_attempts: u32,
    window: Duration,
) -> Option<CorrelationHit> {
    let ordered = chronological(events);
    let failed_count = windowed_count(&ordered, &FAILED_LOGIN_RE, window);

    let success_after = ordered.iter().any(|e| {
        LOGIN_SUCCESS_RE.is_match(&e.message)
            && ordered
                .iter()
                .any(|e2| FAILED_LOGIN_RE.is_match(&e2.message) && e2.timestamp <= e.timestamp)
    });

    if failed_count < min_failed_attempts as usize || !success_after {
        return None;
    }

    let event_ids = ordered
        .iter()
        .filter(|e| FAILED_LOGIN_RE.is_match(&e.message) || LOGIN_SUCCESS_RE.is_match(&e.message))
        .map(|e| e.id)
        .collect();
    Some(CorrelationHit {
        bonus: 60,
        descriptor: Some("failed login / successful login pattern".to_string()),
        event_ids,
    })
}

fn privilege_escalation(events: &[&Event], system_files: &AhoCorasick) -> Option<CorrelationHit> {
    let has_elevation = events.iter().any(|e| ELEVATION_RE.is_match(&e.message));
    let touches_system_file = events.iter().any(|e| system_files.is_match(&e.message));
    if !has_elevation || !touches_system_file {
        return None;
    }

    let event_ids = events
        .iter()
        .filter(|e| ELEVATION_RE.is_match(&e.message) || system_files.is_match(&e.message))
        .map(|e| e.id)
        .collect();
    Some(CorrelationHit {
        bonus: 70,
        descriptor: Some("sudo and system file modification".to_string()),
        event_ids,
    })
}

fn port_scan(events: &[&Event], min_scan_events: u32) -> Option<CorrelationHit> {
    let mut ports: BTreeSet<String> = BTreeSet::new();
    let mut event_ids = Vec::new();

    // First port token per message, like `:22` or `port 80`.
    for event in events {
        if let Some(caps) = PORT_RE.captures(&event.message) {
            if let Some(port) = caps.get(1).or_else(|| caps.get(2)) {
                ports.insert(port.as_str().to_string());
                event_ids.push(event.id);
            }
        }
    }

    if ports.len() < min_scan_events as usize {
        return None;
    }

    let listed = ports.iter().cloned().collect::<Vec<_>>().join(", ");
    Some(CorrelationHit {
        bonus: 50,
        descriptor: Some(format!("ports: {listed}")),
        event_ids,
    })
}

fn data_exfiltration(events: &[&Event]) -> Option<CorrelationHit> {
    let outbound: Vec<u64> = events
        .iter()
        .filter(|e| OUTBOUND_TOOL_RE.is_match(&e.message))
        .map(|e| e.id)
        .collect();
    if outbound.is_empty() {
        return None;
    }

    let file_access: Vec<u64> = events
        .iter()
        .filter(|e| FILE_ACCESS_RE.is_match(&e.message))
        .map(|e| e.id)
        .collect();
    if file_access.is_empty() {
        // Transfer tooling alone qualifies at half weight and carries no
        // descriptor of its own; the matched pattern literals stand in.
        return Some(CorrelationHit {
            bonus: 25,
            descriptor: None,
            event_ids: outbound,
        });
    }

    let mut event_ids = outbound;
    for id in file_access {
        if !event_ids.contains(&id) {
            event_ids.push(id);
        }
    }
    Some(CorrelationHit {
        bonus: 50,
        descriptor: Some("outbound transfer + file access".to_string()),
        event_ids,
    })
}

fn message_shape(
    events: &[&Event],
    pattern: &Regex,
    bonus: u8,
    descriptor: &str,
) -> Option<CorrelationHit> {
    let event_ids: Vec<u64> = events
        .iter()
        .filter(|e| pattern.is_match(&e.message))
        .map(|e| e.id)
        .collect();
    if event_ids.is_empty() {
        return None;
    }
    Some(CorrelationHit {
        bonus,
        descriptor: Some(descriptor.to_string()),
        event_ids,
    })
}
