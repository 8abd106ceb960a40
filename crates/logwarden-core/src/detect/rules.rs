//! The exploit rule registry.
//!
//! Rules are a static, versioned specification: loaded once at process
//! start, compiled once, and never mutated during evaluation. Registry
//! iteration order is fixed so detection output order is reproducible
//! across runs.

use crate::detect::correlation::{
    CompiledCorrelation, Correlation, DEFAULT_BRUTE_FORCE_WINDOW_SECS,
    DEFAULT_MIN_FAILED_ATTEMPTS, DEFAULT_MIN_SCAN_EVENTS,
};
use crate::detect::matcher::PatternSet;
use crate::error::Result;
use crate::event::Severity;

/// One known exploit: literal/regex patterns plus a correlation heuristic.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable key, used in reports and for evidence linkage downstream.
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Ordered pattern list, matched case-insensitively against messages.
    pub patterns: Vec<String>,
    pub correlation: Correlation,
}

impl Rule {
    fn new(
        id: &str,
        name: &str,
        description: &str,
        severity: Severity,
        patterns: &[&str],
        correlation: Correlation,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            severity,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            correlation,
        }
    }
}

/// A rule with its matchers compiled, ready for evaluation.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    pub patterns: PatternSet,
    pub correlation: CompiledCorrelation,
}

impl CompiledRule {
    /// Compile a rule's patterns and heuristic. Any failure here is a fatal
    /// configuration error.
    pub fn compile(rule: Rule) -> Result<Self> {
        let patterns = PatternSet::compile(&rule.id, &rule.patterns)?;
        let correlation = rule.correlation.compile(&rule.id)?;
        Ok(Self {
            rule,
            patterns,
            correlation,
        })
    }
}

/// The built-in registry of known exploits, in fixed evaluation order.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "brute_force_ssh",
            "SSH Brute Force Attack",
            "Multiple failed login attempts followed by success",
            Severity::High,
            &[
                "Failed login",
                "Failed password",
                "Invalid user",
                "Successful login",
            ],
            Correlation::BruteForceLogin {
                min_failed_attempts: DEFAULT_MIN_FAILED_ATTEMPTS,
                window_secs: DEFAULT_BRUTE_FORCE_WINDOW_SECS,
            },
        ),
        Rule::new(
            "privilege_escalation",
            "Privilege Escalation",
            "User elevates privileges and modifies system files",
            Severity::Critical,
            &["sudo", "su -", "modified", "/etc/passwd", "/etc/shadow"],
            Correlation::PrivilegeEscalation {
                system_files: vec![
                    "/etc/passwd".to_string(),
                    "/etc/shadow".to_string(),
                    "/etc/sudoers".to_string(),
                ],
            },
        ),
        Rule::new(
            "port_scanning",
            "Network Port Scanning",
            "Reconnaissance activity - scanning multiple ports",
            Severity::Medium,
            &["port scan", "connection attempt", "SYN"],
            Correlation::PortScan {
                min_scan_events: DEFAULT_MIN_SCAN_EVENTS,
            },
        ),
        Rule::new(
            "sql_injection",
            "SQL Injection Attempt",
            "SQL-shaped payloads in request or query logs",
            Severity::High,
            &["SQL", "injection", "' OR '1'='1", "UNION SELECT", "DROP TABLE"],
            Correlation::SqlInjection,
        ),
        Rule::new(
            "command_injection",
            "Command Injection",
            "Shell-chaining tokens smuggled into input fields",
            Severity::Critical,
            &["; cat", "&& whoami", "| nc", "/bin/sh", "/bin/bash"],
            Correlation::CommandInjection,
        ),
        Rule::new(
            "data_exfiltration",
            "Data Exfiltration",
            "Outbound transfer tooling paired with file access",
            Severity::Critical,
            &["scp", "rsync", "curl", "wget", "unusual outbound"],
            Correlation::DataExfiltration,
        ),
        Rule::new(
            "buffer_overflow",
            "Buffer Overflow Attempt",
            "Crash due to stack smashing or memory corruption",
            Severity::Critical,
            &[
                "SIGSEGV",
                "core dumped",
                "stack smashing detected",
                "memory violation",
                "killed by SIGSEGV",
            ],
            Correlation::BufferOverflow,
        ),
    ]
}
