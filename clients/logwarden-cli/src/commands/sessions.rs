//! The `sessions` subcommand: print the actor sessions in a record file.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use logwarden_core::session::sessionize;

pub fn run(input: &Path, timeout_secs: i64) -> Result<()> {
    let events = super::detect::load_events(input)?;
    let sessions = sessionize(&events, timeout_secs);
    info!(
        events = events.len(),
        sessions = sessions.len(),
        timeout_secs,
        "sessionized input"
    );

    println!(
        "{} session(s) across {} event(s), timeout {}s:",
        sessions.len(),
        events.len(),
        timeout_secs
    );
    for session in &sessions {
        println!(
            "- {}  actor={}  {} .. {}  {} event(s)",
            session.session_id,
            session.actor,
            session.start.format("%Y-%m-%dT%H:%M:%S"),
            session.end.format("%Y-%m-%dT%H:%M:%S"),
            session.events.len()
        );
    }
    Ok(())
}
