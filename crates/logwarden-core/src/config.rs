//! Engine configuration, parsed from TOML by the caller.

use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_SESSION_TIMEOUT_SECS;

/// Tunables for a detection run.
///
/// Every field has a default so a partial (or absent) config file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inactivity gap in seconds that closes an actor session.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: i64,

    /// Detections below this confidence (0-100) are dropped from reports.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_session_timeout() -> i64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

fn default_min_confidence() -> u8 {
    50
}
