//! Transition record wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::state::Transition;

/// One up/down change of a host, written as a single JSON line.
///
/// ```text
/// {"Timestamp":"2024-01-01T00:00:00Z","UnixNano":1704067200000000000,
///  "Host":"example.com","Ip":"93.184.216.34","Transition":"up to down","State":false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub unix_nano: i64,
    pub host: String,
    /// Resolved address, empty if the host never resolved.
    pub ip: String,
    pub transition: Transition,
    /// State after the transition.
    pub state: bool,
}

impl TransitionRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        unix_nano: i64,
        host: impl Into<String>,
        ip: impl Into<String>,
        transition: Transition,
    ) -> Self {
        Self {
            timestamp,
            unix_nano,
            host: host.into(),
            ip: ip.into(),
            transition,
            state: transition.new_state(),
        }
    }

    /// Encode as one newline-terminated JSON line.
    pub fn to_json_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
