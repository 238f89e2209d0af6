#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    Persistent,
    Readonly,
    Training,
    #[serde(other)]
    Unknown,
}

/// A workspace session as reported by the backend. The client only ever
/// observes these, it never writes them back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Raw status string reported by the orchestrator.
    pub state: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: String,
}
