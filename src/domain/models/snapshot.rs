#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::StateClassification;
use super::StepProgress;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    /// No session attached.
    #[default]
    Idle,
    Polling,
    Completed,
    Failed,
    /// The transport failed while tracking. Polling has stopped.
    Disconnected,
}

impl Lifecycle {
    pub fn is_terminal(&self) -> bool {
        return matches!(
            self,
            Lifecycle::Completed | Lifecycle::Failed | Lifecycle::Disconnected
        );
    }

    /// Terminal states a caller should report as unsuccessful.
    pub fn is_failure(&self) -> bool {
        return matches!(self, Lifecycle::Failed | Lifecycle::Disconnected);
    }
}

/// Immutable view of a tracked session handed to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub lifecycle: Lifecycle,
    pub session_id: Option<String>,
    pub raw_state: Option<String>,
    pub classification: Option<StateClassification>,
    pub steps: Vec<StepProgress>,
    /// Poll sequence the data came from. Zero is the record passed to attach.
    pub sequence: u64,
    pub observed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Snapshot {
    /// Sentinel published before anything has been attached.
    pub fn not_started() -> Snapshot {
        return Snapshot::default();
    }

    pub fn is_started(&self) -> bool {
        return self.session_id.is_some();
    }
}
