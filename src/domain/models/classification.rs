use serde::Deserialize;
use serde::Serialize;

/// Closed display vocabulary every raw session state is mapped into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClassification {
    pub display_text: String,
    pub severity: Severity,
}

impl StateClassification {
    pub fn new(display_text: &str, severity: Severity) -> StateClassification {
        return StateClassification {
            display_text: display_text.to_string(),
            severity,
        };
    }
}
