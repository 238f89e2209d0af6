#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::step_progress::StepProgressEvaluator;
use crate::domain::models::PipelineSteps;
use crate::domain::models::Severity;
use crate::domain::models::StateClassification;
use crate::domain::models::StepAction;

/// Every state the backend is documented to emit. Keep this exhaustive: a
/// fatal state missing from here is shown as an in-progress warning and the
/// flow appears to hang.
const KNOWN_STATES: &[(&str, &str, Severity)] = &[
    // Scheduling, image pulls and container setup.
    ("Pending", "Session pending", Severity::Warning),
    ("Waiting", "Waiting for resources", Severity::Warning),
    ("Scheduled", "Session scheduled", Severity::Warning),
    ("TriggeredScaleUp", "Scaling up cluster", Severity::Warning),
    ("SuccessfulCreate", "Session created", Severity::Warning),
    ("Pulling", "Pulling image", Severity::Warning),
    ("Pulled", "Image pulled", Severity::Warning),
    ("ContainerCreating", "Creating container", Severity::Warning),
    ("Created", "Container created", Severity::Warning),
    ("PodInitializing", "Initializing session", Severity::Warning),
    ("Preparing", "Preparing workspace", Severity::Warning),
    ("Starting", "Starting session", Severity::Warning),
    ("Unhealthy", "Waiting for health check", Severity::Warning),
    ("Killing", "Stopping session", Severity::Warning),
    ("Terminating", "Terminating session", Severity::Warning),
    // Healthy.
    ("Started", "Session started", Severity::Success),
    ("Running", "Running", Severity::Success),
    ("Ready", "Session ready", Severity::Success),
    // Infrastructure failures.
    ("404", "Session not found", Severity::Error),
    ("Failed", "Session failed", Severity::Error),
    ("Error", "Session error", Severity::Error),
    ("FailedCreate", "Failed to create session", Severity::Error),
    ("FailedCreatePodSandBox", "Failed to create sandbox", Severity::Error),
    ("FailedScheduling", "Failed to schedule session", Severity::Error),
    ("FailedMount", "Failed to mount volume", Severity::Error),
    ("FailedAttachVolume", "Failed to attach volume", Severity::Error),
    ("FailedKillPod", "Failed to kill session", Severity::Error),
    ("ErrImagePull", "Failed to pull image", Severity::Error),
    ("ErrImageNeverPull", "Image pull not allowed", Severity::Error),
    ("ImagePullBackOff", "Image pull back-off", Severity::Error),
    ("InvalidImageName", "Invalid image name", Severity::Error),
    ("CrashLoopBackOff", "Crash loop back-off", Severity::Error),
    ("BackOff", "Back-off restarting container", Severity::Error),
    ("CreateContainerConfigError", "Invalid container configuration", Severity::Error),
    ("CreateContainerError", "Failed to create container", Severity::Error),
    ("RunContainerError", "Failed to run container", Severity::Error),
    ("ContainerCannotRun", "Container cannot run", Severity::Error),
    ("OOMKilled", "Out of memory", Severity::Error),
    ("Evicted", "Session evicted", Severity::Error),
    ("NodeLost", "Node lost", Severity::Error),
    ("DeadlineExceeded", "Session timed out", Severity::Error),
    ("ExceededGracePeriod", "Kill timeout exceeded", Severity::Error),
    // Pipeline phase markers.
    ("START_INITIAL", "Initializing session", Severity::Warning),
    ("FINISH_INITIAL", "Session initialized", Severity::Info),
    ("FAILURE_INITIAL", "Failed to initialize session", Severity::Error),
    ("START_LOAD_MODEL", "Loading model", Severity::Warning),
    ("FINISH_LOAD_MODEL", "Model loaded", Severity::Info),
    ("FAILURE_LOAD_MODEL", "Failed to load model", Severity::Error),
    ("START_PREPARE_WORKSPACE", "Preparing workspace", Severity::Warning),
    ("FINISH_PREPARE_WORKSPACE", "Workspace prepared", Severity::Info),
    ("FAILURE_PREPARE_WORKSPACE", "Failed to prepare workspace", Severity::Error),
    ("START_SESSION", "Starting session", Severity::Warning),
    ("FINISH_SESSION", "Session started", Severity::Success),
    ("FAILURE_SESSION", "Failed to start session", Severity::Error),
];

static CLASSIFICATIONS: Lazy<HashMap<&'static str, (&'static str, Severity)>> = Lazy::new(|| {
    return KNOWN_STATES
        .iter()
        .map(|(raw, display_text, severity)| {
            return (*raw, (*display_text, *severity));
        })
        .collect();
});

pub struct StateClassifier {}

impl StateClassifier {
    /// Maps any raw state to a display text and severity. States missing from
    /// the table are passed through as a warning.
    pub fn classify(raw: &str) -> StateClassification {
        if let Some((display_text, severity)) = CLASSIFICATIONS.get(raw) {
            return StateClassification::new(display_text, *severity);
        }

        return StateClassification::new(raw, Severity::Warning);
    }

    /// Same as `classify`, but phase markers for the steps of `steps` are
    /// rated by their place in that pipeline. Finishing the last step is the
    /// only phase marker rated as success.
    pub fn classify_in(raw: &str, steps: &PipelineSteps) -> StateClassification {
        let located = StepProgressEvaluator::parse_marker(raw).and_then(|(action, step)| {
            return steps.position(step).map(|position| return (action, position));
        });
        let (action, position) = match located {
            Some(located) => located,
            None => return StateClassifier::classify(raw),
        };

        let severity = match action {
            StepAction::Start => Severity::Warning,
            StepAction::Finish if position == steps.last_index() => Severity::Success,
            StepAction::Finish => Severity::Info,
            StepAction::Failure => Severity::Error,
        };

        if let Some((display_text, _)) = CLASSIFICATIONS.get(raw) {
            return StateClassification::new(display_text, severity);
        }

        return StateClassification::new(raw, severity);
    }

    pub fn is_classified(raw: &str) -> bool {
        return CLASSIFICATIONS.contains_key(raw);
    }

    pub fn known_states() -> Vec<(&'static str, StateClassification)> {
        return KNOWN_STATES
            .iter()
            .map(|(raw, display_text, severity)| {
                return (*raw, StateClassification::new(display_text, *severity));
            })
            .collect();
    }
}
