#[cfg(test)]
#[path = "step_progress_test.rs"]
mod tests;

use crate::domain::models::PipelineProgress;
use crate::domain::models::PipelineSteps;
use crate::domain::models::StepAction;
use crate::domain::models::StepMarker;
use crate::domain::models::StepProgress;
use crate::domain::models::StepStatus;

pub struct StepProgressEvaluator {}

impl StepProgressEvaluator {
    /// Splits a `{ACTION}_{STEP}` phase marker on its first delimiter.
    /// Returns `None` when the raw state has no delimiter or an action outside
    /// of START, FINISH and FAILURE.
    pub fn parse_marker(raw: &str) -> Option<(StepAction, &str)> {
        let (action, step) = raw.split_once('_')?;
        let action = StepAction::parse(action)?;

        return Some((action, step));
    }

    pub fn evaluate(raw: &str, steps: &PipelineSteps) -> PipelineProgress {
        return StepProgressEvaluator::evaluate_from(raw, steps, None);
    }

    /// Same as `evaluate`, but raw states without usable step information
    /// keep `anchor` (the last known marker) instead of falling back to the
    /// first step.
    pub fn evaluate_from(
        raw: &str,
        steps: &PipelineSteps,
        anchor: Option<StepMarker>,
    ) -> PipelineProgress {
        let located = StepProgressEvaluator::parse_marker(raw).and_then(|(action, step)| {
            return steps
                .position(step)
                .map(|position| return StepMarker { position, action });
        });

        let recognized = located.is_some();
        let mut marker = located.or(anchor).unwrap_or_default();
        marker.position = marker.position.min(steps.last_index());

        let progress = steps
            .names()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let status = if idx < marker.position {
                    StepStatus::Success
                } else if idx > marker.position {
                    StepStatus::Pending
                } else {
                    match marker.action {
                        StepAction::Start => StepStatus::Running,
                        StepAction::Finish => StepStatus::Success,
                        StepAction::Failure => StepStatus::Error,
                    }
                };

                return StepProgress {
                    name: name.to_string(),
                    status,
                };
            })
            .collect();

        return PipelineProgress {
            marker,
            recognized,
            steps: progress,
        };
    }
}
