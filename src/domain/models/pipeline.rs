#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;
use strum::IntoEnumIterator;

pub const DEFAULT_PIPELINE_STEPS: [&str; 4] =
    ["INITIAL", "LOAD_MODEL", "PREPARE_WORKSPACE", "SESSION"];

/// Action half of a `{ACTION}_{STEP}` phase marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, EnumIter, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum StepAction {
    Start,
    Finish,
    Failure,
}

impl StepAction {
    pub fn parse(text: &str) -> Option<StepAction> {
        return StepAction::iter().find(|e| return e.to_string() == text);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumIter, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// Canonical, ordered list of pipeline stages a session goes through while
/// it is provisioned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSteps {
    names: Vec<String>,
}

impl Default for PipelineSteps {
    fn default() -> PipelineSteps {
        return PipelineSteps {
            names: DEFAULT_PIPELINE_STEPS
                .iter()
                .map(|name| return name.to_string())
                .collect(),
        };
    }
}

impl PipelineSteps {
    pub fn new(names: Vec<String>) -> Result<PipelineSteps> {
        if names.is_empty() {
            bail!("A pipeline needs at least one step");
        }

        for (idx, name) in names.iter().enumerate() {
            if name.is_empty() {
                bail!("Pipeline step {} has an empty name", idx + 1);
            }
            if names[..idx].contains(name) {
                bail!(format!("Pipeline step {name} is listed more than once"));
            }
        }

        return Ok(PipelineSteps { names });
    }

    /// Parses a comma separated list such as `INITIAL,LOAD_MODEL,SESSION`.
    pub fn parse(text: &str) -> Result<PipelineSteps> {
        let names = text
            .split(',')
            .map(|name| return name.trim().to_string())
            .filter(|name| return !name.is_empty())
            .collect::<Vec<String>>();

        return PipelineSteps::new(names);
    }

    pub fn names(&self) -> &[String] {
        return &self.names;
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        return self.names.iter().position(|e| return e == name);
    }

    pub fn last_index(&self) -> usize {
        return self.names.len() - 1;
    }
}

/// Where a raw state places the session in the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StepMarker {
    pub position: usize,
    pub action: StepAction,
}

impl Default for StepMarker {
    fn default() -> StepMarker {
        return StepMarker {
            position: 0,
            action: StepAction::Start,
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub name: String,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineProgress {
    pub marker: StepMarker,
    /// False when the raw state carried no usable step information and the
    /// marker was carried over.
    pub recognized: bool,
    pub steps: Vec<StepProgress>,
}

impl PipelineProgress {
    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        return self
            .steps
            .iter()
            .find(|step| return step.name == name)
            .map(|step| return step.status);
    }

    pub fn has_error(&self) -> bool {
        return self
            .steps
            .iter()
            .any(|step| return step.status == StepStatus::Error);
    }

    pub fn is_complete(&self) -> bool {
        if let Some(last) = self.steps.last() {
            return last.status == StepStatus::Success;
        }

        return false;
    }
}
