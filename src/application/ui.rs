#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use owo_colors::OwoColorize;
use owo_colors::Stream;
use serde::Serialize;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::sync::watch;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Lifecycle;
use crate::domain::models::Session;
use crate::domain::models::Severity;
use crate::domain::models::Snapshot;
use crate::domain::models::StateClassification;
use crate::domain::models::StepProgress;
use crate::domain::models::StepStatus;
use crate::domain::services::StateClassifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Text,
    /// One JSON document per line.
    Json,
}

impl OutputFormat {
    pub fn parse(text: &str) -> Option<OutputFormat> {
        return OutputFormat::iter().find(|e| return e.to_string() == text);
    }

    pub fn from_config() -> Result<OutputFormat> {
        let name = Config::get(ConfigKey::Output);
        if let Some(format) = OutputFormat::parse(&name) {
            return Ok(format);
        }

        bail!(format!("No output format named {name}"));
    }
}

#[derive(Serialize)]
struct SessionLine<'a> {
    #[serde(flatten)]
    session: &'a Session,
    classification: StateClassification,
}

/// `colored` paints only when stdout supports it; tests pass false to get
/// plain text regardless of the terminal.
fn paint(text: &str, severity: Severity, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }

    return match severity {
        Severity::Info => text
            .if_supports_color(Stream::Stdout, |text| return text.cyan())
            .to_string(),
        Severity::Success => text
            .if_supports_color(Stream::Stdout, |text| return text.green())
            .to_string(),
        Severity::Warning => text
            .if_supports_color(Stream::Stdout, |text| return text.yellow())
            .to_string(),
        Severity::Error => text
            .if_supports_color(Stream::Stdout, |text| return text.red())
            .to_string(),
    };
}

fn step_line(step: &StepProgress, colored: bool) -> String {
    let (mark, severity) = match step.status {
        StepStatus::Pending => ("[ ]", Severity::Info),
        StepStatus::Running => ("[~]", Severity::Warning),
        StepStatus::Success => ("[x]", Severity::Success),
        StepStatus::Error => ("[!]", Severity::Error),
    };

    if step.status == StepStatus::Pending {
        return format!("  {mark} {}", step.name);
    }

    return format!("  {} {}", paint(mark, severity, colored), step.name);
}

pub fn format_steps(steps: &[StepProgress], colored: bool) -> String {
    return steps
        .iter()
        .map(|step| return step_line(step, colored))
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_snapshot(snapshot: &Snapshot, format: OutputFormat, colored: bool) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(snapshot)?);
    }

    let session_id = match &snapshot.session_id {
        Some(session_id) => session_id,
        None => return Ok("No session attached".to_string()),
    };

    let mut lines = vec![];
    let mut header = format!("{session_id} [{}]", snapshot.lifecycle);
    if let Some(classification) = &snapshot.classification {
        header = format!(
            "{header} {}",
            paint(
                &classification.display_text,
                classification.severity,
                colored
            )
        );
    }
    if let Some(raw_state) = &snapshot.raw_state {
        header = format!("{header} ({raw_state})");
    }
    lines.push(header);

    if !snapshot.steps.is_empty() {
        lines.push(format_steps(&snapshot.steps, colored));
    }

    if let Some(error) = &snapshot.error {
        lines.push(format!("  {}", paint(&format!("error: {error}"), Severity::Error, colored)));
    }

    return Ok(lines.join("\n"));
}

pub fn format_session(session: &Session, format: OutputFormat, colored: bool) -> Result<String> {
    let classification = StateClassifier::classify(&session.state);
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(&SessionLine {
            session,
            classification,
        })?);
    }

    let mut res = format!("- (ID: {}) {}", session.id, session.kind);
    if !session.owner.is_empty() {
        res = format!("{res}, Owner: {}", session.owner);
    }

    return Ok(format!(
        "{res}, {} ({})",
        paint(
            &classification.display_text,
            classification.severity,
            colored
        ),
        session.state
    ));
}

/// Updates that only bump the sequence are not printed again.
fn same_view(previous: Option<&Snapshot>, next: &Snapshot) -> bool {
    if let Some(previous) = previous {
        return previous.lifecycle == next.lifecycle
            && previous.session_id == next.session_id
            && previous.raw_state == next.raw_state
            && previous.steps == next.steps
            && previous.error == next.error;
    }

    return false;
}

/// Prints snapshots as they are published until the tracked session stops
/// polling. Returns the last snapshot seen.
pub async fn start(
    mut rx: watch::Receiver<Snapshot>,
    format: OutputFormat,
    colored: bool,
) -> Result<Snapshot> {
    let mut printed: Option<Snapshot> = None;

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.is_started() {
            if !same_view(printed.as_ref(), &snapshot) {
                println!("{}", format_snapshot(&snapshot, format, colored)?);
                printed = Some(snapshot.clone());
            }

            if snapshot.lifecycle != Lifecycle::Polling {
                return Ok(snapshot);
            }
        }

        if rx.changed().await.is_err() {
            return Ok(snapshot);
        }
    }
}
