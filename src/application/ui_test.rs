use anyhow::Result;
use chrono::TimeZone;
use chrono::Utc;
use tokio::sync::watch;

use super::format_session;
use super::format_snapshot;
use super::start;
use super::OutputFormat;
use crate::domain::models::Lifecycle;
use crate::domain::models::PipelineSteps;
use crate::domain::models::Snapshot;
use crate::domain::services::StateClassifier;
use crate::domain::services::StepProgressEvaluator;
use crate::infrastructure::transports::scripted::session;

fn snapshot(raw: &str, lifecycle: Lifecycle) -> Snapshot {
    let steps = PipelineSteps::parse("INITIAL,LOAD_MODEL").unwrap();

    return Snapshot {
        lifecycle,
        session_id: Some("a1b2c3".to_string()),
        raw_state: Some(raw.to_string()),
        classification: Some(StateClassifier::classify(raw)),
        steps: StepProgressEvaluator::evaluate(raw, &steps).steps,
        sequence: 4,
        observed_at: Some(Utc.with_ymd_and_hms(2023, 10, 21, 14, 5, 40).unwrap()),
        error: None,
    };
}

#[test]
fn it_formats_the_not_started_sentinel() -> Result<()> {
    let res = format_snapshot(&Snapshot::not_started(), OutputFormat::Text, false)?;
    insta::assert_snapshot!(res, @"No session attached");

    return Ok(());
}

#[test]
fn it_formats_snapshots_as_text() -> Result<()> {
    let res = format_snapshot(
        &snapshot("START_LOAD_MODEL", Lifecycle::Polling),
        OutputFormat::Text,
        false,
    )?;

    insta::assert_snapshot!(res, @r###"
    a1b2c3 [polling] Loading model (START_LOAD_MODEL)
      [x] INITIAL
      [~] LOAD_MODEL
    "###);

    return Ok(());
}

#[test]
fn it_formats_disconnects_with_the_error() -> Result<()> {
    let mut snapshot = snapshot("START_INITIAL", Lifecycle::Disconnected);
    snapshot.error = Some("connection refused".to_string());
    let res = format_snapshot(&snapshot, OutputFormat::Text, false)?;

    insta::assert_snapshot!(res, @r###"
    a1b2c3 [disconnected] Initializing session (START_INITIAL)
      [~] INITIAL
      [ ] LOAD_MODEL
      error: connection refused
    "###);

    return Ok(());
}

#[test]
fn it_formats_snapshots_as_json() -> Result<()> {
    let res = format_snapshot(
        &snapshot("FAILURE_LOAD_MODEL", Lifecycle::Failed),
        OutputFormat::Json,
        false,
    )?;

    insta::assert_snapshot!(res, @r###"{"lifecycle":"failed","session_id":"a1b2c3","raw_state":"FAILURE_LOAD_MODEL","classification":{"display_text":"Failed to load model","severity":"error"},"steps":[{"name":"INITIAL","status":"success"},{"name":"LOAD_MODEL","status":"error"}],"sequence":4,"observed_at":"2023-10-21T14:05:40Z","error":null}"###);

    return Ok(());
}

#[test]
fn it_colors_by_severity() -> Result<()> {
    owo_colors::set_override(true);
    let res = format_snapshot(
        &snapshot("FAILURE_LOAD_MODEL", Lifecycle::Failed),
        OutputFormat::Text,
        true,
    )?;

    owo_colors::unset_override();
    assert!(res.contains("\u{1b}[31mFailed to load model\u{1b}[39m"));

    return Ok(());
}

#[test]
fn it_formats_sessions() -> Result<()> {
    let res = format_session(&session("a1b2c3", "ErrImagePull"), OutputFormat::Text, false)?;
    insta::assert_snapshot!(res, @"- (ID: a1b2c3) persistent, Owner: alice, Failed to pull image (ErrImagePull)");

    let res = format_session(&session("a1b2c3", "Running"), OutputFormat::Json, false)?;
    insta::assert_snapshot!(res, @r###"{"id":"a1b2c3","state":"Running","type":"persistent","created_at":"2023-10-21T14:03:11Z","last_seen":null,"owner":"alice","classification":{"display_text":"Running","severity":"success"}}"###);

    return Ok(());
}

#[tokio::test]
async fn it_stops_printing_once_the_session_settles() -> Result<()> {
    let (tx, rx) = watch::channel(Snapshot::not_started());
    let printer = tokio::spawn(start(rx, OutputFormat::Text, false));

    tx.send_replace(snapshot("START_LOAD_MODEL", Lifecycle::Polling));
    tokio::task::yield_now().await;
    tx.send_replace(snapshot("FAILURE_LOAD_MODEL", Lifecycle::Failed));

    let last = printer.await??;
    assert_eq!(last.lifecycle, Lifecycle::Failed);
    assert_eq!(last.raw_state.as_deref(), Some("FAILURE_LOAD_MODEL"));

    return Ok(());
}
