use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio::time::Instant;

use super::PollControl;
use super::PollSubscription;
use super::PollTick;
use super::SessionStatePoller;
use crate::infrastructure::transports::scripted::session;
use crate::infrastructure::transports::scripted::ScriptedTransport;

const INTERVAL: Duration = Duration::from_millis(2000);
const TIMEOUT: Duration = Duration::from_millis(10000);

struct Harness {
    subscription: PollSubscription,
    ticks: mpsc::UnboundedReceiver<PollTick>,
    errors: mpsc::UnboundedReceiver<String>,
}

fn start(transport: &Arc<ScriptedTransport>, id: &str, control: PollControl) -> Harness {
    let (tick_tx, ticks) = mpsc::unbounded_channel::<PollTick>();
    let (error_tx, errors) = mpsc::unbounded_channel::<String>();

    let poller = SessionStatePoller::new(transport.boxed(), TIMEOUT);
    let subscription = poller
        .start(
            id,
            INTERVAL,
            move |tick| {
                let _ = tick_tx.send(tick);
                return control;
            },
            move |err| {
                let _ = error_tx.send(err.to_string());
            },
        )
        .unwrap();

    return Harness {
        subscription,
        ticks,
        errors,
    };
}

#[tokio::test(start_paused = true)]
async fn it_ticks_immediately() -> Result<()> {
    let transport = ScriptedTransport::with_states("abc", &["START_LOAD_MODEL"]);
    let started = Instant::now();
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let tick = harness.ticks.recv().await.unwrap();
    assert_eq!(tick.sequence, 1);
    assert_eq!(tick.session.id, "abc");
    assert_eq!(tick.session.state, "START_LOAD_MODEL");
    assert_eq!(started.elapsed(), Duration::ZERO);

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_ticks_at_the_interval() -> Result<()> {
    let transport =
        ScriptedTransport::with_states("abc", &["START_INITIAL", "START_LOAD_MODEL", "START_SESSION"]);
    let started = Instant::now();
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let mut states = vec![];
    for _ in 0..3 {
        states.push(harness.ticks.recv().await.unwrap().session.state);
    }

    assert_eq!(states, vec!["START_INITIAL", "START_LOAD_MODEL", "START_SESSION"]);
    assert_eq!(started.elapsed(), INTERVAL * 2);
    assert_eq!(transport.calls(), 3);

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_skips_ticks_without_the_tracked_session() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .reply(vec![session("other", "Running")])
        .reply(vec![])
        .reply(vec![session("other", "Running"), session("abc", "Pulling")]);
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let tick = harness.ticks.recv().await.unwrap();
    assert_eq!(tick.sequence, 3);
    assert_eq!(tick.session.state, "Pulling");
    assert!(harness.errors.try_recv().is_err());
    assert!(harness.subscription.is_active());

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_reports_transport_failures_once_and_stops() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport.fail("connection refused");
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let err = harness.errors.recv().await.unwrap();
    assert_eq!(err, "connection refused");
    assert!(!harness.subscription.is_active());

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(transport.calls(), 1);
    assert!(harness.errors.try_recv().is_err());
    assert!(harness.ticks.try_recv().is_err());

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_times_out_hung_requests() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport.reply_after(Duration::from_secs(3600), vec![session("abc", "Running")]);
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let err = harness.errors.recv().await.unwrap();
    insta::assert_snapshot!(err, @"Timed out after 10000ms waiting for the session list");
    assert!(harness.ticks.try_recv().is_err());
    assert!(!harness.subscription.is_active());

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_discards_responses_older_than_the_latest_delivered() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .reply_after(Duration::from_millis(3000), vec![session("abc", "START_LOAD_MODEL")])
        .reply(vec![session("abc", "START_PREPARE_WORKSPACE")]);
    let mut harness = start(&transport, "abc", PollControl::Continue);

    let second = harness.ticks.recv().await.unwrap();
    assert_eq!(second.sequence, 2);
    assert_eq!(second.session.state, "START_PREPARE_WORKSPACE");

    // The first response lands at 3s, after the second, and must be dropped.
    let third = harness.ticks.recv().await.unwrap();
    assert_eq!(third.sequence, 3);
    assert_eq!(third.session.state, "START_PREPARE_WORKSPACE");
    assert_eq!(transport.calls(), 3);

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_stops_when_the_handler_asks_to() -> Result<()> {
    let transport = ScriptedTransport::with_states("abc", &["FINISH_SESSION"]);
    let mut harness = start(&transport, "abc", PollControl::Stop);

    harness.ticks.recv().await.unwrap();
    assert!(!harness.subscription.is_active());

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(transport.calls(), 1);
    assert!(harness.ticks.try_recv().is_err());

    // Already stopped by the handler.
    assert!(!harness.subscription.stop());

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_never_fires_after_stop() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport.reply_after(Duration::from_millis(500), vec![session("abc", "Running")]);
    let mut harness = start(&transport, "abc", PollControl::Continue);

    // Let the first fetch go in flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.calls(), 1);

    assert!(harness.subscription.stop());

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(transport.calls(), 1);
    assert!(harness.ticks.try_recv().is_err());
    assert!(harness.errors.try_recv().is_err());

    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_stops_when_the_subscription_is_dropped() -> Result<()> {
    let transport = ScriptedTransport::with_states("abc", &["Running"]);
    let mut harness = start(&transport, "abc", PollControl::Continue);
    harness.ticks.recv().await.unwrap();

    drop(harness.subscription);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(transport.calls(), 1);
    assert!(harness.ticks.try_recv().is_err());

    return Ok(());
}

#[tokio::test]
async fn it_rejects_a_zero_interval() {
    let transport = ScriptedTransport::new();
    let poller = SessionStatePoller::new(transport.boxed(), TIMEOUT);
    let res = poller.start(
        "abc",
        Duration::ZERO,
        |_| {
            return PollControl::Continue;
        },
        |_| {},
    );

    assert!(res.is_err());
}
