#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::Weak;

use anyhow::bail;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Duration;

use super::classifier::StateClassifier;
use super::poller::PollControl;
use super::poller::PollSubscription;
use super::poller::SessionStatePoller;
use super::step_progress::StepProgressEvaluator;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Lifecycle;
use crate::domain::models::PipelineSteps;
use crate::domain::models::Session;
use crate::domain::models::Severity;
use crate::domain::models::Snapshot;
use crate::domain::models::StepMarker;
use crate::domain::models::TransportBox;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub steps: PipelineSteps,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> LifecycleOptions {
        return LifecycleOptions {
            steps: PipelineSteps::default(),
            poll_interval: Duration::from_millis(2000),
            request_timeout: Duration::from_millis(10000),
        };
    }
}

impl LifecycleOptions {
    pub fn from_config() -> Result<LifecycleOptions> {
        return Ok(LifecycleOptions {
            steps: Config::pipeline_steps()?,
            poll_interval: Config::duration(ConfigKey::PollInterval)?,
            request_timeout: Config::duration(ConfigKey::RequestTimeout)?,
        });
    }
}

#[derive(Default)]
struct ControllerState {
    lifecycle: Lifecycle,
    /// Bumped on every attach and detach. Handlers from older flows compare
    /// against it and bail out.
    generation: u64,
    subscription: Option<PollSubscription>,
    marker: Option<StepMarker>,
    last_raw: Option<String>,
}

/// Handler side of one attached flow.
#[derive(Clone)]
struct Tracker {
    generation: u64,
    session_id: String,
    steps: PipelineSteps,
    state: Weak<Mutex<ControllerState>>,
    snapshots: Arc<watch::Sender<Snapshot>>,
}

impl Tracker {
    fn observe(&self, raw: &str, sequence: u64, observed_at: DateTime<Utc>) -> PollControl {
        let state = match self.state.upgrade() {
            Some(state) => state,
            None => return PollControl::Stop,
        };
        let mut state = state.lock();
        if state.generation != self.generation || state.lifecycle != Lifecycle::Polling {
            return PollControl::Stop;
        }

        let classification = StateClassifier::classify_in(raw, &self.steps);
        let progress = StepProgressEvaluator::evaluate_from(raw, &self.steps, state.marker);

        if state.last_raw.as_deref() != Some(raw) {
            if !progress.recognized && !StateClassifier::is_classified(raw) {
                tracing::warn!(
                    session_id = %self.session_id,
                    raw_state = raw,
                    "Unclassified session state"
                );
            }
            if !progress.recognized {
                tracing::debug!(
                    session_id = %self.session_id,
                    raw_state = raw,
                    position = progress.marker.position,
                    "State carries no pipeline step, keeping position"
                );
            }
        }

        // Infrastructure failures such as ErrImagePull carry no step but end
        // the flow all the same.
        let lifecycle = if progress.has_error() || classification.severity == Severity::Error {
            Lifecycle::Failed
        } else if classification.severity == Severity::Success && progress.is_complete() {
            Lifecycle::Completed
        } else {
            Lifecycle::Polling
        };

        state.lifecycle = lifecycle;
        state.marker = Some(progress.marker);
        state.last_raw = Some(raw.to_string());

        self.snapshots.send_replace(Snapshot {
            lifecycle,
            session_id: Some(self.session_id.to_string()),
            raw_state: Some(raw.to_string()),
            classification: Some(classification),
            steps: progress.steps,
            sequence,
            observed_at: Some(observed_at),
            error: None,
        });

        if lifecycle.is_terminal() {
            tracing::info!(
                session_id = %self.session_id,
                raw_state = raw,
                lifecycle = %lifecycle,
                "Session settled"
            );
            return PollControl::Stop;
        }

        return PollControl::Continue;
    }

    fn disconnect(&self, err: anyhow::Error) {
        let state = match self.state.upgrade() {
            Some(state) => state,
            None => return,
        };
        let mut state = state.lock();
        if state.generation != self.generation || state.lifecycle != Lifecycle::Polling {
            return;
        }

        state.lifecycle = Lifecycle::Disconnected;
        self.snapshots.send_modify(|snapshot| {
            snapshot.lifecycle = Lifecycle::Disconnected;
            snapshot.error = Some(err.to_string());
        });
    }
}

/// Tracks one session at a time, from attach until the session settles or
/// the owner detaches.
pub struct LifecycleController {
    poller: SessionStatePoller,
    options: LifecycleOptions,
    state: Arc<Mutex<ControllerState>>,
    snapshots: Arc<watch::Sender<Snapshot>>,
}

impl LifecycleController {
    pub fn new(transport: TransportBox, options: LifecycleOptions) -> Result<LifecycleController> {
        if options.poll_interval.is_zero() {
            bail!("Poll interval must be greater than zero");
        }
        if options.request_timeout.is_zero() {
            bail!("Request timeout must be greater than zero");
        }

        let (snapshots, _) = watch::channel(Snapshot::not_started());

        return Ok(LifecycleController {
            poller: SessionStatePoller::new(transport, options.request_timeout),
            options,
            state: Arc::new(Mutex::new(ControllerState::default())),
            snapshots: Arc::new(snapshots),
        });
    }

    /// Starts tracking `session`, replacing any flow already in progress. A
    /// session that is already settled is published without polling.
    pub fn attach(&self, session: &Session) -> Result<()> {
        let (generation, previous) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.lifecycle = Lifecycle::Polling;
            state.marker = None;
            state.last_raw = None;
            (state.generation, state.subscription.take())
        };

        // Cancel before replace, outside of the state lock since handlers
        // take it while holding the subscription gate.
        if let Some(previous) = previous {
            tracing::debug!(
                session_id = previous.session_id(),
                "Replacing active subscription"
            );
            previous.stop();
        }

        tracing::info!(session_id = %session.id, "Tracking session");

        let tracker = Tracker {
            generation,
            session_id: session.id.to_string(),
            steps: self.options.steps.clone(),
            state: Arc::downgrade(&self.state),
            snapshots: Arc::clone(&self.snapshots),
        };

        if tracker.observe(&session.state, 0, Utc::now()) == PollControl::Stop {
            return Ok(());
        }

        let tick_tracker = tracker.clone();
        let subscription = self.poller.start(
            &session.id,
            self.options.poll_interval,
            move |tick| {
                return tick_tracker.observe(&tick.session.state, tick.sequence, tick.observed_at);
            },
            move |err| {
                tracker.disconnect(err);
            },
        );

        let subscription = match subscription {
            Ok(subscription) => subscription,
            Err(err) => {
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.lifecycle = Lifecycle::Idle;
                    self.snapshots
                        .send_modify(|snapshot| snapshot.lifecycle = Lifecycle::Idle);
                }
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            // Detached or re-attached while starting up.
            drop(state);
            subscription.stop();
            return Ok(());
        }
        state.subscription = Some(subscription);

        return Ok(());
    }

    /// Stops tracking. Safe to call in any state. Returns true if a running
    /// poll was cancelled. The last snapshot is kept, a flow that was still
    /// polling is marked idle.
    pub fn detach(&self) -> bool {
        let subscription = {
            let mut state = self.state.lock();
            state.generation += 1;
            if state.lifecycle == Lifecycle::Polling {
                state.lifecycle = Lifecycle::Idle;
                self.snapshots
                    .send_modify(|snapshot| snapshot.lifecycle = Lifecycle::Idle);
            }
            state.subscription.take()
        };

        if let Some(subscription) = subscription {
            let session_id = subscription.session_id().to_string();
            let stopped = subscription.stop();
            if stopped {
                tracing::info!(session_id, "Stopped tracking session");
            }
            return stopped;
        }

        return false;
    }

    pub fn lifecycle(&self) -> Lifecycle {
        return self.state.lock().lifecycle;
    }

    pub fn current_snapshot(&self) -> Snapshot {
        return self.snapshots.borrow().clone();
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        return self.snapshots.subscribe();
    }

    /// Resolves with the first snapshot that is no longer polling.
    pub async fn wait_for_terminal(&self) -> Snapshot {
        let mut rx = self.subscribe();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.lifecycle != Lifecycle::Polling {
                    return snapshot.clone();
                }
            }

            if rx.changed().await.is_err() {
                return self.current_snapshot();
            }
        }
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.detach();
    }
}
