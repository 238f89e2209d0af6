#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::ticker::Ticker;
use crate::domain::models::Session;
use crate::domain::models::TransportBox;

/// Returned by tick handlers to keep polling or end the flow from inside the
/// handler itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

#[derive(Clone, Debug)]
pub struct PollTick {
    pub sequence: u64,
    pub observed_at: DateTime<Utc>,
    pub session: Session,
}

type TickHandler = Box<dyn Fn(PollTick) -> PollControl + Send + Sync>;
type ErrorHandler = Box<dyn FnOnce(anyhow::Error) + Send>;

struct Gate {
    active: bool,
    /// Sequence of the newest response handed to the tick handler.
    delivered: u64,
    on_error: Option<ErrorHandler>,
}

struct Shared {
    session_id: String,
    cancel: CancellationToken,
    gate: Mutex<Gate>,
    on_tick: TickHandler,
}

impl Shared {
    fn halt(&self, gate: &mut Gate) -> bool {
        if !gate.active {
            return false;
        }

        gate.active = false;
        gate.on_error = None;
        self.cancel.cancel();

        return true;
    }

    /// Handlers run while the gate is held, so `stop` cannot return while one
    /// of them is still executing.
    fn deliver(&self, sequence: u64, res: Result<Vec<Session>>) {
        let mut gate = self.gate.lock();
        if !gate.active {
            return;
        }

        if sequence <= gate.delivered {
            tracing::debug!(
                session_id = %self.session_id,
                sequence,
                delivered = gate.delivered,
                "Discarding stale poll response"
            );
            return;
        }
        gate.delivered = sequence;

        let sessions = match res {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    sequence,
                    error = ?err,
                    "Failed to fetch sessions, polling stopped"
                );
                let on_error = gate.on_error.take();
                self.halt(&mut gate);
                if let Some(on_error) = on_error {
                    on_error(err);
                }
                return;
            }
        };

        let session = match sessions
            .into_iter()
            .find(|session| return session.id == self.session_id)
        {
            Some(session) => session,
            None => {
                tracing::debug!(
                    session_id = %self.session_id,
                    sequence,
                    "Tracked session missing from collection"
                );
                return;
            }
        };

        let tick = PollTick {
            sequence,
            observed_at: Utc::now(),
            session,
        };

        if (self.on_tick)(tick) == PollControl::Stop {
            tracing::debug!(
                session_id = %self.session_id,
                sequence,
                "Tick handler requested stop"
            );
            self.halt(&mut gate);
        }
    }
}

/// Live handle for one polling flow. Stopping consumes it, dropping it stops
/// it as well.
pub struct PollSubscription {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl PollSubscription {
    pub fn session_id(&self) -> &str {
        return &self.shared.session_id;
    }

    pub fn is_active(&self) -> bool {
        return self.shared.gate.lock().active;
    }

    /// Stops polling. Once this returns no handler fires again and in-flight
    /// requests are cancelled. Returns false if the flow had already stopped.
    pub fn stop(self) -> bool {
        return self.halt();
    }

    fn halt(&self) -> bool {
        let stopped = {
            let mut gate = self.shared.gate.lock();
            self.shared.halt(&mut gate)
        };
        self.worker.abort();

        if stopped {
            tracing::debug!(session_id = %self.shared.session_id, "Polling stopped");
        }

        return stopped;
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.halt();
    }
}

pub struct SessionStatePoller {
    transport: TransportBox,
    request_timeout: Duration,
}

impl SessionStatePoller {
    pub fn new(transport: TransportBox, request_timeout: Duration) -> SessionStatePoller {
        return SessionStatePoller {
            transport,
            request_timeout,
        };
    }

    /// Starts polling for `session_id`. The first fetch is issued right away,
    /// the following ones every `interval` regardless of how long earlier
    /// fetches take. Handlers must not call `stop` on the returned
    /// subscription, `on_tick` returns `PollControl::Stop` instead.
    pub fn start<T, E>(
        &self,
        session_id: &str,
        interval: Duration,
        on_tick: T,
        on_error: E,
    ) -> Result<PollSubscription>
    where
        T: Fn(PollTick) -> PollControl + Send + Sync + 'static,
        E: FnOnce(anyhow::Error) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let ticker = Ticker::new(interval, cancel.clone())?;

        let shared = Arc::new(Shared {
            session_id: session_id.to_string(),
            cancel,
            gate: Mutex::new(Gate {
                active: true,
                delivered: 0,
                on_error: Some(Box::new(on_error)),
            }),
            on_tick: Box::new(on_tick),
        });

        tracing::debug!(
            session_id,
            interval_ms = interval.as_millis() as u64,
            transport = %self.transport.name(),
            "Polling started"
        );

        let worker = tokio::spawn(run(
            ticker,
            Arc::clone(&self.transport),
            Arc::clone(&shared),
            self.request_timeout,
        ));

        return Ok(PollSubscription { shared, worker });
    }
}

async fn run(
    mut ticker: Ticker,
    transport: TransportBox,
    shared: Arc<Shared>,
    request_timeout: Duration,
) {
    while let Some(sequence) = ticker.tick().await {
        let transport = Arc::clone(&transport);
        let shared = Arc::clone(&shared);

        // Fetches are not awaited here so a slow response never delays the
        // next tick.
        tokio::spawn(async move {
            let res = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => {
                    return;
                }
                res = time::timeout(request_timeout, transport.fetch_sessions()) => res,
            };

            let res = match res {
                Ok(res) => res,
                Err(_) => Err(anyhow!(
                    "Timed out after {}ms waiting for the session list",
                    request_timeout.as_millis()
                )),
            };

            shared.deliver(sequence, res);
        });
    }
}
