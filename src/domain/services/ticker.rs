#[cfg(test)]
#[path = "ticker_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use tokio::time;
use tokio::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Cancellable periodic ticker. The first tick completes immediately, the
/// following ones every `period`. Each tick carries a monotonically
/// increasing sequence number starting at 1.
pub struct Ticker {
    interval: time::Interval,
    cancel: CancellationToken,
    sequence: u64,
}

impl Ticker {
    pub fn new(period: Duration, cancel: CancellationToken) -> Result<Ticker> {
        if period.is_zero() {
            bail!("Ticker period must be greater than zero");
        }

        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        return Ok(Ticker {
            interval,
            cancel,
            sequence: 0,
        });
    }

    /// Waits for the next tick. Returns `None` once the ticker is cancelled,
    /// and keeps returning `None` afterwards.
    pub async fn tick(&mut self) -> Option<u64> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return None;
            }
            _ = self.interval.tick() => {
                self.sequence += 1;
                return Some(self.sequence);
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        return self.cancel.is_cancelled();
    }

    pub fn sequence(&self) -> u64 {
        return self.sequence;
    }
}
