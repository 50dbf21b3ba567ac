//! Periodic scan loop driven by [`crate::schedule::AdaptiveSchedule`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::timers::LoopHandle;

/// The side the scheduler loop calls back into.
pub trait ScanDriver: Send + Sync + 'static {
    /// Delay before the next scheduled scan, `None` once the session ended.
    fn next_delay(&self, session: &CancellationToken) -> Option<Duration>;
    /// Runs one scheduled scan; `false` once the session ended.
    fn scheduled_scan(&self, session: &CancellationToken) -> bool;
}

/// Spawns the loop. `wake` restarts the current wait with a fresh delay.
pub fn spawn_scheduler<D: ScanDriver>(
    driver: Weak<D>,
    session: CancellationToken,
    wake: Arc<Notify>,
) -> LoopHandle {
    let cancel = session.child_token();
    let loop_token = cancel.clone();
    let task = tokio::spawn(async move {
        loop {
            let Some(delay) = driver
                .upgrade()
                .and_then(|d| d.next_delay(&session))
            else {
                break;
            };
            trace!(target: "overlay-engine", delay_ms = delay.as_millis() as u64, "scheduler waiting");
            tokio::select! {
                _ = loop_token.cancelled() => break,
                _ = wake.notified() => continue,
                _ = tokio::time::sleep(delay) => {
                    let Some(driver) = driver.upgrade() else { break };
                    if !driver.scheduled_scan(&session) {
                        break;
                    }
                }
            }
        }
        trace!(target: "overlay-engine", "scheduler loop exited");
    });
    LoopHandle::new(cancel, task)
}
