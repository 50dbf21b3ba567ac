//! Owned background tasks and keyed one-shot timers.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle handle for a long-running loop.
pub struct LoopHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LoopHandle {
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Rescan after a forced reapply.
    Settle,
}

/// One-shot timers bound to a cancellation token. Re-arming a key replaces
/// the pending timer.
pub struct TimerSet {
    cancel: CancellationToken,
    slots: HashMap<TimerKey, JoinHandle<()>>,
}

impl TimerSet {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            slots: HashMap::new(),
        }
    }

    pub fn arm<F>(&mut self, key: TimerKey, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(key);
        let token = self.cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => fire.await,
            }
        });
        self.slots.insert(key, task);
    }

    pub fn cancel(&mut self, key: TimerKey) -> bool {
        match self.slots.remove(&key) {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel.cancel();
        for (_, task) in self.slots.drain() {
            task.abort();
        }
    }

    pub fn pending(&self) -> usize {
        self.slots.values().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
