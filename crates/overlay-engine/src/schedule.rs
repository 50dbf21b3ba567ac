//! Pure backoff state for the periodic scanner.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::policy::SchedulePolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Stopped,
    IdleWait,
    Scanning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub phase: SchedulerPhase,
    pub delay_ms: u64,
    pub empty_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct AdaptiveSchedule {
    policy: SchedulePolicy,
    current_delay: Duration,
    empty_rounds: u32,
    phase: SchedulerPhase,
}

impl AdaptiveSchedule {
    pub fn new(policy: SchedulePolicy) -> Self {
        let current_delay = policy.min_delay();
        Self {
            policy,
            current_delay,
            empty_rounds: 0,
            phase: SchedulerPhase::Stopped,
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn empty_rounds(&self) -> u32 {
        self.empty_rounds
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != SchedulerPhase::Stopped
    }

    /// Back to the minimum delay with a clean empty-round counter.
    pub fn reset(&mut self) {
        self.current_delay = self.policy.min_delay();
        self.empty_rounds = 0;
    }

    pub fn start(&mut self) {
        self.reset();
        self.phase = SchedulerPhase::IdleWait;
    }

    pub fn stop(&mut self) {
        self.reset();
        self.phase = SchedulerPhase::Stopped;
    }

    pub fn begin_scan(&mut self) {
        if self.is_running() {
            self.phase = SchedulerPhase::Scanning;
        }
    }

    /// Feeds one scan result back and returns the next delay.
    pub fn record_scan(&mut self, found: usize) -> Duration {
        if found > 0 {
            self.reset();
        } else {
            self.empty_rounds = self.empty_rounds.saturating_add(1);
            if self.empty_rounds > self.policy.empty_round_threshold {
                let grown = self.current_delay.as_secs_f64() * self.policy.growth();
                self.current_delay =
                    Duration::from_secs_f64(grown).min(self.policy.max_delay());
            }
        }
        if self.is_running() {
            self.phase = SchedulerPhase::IdleWait;
        }
        self.current_delay
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            phase: self.phase,
            delay_ms: self.current_delay.as_millis() as u64,
            empty_rounds: self.empty_rounds,
        }
    }
}
