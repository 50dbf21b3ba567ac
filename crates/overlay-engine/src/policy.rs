//! Tuning knobs for the engine. All values are defaults, not invariants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::profile::SiteProfile;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverMode {
    /// `:hover` override inside the generated stylesheet.
    #[default]
    Declarative,
    /// Inline opacity writes driven by delegated pointer listeners.
    Imperative,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulePolicy {
    #[serde(default = "SchedulePolicy::default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "SchedulePolicy::default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "SchedulePolicy::default_growth_factor")]
    pub growth_factor: f64,
    /// Empty rounds tolerated before the delay starts to grow.
    #[serde(default = "SchedulePolicy::default_empty_round_threshold")]
    pub empty_round_threshold: u32,
}

impl SchedulePolicy {
    fn default_min_delay_ms() -> u64 {
        1000
    }

    fn default_max_delay_ms() -> u64 {
        10_000
    }

    fn default_growth_factor() -> f64 {
        1.5
    }

    fn default_empty_round_threshold() -> u32 {
        2
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms.max(1))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms).max(1))
    }

    pub fn growth(&self) -> f64 {
        if self.growth_factor.is_finite() && self.growth_factor >= 1.0 {
            self.growth_factor
        } else {
            1.0
        }
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            min_delay_ms: Self::default_min_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
            growth_factor: Self::default_growth_factor(),
            empty_round_threshold: Self::default_empty_round_threshold(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    #[serde(default)]
    pub schedule: SchedulePolicy,
    #[serde(default = "EnginePolicy::default_mutation_coalesce_ms")]
    pub mutation_coalesce_ms: u64,
    #[serde(default = "EnginePolicy::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub hover_mode: HoverMode,
    #[serde(default)]
    pub profile: SiteProfile,
}

impl EnginePolicy {
    fn default_mutation_coalesce_ms() -> u64 {
        250
    }

    fn default_settle_delay_ms() -> u64 {
        100
    }

    pub fn mutation_coalesce(&self) -> Duration {
        Duration::from_millis(self.mutation_coalesce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            schedule: SchedulePolicy::default(),
            mutation_coalesce_ms: Self::default_mutation_coalesce_ms(),
            settle_delay_ms: Self::default_settle_delay_ms(),
            hover_mode: HoverMode::default(),
            profile: SiteProfile::default(),
        }
    }
}
