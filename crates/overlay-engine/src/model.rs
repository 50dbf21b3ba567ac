use document_tree::NodeId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::schedule::ScheduleSnapshot;

pub const DEFAULT_INTENSITY: f64 = 0.3;

/// User-visible settings; the only state that is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enabled: bool,
    #[serde(rename = "opacity")]
    pub intensity: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: DEFAULT_INTENSITY,
        }
    }
}

impl EngineConfig {
    /// Same config with the intensity clamped; non-finite values fall back
    /// to the default.
    pub fn sanitized(self) -> Self {
        Self {
            enabled: self.enabled,
            intensity: clamp_intensity(self.intensity).unwrap_or(DEFAULT_INTENSITY),
        }
    }
}

pub type SharedConfig = Arc<RwLock<EngineConfig>>;

/// Clamps into `[0, 1]`; `None` for NaN or infinities.
pub fn clamp_intensity(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// Shortest CSS form, e.g. `0.3` or `1`.
pub fn format_opacity(value: f64) -> String {
    format!("{}", value)
}

/// What an element looked like before it was marked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualBaseline {
    pub inline_opacity: Option<String>,
    pub computed_opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SuppressionRecord {
    pub baseline: VisualBaseline,
    pub suppressed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTrigger {
    Enable,
    Schedule,
    Mutation,
    Rescan,
    Manual,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::Enable => "enable",
            ScanTrigger::Schedule => "schedule",
            ScanTrigger::Mutation => "mutation",
            ScanTrigger::Rescan => "rescan",
            ScanTrigger::Manual => "manual",
        }
    }
}

/// Outcome of one scanner pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub trigger: Option<ScanTrigger>,
    pub candidates: usize,
    pub newly_marked: Vec<NodeId>,
    pub already_marked: usize,
    pub rejected: usize,
    pub pruned: usize,
    pub skipped_patterns: usize,
}

impl ScanReport {
    pub fn new(trigger: ScanTrigger) -> Self {
        Self {
            trigger: Some(trigger),
            ..Self::default()
        }
    }

    pub fn found(&self) -> usize {
        self.newly_marked.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub enabled: bool,
    pub opacity: f64,
    pub suppressed: usize,
    pub rule_installed: bool,
    pub hover_listener: bool,
    pub schedule: ScheduleSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<ScanReport>,
}
