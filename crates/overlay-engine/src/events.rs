use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::ScanTrigger;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Enabled,
    Disabled { restored: usize },
    IntensityChanged { intensity: f64 },
    ScanCompleted {
        trigger: ScanTrigger,
        newly_marked: usize,
        suppressed: usize,
    },
    RescanScheduled { delay_ms: u64 },
    PersistFailed { error: String },
}

pub type EngineEventBus = broadcast::Sender<EngineEvent>;

pub fn event_bus(capacity: usize) -> EngineEventBus {
    let (tx, _) = broadcast::channel(capacity.max(1));
    tx
}
