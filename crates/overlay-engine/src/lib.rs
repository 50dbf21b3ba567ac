//! Adaptive overlay suppression for a live document.
//!
//! The engine finds overlay elements matching a [`profile::SiteProfile`],
//! marks them reversibly, and keeps a generated stylesheet in charge of their
//! opacity. Scans run on an adaptive backoff schedule and on relevant
//! document mutations; everything is undone on disable.

pub mod api;
pub mod commands;
mod controller;
pub mod eligibility;
pub mod errors;
pub mod events;
pub mod hover;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod ports;
pub mod profile;
pub mod scanner;
pub mod schedule;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod style;
pub mod timers;
pub mod watcher;

pub use api::{OverlayController, OverlayEngine, OverlayEngineBuilder};
pub use commands::{parse_command, Command, CommandResponse};
pub use errors::{EngineError, SettingsError};
pub use events::{event_bus, EngineEvent, EngineEventBus};
pub use model::{EngineConfig, EngineStatus, ScanReport, ScanTrigger, DEFAULT_INTENSITY};
pub use policy::{EnginePolicy, HoverMode, SchedulePolicy};
pub use ports::SettingsPort;
pub use profile::SiteProfile;
pub use settings::{FallbackSettings, JsonFileSettings, MemorySettings};
