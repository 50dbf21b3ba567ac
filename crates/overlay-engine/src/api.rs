use std::sync::Arc;

use async_trait::async_trait;
use document_tree::Document;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::commands::{Command, CommandResponse};
use crate::controller::EngineCore;
use crate::errors::EngineError;
use crate::events::{event_bus, EngineEvent, EngineEventBus};
use crate::metrics;
use crate::model::{EngineConfig, EngineStatus, ScanReport};
use crate::policy::EnginePolicy;
use crate::ports::SettingsPort;
use crate::settings::MemorySettings;

/// Command surface of a running engine.
#[async_trait]
pub trait OverlayController: Send + Sync {
    async fn enable(&self) -> Result<(), EngineError>;
    async fn disable(&self) -> Result<(), EngineError>;
    async fn set_intensity(&self, value: f64) -> Result<f64, EngineError>;
    async fn force_rescan(&self) -> Result<bool, EngineError>;
    fn status(&self) -> EngineStatus;

    async fn handle(&self, command: Command) -> CommandResponse {
        match command {
            Command::ToggleEnabled { enabled } => {
                let result = if enabled {
                    self.enable().await
                } else {
                    self.disable().await
                };
                match result {
                    Ok(()) => CommandResponse::toggled(enabled),
                    Err(err) => CommandResponse::failure(&err),
                }
            }
            Command::SetOpacity { opacity } => match self.set_intensity(opacity).await {
                Ok(applied) => CommandResponse::intensity(applied),
                Err(err) => CommandResponse::failure(&err),
            },
            Command::GetStatus => {
                let status = self.status();
                CommandResponse::status(status.enabled, status.opacity)
            }
            Command::Reapply => match self.force_rescan().await {
                Ok(_) => CommandResponse::ok(),
                Err(err) => CommandResponse::failure(&err),
            },
        }
    }
}

pub struct OverlayEngineBuilder {
    document: Document,
    policy: EnginePolicy,
    settings: Option<Arc<dyn SettingsPort>>,
    events: Option<EngineEventBus>,
}

impl OverlayEngineBuilder {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            policy: EnginePolicy::default(),
            settings: None,
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settings(mut self, port: Arc<dyn SettingsPort>) -> Self {
        self.settings = Some(port);
        self
    }

    pub fn with_events(mut self, bus: EngineEventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// The engine stays off until `start` or `enable`.
    pub fn build(self) -> OverlayEngine {
        let events = self.events.unwrap_or_else(|| event_bus(64));
        let idle = EngineConfig {
            enabled: false,
            ..EngineConfig::default()
        };
        OverlayEngine {
            core: EngineCore::new(self.document, self.policy, idle, events.clone()),
            settings: self
                .settings
                .unwrap_or_else(|| Arc::new(MemorySettings::new())),
            events,
        }
    }
}

/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct OverlayEngine {
    core: Arc<EngineCore>,
    settings: Arc<dyn SettingsPort>,
    events: EngineEventBus,
}

impl OverlayEngine {
    pub fn builder(document: Document) -> OverlayEngineBuilder {
        OverlayEngineBuilder::new(document)
    }

    pub fn document(&self) -> &Document {
        self.core.document()
    }

    pub fn policy(&self) -> &EnginePolicy {
        self.core.policy()
    }

    pub fn config(&self) -> EngineConfig {
        self.core.config()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Loads persisted settings (defaults when absent or unreadable) and
    /// enables when they say so. Nothing is written back.
    #[instrument(skip_all, fields(settings = %self.settings.describe()))]
    pub async fn start(&self) -> Result<EngineStatus, EngineError> {
        let config = match self.settings.load().await {
            Ok(Some(config)) => config.sanitized(),
            Ok(None) => EngineConfig::default(),
            Err(err) => {
                warn!(target: "overlay-engine", %err, "settings unreadable; using defaults");
                EngineConfig::default()
            }
        };
        self.core.seed_config(config);
        if config.enabled {
            self.core.enable()?;
        } else {
            self.core.disable();
        }
        info!(target: "overlay-engine", enabled = config.enabled, opacity = config.intensity, "engine started");
        Ok(self.core.status())
    }

    /// Page teardown: turn everything off without touching stored settings.
    #[instrument(skip_all)]
    pub async fn shutdown(&self) {
        let restored = self.core.disable();
        info!(target: "overlay-engine", restored, "engine shut down");
    }

    pub fn scan_now(&self) -> ScanReport {
        self.core.scan_now()
    }

    pub fn pending_timers(&self) -> usize {
        self.core.pending_timers()
    }

    async fn persist(&self) {
        let config = self.core.config();
        if let Err(err) = self.settings.save(&config).await {
            warn!(target: "overlay-engine", %err, "failed to persist settings");
            metrics::record_persist_failure();
            let _ = self.events.send(EngineEvent::PersistFailed {
                error: err.to_string(),
            });
        }
    }
}

#[async_trait]
impl OverlayController for OverlayEngine {
    #[instrument(skip_all)]
    async fn enable(&self) -> Result<(), EngineError> {
        self.core.enable()?;
        self.persist().await;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn disable(&self) -> Result<(), EngineError> {
        self.core.disable();
        self.persist().await;
        Ok(())
    }

    #[instrument(skip_all, fields(value = %value))]
    async fn set_intensity(&self, value: f64) -> Result<f64, EngineError> {
        let applied = self.core.set_intensity(value)?;
        self.persist().await;
        Ok(applied)
    }

    #[instrument(skip_all)]
    async fn force_rescan(&self) -> Result<bool, EngineError> {
        Ok(self.core.force_rescan())
    }

    fn status(&self) -> EngineStatus {
        self.core.status()
    }
}
