use async_trait::async_trait;

use crate::errors::SettingsError;
use crate::model::EngineConfig;

/// Durable home for [`EngineConfig`].
#[async_trait]
pub trait SettingsPort: Send + Sync {
    /// `Ok(None)` when nothing was stored yet.
    async fn load(&self) -> Result<Option<EngineConfig>, SettingsError>;
    async fn save(&self, config: &EngineConfig) -> Result<(), SettingsError>;
    fn describe(&self) -> String;
}
