//! Settings backends: in-memory, JSON file, and primary-with-fallback.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::SettingsError;
use crate::model::EngineConfig;
use crate::ports::SettingsPort;

#[derive(Default)]
pub struct MemorySettings {
    value: Mutex<Option<EngineConfig>>,
    unavailable: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(config: EngineConfig) -> Self {
        Self {
            value: Mutex::new(Some(config)),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every later call fail, e.g. to exercise fallbacks.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<EngineConfig> {
        *self.value.lock()
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SettingsError::Unavailable("memory store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SettingsPort for MemorySettings {
    async fn load(&self) -> Result<Option<EngineConfig>, SettingsError> {
        self.check()?;
        Ok(self.current())
    }

    async fn save(&self, config: &EngineConfig) -> Result<(), SettingsError> {
        self.check()?;
        *self.value.lock() = Some(*config);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

/// One JSON document on disk, replaced atomically on save.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsPort for JsonFileSettings {
    async fn load(&self) -> Result<Option<EngineConfig>, SettingsError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, config: &EngineConfig) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.path, &payload).await?;
        debug!(target: "overlay-engine", path = %self.path.display(), "settings saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.flush().await?;
    fs::rename(tmp, path).await
}

/// Uses `primary` while it works and `fallback` whenever it fails.
pub struct FallbackSettings {
    primary: Arc<dyn SettingsPort>,
    fallback: Arc<dyn SettingsPort>,
}

impl FallbackSettings {
    pub fn new(primary: Arc<dyn SettingsPort>, fallback: Arc<dyn SettingsPort>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl SettingsPort for FallbackSettings {
    async fn load(&self) -> Result<Option<EngineConfig>, SettingsError> {
        match self.primary.load().await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(target: "overlay-engine", primary = %self.primary.describe(), %err, "settings load falling back");
                self.fallback.load().await
            }
        }
    }

    async fn save(&self, config: &EngineConfig) -> Result<(), SettingsError> {
        match self.primary.save(config).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(target: "overlay-engine", primary = %self.primary.describe(), %err, "settings save falling back");
                self.fallback.save(config).await
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} (fallback {})", self.primary.describe(), self.fallback.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_settings_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("nested").join("settings.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let config = EngineConfig {
            enabled: false,
            intensity: 0.6,
        };
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(config));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"opacity\": 0.6"));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileSettings::new(&path);
        assert!(matches!(store.load().await, Err(SettingsError::Serde(_))));
    }

    #[tokio::test]
    async fn fallback_takes_over_when_primary_fails() {
        let primary = Arc::new(MemorySettings::new());
        let fallback = Arc::new(MemorySettings::with_value(EngineConfig {
            enabled: false,
            intensity: 0.5,
        }));
        primary.set_unavailable(true);
        let store = FallbackSettings::new(primary.clone(), fallback.clone());

        let loaded = store.load().await.unwrap().unwrap();
        assert!(!loaded.enabled);

        store.save(&EngineConfig::default()).await.unwrap();
        assert_eq!(fallback.current(), Some(EngineConfig::default()));
        assert_eq!(primary.current(), None);

        primary.set_unavailable(false);
        store.save(&loaded).await.unwrap();
        assert_eq!(primary.current(), Some(loaded));
    }
}
