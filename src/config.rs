//! Application configuration: engine policy plus where settings live.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use overlay_engine::{
    EnginePolicy, FallbackSettings, HoverMode, JsonFileSettings, MemorySettings, SettingsPort,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const APP_DIR: &str = "overlay-dimmer";
pub const SETTINGS_PATH_ENV: &str = "OVERLAY_DIMMER_SETTINGS";
pub const FALLBACK_SETTINGS_PATH_ENV: &str = "OVERLAY_DIMMER_FALLBACK_SETTINGS";
pub const HOVER_MODE_ENV: &str = "OVERLAY_DIMMER_HOVER_MODE";
pub const LOG_ENV: &str = "OVERLAY_DIMMER_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Deserialize(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub policy: EnginePolicy,
    /// Primary settings file; defaults under the user data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,
    /// Secondary settings file used when the primary cannot be read or written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_settings_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path(SETTINGS_PATH_ENV) {
            self.settings_path = Some(path);
        }
        if let Some(path) = env_path(FALLBACK_SETTINGS_PATH_ENV) {
            self.fallback_settings_path = Some(path);
        }
        if let Ok(raw) = env::var(HOVER_MODE_ENV) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "declarative" => self.policy.hover_mode = HoverMode::Declarative,
                "imperative" => self.policy.hover_mode = HoverMode::Imperative,
                other => warn!(value = other, "ignoring unknown {}", HOVER_MODE_ENV),
            }
        }
    }

    pub fn resolved_settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(default_settings_path)
    }

    /// File-backed store, falling back to the secondary file or to memory.
    pub fn settings_port(&self, override_path: Option<&Path>) -> Arc<dyn SettingsPort> {
        let primary_path = override_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.resolved_settings_path());
        let primary: Arc<dyn SettingsPort> = Arc::new(JsonFileSettings::new(primary_path));
        let fallback: Arc<dyn SettingsPort> = match &self.fallback_settings_path {
            Some(path) => Arc::new(JsonFileSettings::new(path.clone())),
            None => Arc::new(MemorySettings::new()),
        };
        Arc::new(FallbackSettings::new(primary, fallback))
    }
}

pub fn default_settings_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join(APP_DIR).join("settings.json"),
        None => PathBuf::from("overlay-dimmer-settings.json"),
    }
}

/// Accepts JSON first, then YAML.
pub fn parse_config_str(raw: &str) -> Result<AppConfig, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(config) => Ok(config),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_config_str(&raw)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
