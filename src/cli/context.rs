use std::path::{Path, PathBuf};
use std::sync::Arc;

use overlay_engine::SettingsPort;

use super::output::OutputFormat;
use crate::config::AppConfig;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    output: OutputFormat,
    metrics_port: u16,
}

impl CliContext {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        output: OutputFormat,
        metrics_port: u16,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            metrics_port,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    /// Settings store for this run; `override_path` replaces the configured file.
    pub fn settings_port(&self, override_path: Option<&Path>) -> Arc<dyn SettingsPort> {
        self.config.settings_port(override_path)
    }
}
