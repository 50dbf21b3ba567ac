use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use overlay_engine::model::clamp_intensity;
use overlay_engine::{EngineConfig, JsonFileSettings, SettingsPort};
use serde::Serialize;
use tracing::info;

use super::context::CliContext;

pub const OPACITY_LABEL: &str = "More/Less Transparent";

#[derive(Args, Clone, Debug)]
pub struct SettingsArgs {
    /// Settings file; overrides the configured location
    #[arg(long, value_name = "FILE", global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SettingsAction {
    /// Show the persisted settings
    Show,

    /// Change the persisted settings
    Set {
        /// Turn dimming on or off
        #[arg(long)]
        enabled: Option<bool>,

        /// Opacity for dimmed elements (0.0 - 1.0)
        #[arg(long)]
        opacity: Option<f64>,
    },

    /// Write the default settings
    Reset,
}

#[derive(Debug, Serialize)]
struct SettingsView {
    path: PathBuf,
    enabled: bool,
    opacity: f64,
    percent: u32,
}

impl SettingsView {
    fn new(path: PathBuf, config: EngineConfig) -> Self {
        Self {
            path,
            enabled: config.enabled,
            opacity: config.intensity,
            percent: opacity_percent(config.intensity),
        }
    }

    fn human(&self) -> String {
        format!(
            "Settings ({}):\n  Dimming: {}\n  Opacity: {}% ({})",
            self.path.display(),
            if self.enabled { "enabled" } else { "disabled" },
            self.percent,
            OPACITY_LABEL
        )
    }
}

pub fn opacity_percent(opacity: f64) -> u32 {
    (opacity.clamp(0.0, 1.0) * 100.0).round() as u32
}

pub async fn cmd_settings(args: SettingsArgs, ctx: &CliContext) -> Result<()> {
    let path = args
        .file
        .clone()
        .unwrap_or_else(|| ctx.config().resolved_settings_path());
    let store = JsonFileSettings::new(path.clone());

    let config = match args.action {
        SettingsAction::Show => load_or_default(&store).await?,
        SettingsAction::Set { enabled, opacity } => {
            if enabled.is_none() && opacity.is_none() {
                bail!("nothing to change; pass --enabled and/or --opacity");
            }
            let mut config = load_or_default(&store).await?;
            if let Some(enabled) = enabled {
                config.enabled = enabled;
            }
            if let Some(value) = opacity {
                config.intensity = match clamp_intensity(value) {
                    Some(value) => value,
                    None => bail!("opacity must be a finite number, got {}", value),
                };
            }
            store
                .save(&config)
                .await
                .with_context(|| format!("Failed to write settings to {}", path.display()))?;
            info!(path = %path.display(), enabled = config.enabled, opacity = config.intensity, "settings updated");
            config
        }
        SettingsAction::Reset => {
            let config = EngineConfig::default();
            store
                .save(&config)
                .await
                .with_context(|| format!("Failed to write settings to {}", path.display()))?;
            info!(path = %path.display(), "settings reset to defaults");
            config
        }
    };

    ctx.output()
        .emit(&SettingsView::new(path, config), SettingsView::human)
}

async fn load_or_default(store: &JsonFileSettings) -> Result<EngineConfig> {
    let loaded = store
        .load()
        .await
        .with_context(|| format!("Failed to read settings from {}", store.describe()))?;
    Ok(loaded.map(EngineConfig::sanitized).unwrap_or_default())
}
