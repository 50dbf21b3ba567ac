use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use overlay_engine::model::clamp_intensity;
use overlay_engine::style::StyleRuleGenerator;
use overlay_engine::{EngineConfig, HoverMode};
use serde::Serialize;
use tracing::warn;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CssArgs {
    /// Opacity for dimmed elements (0.0 - 1.0); defaults to the persisted value
    #[arg(long)]
    pub opacity: Option<f64>,

    /// Hover handling to render for; defaults to the configured mode
    #[arg(long, value_enum)]
    pub hover_mode: Option<HoverModeArg>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HoverModeArg {
    Declarative,
    Imperative,
}

impl From<HoverModeArg> for HoverMode {
    fn from(arg: HoverModeArg) -> Self {
        match arg {
            HoverModeArg::Declarative => HoverMode::Declarative,
            HoverModeArg::Imperative => HoverMode::Imperative,
        }
    }
}

#[derive(Debug, Serialize)]
struct CssOutput {
    stylesheet_id: String,
    opacity: f64,
    hover_mode: HoverMode,
    css: String,
}

pub async fn cmd_css(args: CssArgs, ctx: &CliContext) -> Result<()> {
    let opacity = match args.opacity {
        Some(value) => match clamp_intensity(value) {
            Some(value) => value,
            None => bail!("opacity must be a finite number, got {}", value),
        },
        None => persisted_opacity(ctx).await,
    };
    let policy = &ctx.config().policy;
    let hover_mode = args.hover_mode.map(HoverMode::from).unwrap_or(policy.hover_mode);
    let generator = StyleRuleGenerator::new(&policy.profile, hover_mode);

    let output = CssOutput {
        stylesheet_id: generator.stylesheet_id().to_string(),
        opacity,
        hover_mode,
        css: generator.render(opacity),
    };
    ctx.output().emit(&output, |out| out.css.clone())
}

async fn persisted_opacity(ctx: &CliContext) -> f64 {
    let port = ctx.settings_port(None);
    match port.load().await {
        Ok(Some(config)) => config.sanitized().intensity,
        Ok(None) => EngineConfig::default().intensity,
        Err(err) => {
            warn!(%err, "settings unreadable; rendering default opacity");
            EngineConfig::default().intensity
        }
    }
}
