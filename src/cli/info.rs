use std::path::PathBuf;

use anyhow::Result;
use overlay_engine::metrics::{self as engine_metrics, EngineMetricsSnapshot};
use overlay_engine::HoverMode;
use serde::Serialize;

use super::context::CliContext;

#[derive(Debug, Serialize)]
struct BuildInfo {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    git_branch: &'static str,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    build: BuildInfo,
    config_path: PathBuf,
    settings_path: PathBuf,
    profile: String,
    match_patterns: usize,
    protected_zones: usize,
    hover_mode: HoverMode,
    min_delay_ms: u64,
    max_delay_ms: u64,
    metrics_port: u16,
    counters: EngineMetricsSnapshot,
}

impl InfoOutput {
    fn human(&self) -> String {
        let mut lines = vec![
            "Overlay Dimmer".to_string(),
            "==============".to_string(),
            format!("Version: {}", self.build.version),
            format!("Build Date: {}", self.build.build_date),
            format!(
                "Git Commit: {} ({})",
                self.build.git_commit, self.build.git_branch
            ),
            String::new(),
            "Configuration:".to_string(),
            format!("- Config File: {}", self.config_path.display()),
            format!("- Settings File: {}", self.settings_path.display()),
            format!(
                "- Profile: {} ({} patterns, {} protected zones)",
                self.profile, self.match_patterns, self.protected_zones
            ),
            format!("- Hover Mode: {:?}", self.hover_mode),
            format!(
                "- Rescan Interval: {}ms - {}ms",
                self.min_delay_ms, self.max_delay_ms
            ),
        ];
        if self.metrics_port == 0 {
            lines.push("- Metrics: disabled".to_string());
        } else {
            lines.push(format!(
                "- Metrics: http://0.0.0.0:{}/metrics",
                self.metrics_port
            ));
        }
        lines.join("\n")
    }
}

pub fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let policy = &config.policy;
    let output = InfoOutput {
        build: BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            build_date: env!("BUILD_DATE"),
            git_commit: env!("GIT_HASH"),
            git_branch: env!("GIT_BRANCH"),
        },
        config_path: ctx.config_path().to_path_buf(),
        settings_path: config.resolved_settings_path(),
        profile: policy.profile.name.clone(),
        match_patterns: policy.profile.match_patterns.len(),
        protected_zones: policy.profile.protected_zones.len(),
        hover_mode: policy.hover_mode,
        min_delay_ms: policy.schedule.min_delay_ms,
        max_delay_ms: policy.schedule.max_delay_ms,
        metrics_port: ctx.metrics_port(),
        counters: engine_metrics::snapshot(),
    };
    ctx.output().emit(&output, InfoOutput::human)
}
