use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use document_tree::fixture::load_fixture_from_path;
use document_tree::{Document, NodeId};
use overlay_engine::{OverlayController, OverlayEngine, ScanReport};
use serde::Serialize;

use super::context::CliContext;
use super::settings::opacity_percent;

#[derive(Args, Clone, Debug)]
pub struct ScanArgs {
    /// Document fixture (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub fixture: PathBuf,

    /// Opacity for dimmed elements (0.0 - 1.0)
    #[arg(long)]
    pub opacity: Option<f64>,

    /// Apply the fixture's mutation timeline before reporting
    #[arg(long)]
    pub apply_mutations: bool,
}

#[derive(Debug, Serialize)]
struct MarkedElement {
    node: NodeId,
    element: String,
    opacity: f64,
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    fixture: PathBuf,
    opacity: f64,
    report: ScanReport,
    elements: Vec<MarkedElement>,
}

impl ScanOutput {
    fn human(&self) -> String {
        let mut out = format!(
            "Scanned {}: {} candidates, {} dimmed, {} rejected\nOpacity: {}%",
            self.fixture.display(),
            self.report.candidates,
            self.elements.len(),
            self.report.rejected,
            opacity_percent(self.opacity)
        );
        for element in &self.elements {
            out.push_str(&format!(
                "\n  {} {} effective opacity {}",
                element.node, element.element, element.opacity
            ));
        }
        out
    }
}

/// Runs one engine session over the fixture; nothing is persisted.
pub async fn cmd_scan(args: ScanArgs, ctx: &CliContext) -> Result<()> {
    let fixture = load_fixture_from_path(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    let document = fixture
        .build()
        .context("Failed to build document from fixture")?;
    let policy = ctx.config().policy.clone();
    let marker = policy.profile.marker_selector();
    let engine = OverlayEngine::builder(document.clone())
        .with_policy(policy)
        .build();

    engine.enable().await?;
    if let Some(value) = args.opacity {
        engine.set_intensity(value).await?;
    }
    let mut report = engine.status().last_scan.unwrap_or_default();
    if args.apply_mutations {
        for step in fixture.timeline() {
            step.apply(&document)
                .with_context(|| format!("Failed to apply mutation at {}ms", step.at_ms))?;
        }
        report = engine.scan_now();
    }

    let output = ScanOutput {
        fixture: args.fixture.clone(),
        opacity: engine.config().intensity,
        report,
        elements: marked_elements(&document, &marker)?,
    };
    engine.shutdown().await;

    ctx.output().emit(&output, ScanOutput::human)
}

fn marked_elements(document: &Document, marker: &str) -> Result<Vec<MarkedElement>> {
    document
        .select(marker)?
        .into_iter()
        .map(|node| {
            let style = document.computed_style(node)?;
            Ok(MarkedElement {
                node,
                element: document.describe(node),
                opacity: style.opacity,
            })
        })
        .collect()
}
