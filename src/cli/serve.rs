use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use control_bridge::ControlBridge;
use document_tree::fixture::load_fixture_from_path;
use document_tree::{Document, MutationStep};
use overlay_engine::{EngineEvent, OverlayController, OverlayEngine};
use tokio::io::{self, BufReader};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Document fixture (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub fixture: PathBuf,

    /// Settings file; overrides the configured location
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Do not replay the fixture's mutation timeline
    #[arg(long)]
    pub no_mutations: bool,

    /// Stop serving after this long, e.g. "30s" or "2m"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub exit_after: Option<Duration>,
}

/// Runs the engine against a fixture and answers JSON-line commands on
/// stdin/stdout until EOF, Ctrl+C, or `--exit-after`.
pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let fixture = load_fixture_from_path(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    let document = fixture
        .build()
        .context("Failed to build document from fixture")?;

    let engine = OverlayEngine::builder(document.clone())
        .with_policy(ctx.config().policy.clone())
        .with_settings(ctx.settings_port(args.settings.as_deref()))
        .build();
    let event_log = spawn_event_log(engine.subscribe());
    let status = engine.start().await?;
    info!(
        fixture = %args.fixture.display(),
        enabled = status.enabled,
        opacity = status.opacity,
        suppressed = status.suppressed,
        "overlay engine serving"
    );

    let cancel = CancellationToken::new();
    let replay = if args.no_mutations {
        None
    } else {
        Some(spawn_replay(document, fixture.timeline(), cancel.clone()))
    };
    let interrupt = spawn_interrupt(cancel.clone(), args.exit_after);

    let controller: Arc<dyn OverlayController> = Arc::new(engine.clone());
    let (bridge_events, _) = broadcast::channel(64);
    let bridge = ControlBridge::new(bridge_events, controller);
    let served = bridge
        .serve(BufReader::new(io::stdin()), io::stdout(), cancel.clone())
        .await;

    cancel.cancel();
    interrupt.abort();
    if let Some(replay) = replay {
        let _ = replay.await;
    }
    engine.shutdown().await;
    event_log.abort();

    let summary = served.context("Control channel failed")?;
    info!(
        handled = summary.handled,
        failed = summary.failed,
        "control channel closed"
    );
    Ok(())
}

fn spawn_replay(
    document: Document,
    timeline: Vec<MutationStep>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();
        for step in timeline {
            let due = start + Duration::from_millis(step.at_ms);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep_until(due) => {}
            }
            match step.apply(&document) {
                Ok(count) => debug!(at_ms = step.at_ms, count, "fixture mutation replayed"),
                Err(err) => warn!(at_ms = step.at_ms, %err, "fixture mutation failed"),
            }
        }
        debug!("fixture timeline finished");
    })
}

fn spawn_interrupt(cancel: CancellationToken, exit_after: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                warn!(?err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };
        let deadline = async {
            match exit_after {
                Some(after) => sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = ctrl_c => {
                info!("interrupt received; shutting down");
                cancel.cancel();
            }
            _ = deadline => {
                info!("exit-after elapsed; shutting down");
                cancel.cancel();
            }
        }
    })
}

fn spawn_event_log(mut events: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "engine event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "engine event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
