use std::sync::Arc;
use std::time::Duration;

use document_tree::{Document, NodeId};
use overlay_engine::schedule::SchedulerPhase;
use overlay_engine::{
    parse_command, Command, EngineConfig, EngineEvent, EnginePolicy, HoverMode, MemorySettings,
    OverlayController, OverlayEngine,
};

const MARKER: &str = "data-overlay-dimmed";

struct Page {
    doc: Document,
    player: NodeId,
    card: NodeId,
    controls_card: NodeId,
}

fn element(doc: &Document, parent: NodeId, tag: &str, class: &str) -> NodeId {
    let node = doc.create_element(tag);
    if !class.is_empty() {
        doc.set_attribute(node, "class", class).unwrap();
    }
    doc.append_child(parent, node).unwrap();
    node
}

fn page() -> Page {
    let doc = Document::new();
    let app = element(&doc, doc.body(), "ytd-app", "");
    let player = element(&doc, app, "div", "html5-video-player");
    let card = element(&doc, player, "div", "ytp-ce-element ytp-ce-element-show");
    let bottom = element(&doc, player, "div", "ytp-chrome-bottom");
    let controls_card = element(&doc, bottom, "div", "ytp-ce-element-show");
    Page {
        doc,
        player,
        card,
        controls_card,
    }
}

fn engine(doc: &Document) -> (OverlayEngine, Arc<MemorySettings>) {
    let settings = Arc::new(MemorySettings::new());
    let engine = OverlayEngine::builder(doc.clone())
        .with_settings(settings.clone())
        .build();
    (engine, settings)
}

fn opacity(doc: &Document, node: NodeId) -> f64 {
    doc.computed_style(node).unwrap().opacity
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn enable_dims_candidates_and_hover_restores() {
    let page = page();
    let (engine, settings) = engine(&page.doc);
    engine.enable().await.unwrap();

    assert_eq!(page.doc.get_attribute(page.card, MARKER).as_deref(), Some("true"));
    assert!(!page.doc.has_attribute(page.controls_card, MARKER));
    assert_eq!(opacity(&page.doc, page.card), 0.3);
    assert_eq!(opacity(&page.doc, page.controls_card), 1.0);

    page.doc.pointer_over(page.card).unwrap();
    assert_eq!(opacity(&page.doc, page.card), 1.0);
    page.doc.pointer_out();
    assert_eq!(opacity(&page.doc, page.card), 0.3);

    let status = engine.status();
    assert!(status.enabled);
    assert_eq!(status.suppressed, 1);
    assert!(status.rule_installed);
    assert!(!status.hover_listener);
    assert_eq!(settings.current(), Some(EngineConfig::default()));
}

#[tokio::test(start_paused = true)]
async fn intensity_change_keeps_marks() {
    let page = page();
    let (engine, settings) = engine(&page.doc);
    engine.enable().await.unwrap();
    let before = engine.status().suppressed;

    let response = engine.handle(Command::SetOpacity { opacity: 0.6 }).await;
    assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"success":true,"opacity":0.6}"#);
    assert_eq!(opacity(&page.doc, page.card), 0.6);
    assert_eq!(engine.status().suppressed, before);
    assert_eq!(settings.current().unwrap().intensity, 0.6);

    let clamped = engine.handle(Command::SetOpacity { opacity: 4.0 }).await;
    assert_eq!(clamped.opacity, Some(1.0));
    let rejected = engine.handle(Command::SetOpacity { opacity: f64::NAN }).await;
    assert!(rejected.is_failure());
    assert_eq!(engine.config().intensity, 1.0);
}

#[tokio::test(start_paused = true)]
async fn disable_restores_and_reenable_is_a_cold_start() {
    let page = page();
    page.doc
        .set_style_property(page.card, "opacity", "0.9")
        .unwrap();
    let (engine, _) = engine(&page.doc);
    engine.enable().await.unwrap();
    let cold = engine.status().schedule;

    advance(12_000).await;
    assert!(engine.status().schedule.delay_ms > cold.delay_ms);

    engine.disable().await.unwrap();
    assert!(!page.doc.has_attribute(page.card, MARKER));
    assert_eq!(page.doc.style_property(page.card, "opacity").as_deref(), Some("0.9"));
    assert_eq!(opacity(&page.doc, page.card), 0.9);
    advance(1).await;
    assert_eq!(page.doc.observer_count(), 0);
    let status = engine.status();
    assert!(!status.rule_installed);
    assert_eq!(status.schedule.phase, SchedulerPhase::Stopped);

    engine.enable().await.unwrap();
    assert_eq!(engine.status().schedule, cold);
    assert_eq!(engine.status().suppressed, 1);
}

#[tokio::test(start_paused = true)]
async fn schedule_backs_off_after_three_empty_rounds() {
    let doc = Document::new();
    let (engine, _) = engine(&doc);
    engine.enable().await.unwrap();
    assert_eq!(engine.status().schedule.delay_ms, 1000);

    advance(2100).await;
    assert_eq!(engine.status().schedule.empty_rounds, 2);
    assert_eq!(engine.status().schedule.delay_ms, 1000);

    advance(1000).await;
    assert_eq!(engine.status().schedule.empty_rounds, 3);
    assert_eq!(engine.status().schedule.delay_ms, 1500);

    advance(120_000).await;
    assert_eq!(engine.status().schedule.delay_ms, 10_000);

    element(&doc, doc.body(), "div", "ytp-ce-element-show");
    advance(300).await;
    let status = engine.status();
    assert_eq!(status.suppressed, 1);
    assert_eq!(status.schedule.delay_ms, 1000);
    assert_eq!(status.schedule.empty_rounds, 0);
}

#[tokio::test(start_paused = true)]
async fn mutation_burst_triggers_one_rescan() {
    let page = page();
    let (engine, _) = engine(&page.doc);
    let mut events = engine.subscribe();
    engine.enable().await.unwrap();

    let late = element(&page.doc, page.player, "div", "ytReelMetapanelViewModelHost");
    element(&page.doc, page.player, "div", "unrelated");
    advance(200).await;
    assert!(!page.doc.has_attribute(late, MARKER));
    advance(100).await;
    assert_eq!(page.doc.get_attribute(late, MARKER).as_deref(), Some("true"));

    let mut mutation_scans = 0;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::ScanCompleted { trigger, .. } = event {
            if trigger == overlay_engine::ScanTrigger::Mutation {
                mutation_scans += 1;
            }
        }
    }
    assert_eq!(mutation_scans, 1);
}

#[tokio::test(start_paused = true)]
async fn no_timer_survives_disable() {
    let page = page();
    let (engine, _) = engine(&page.doc);
    engine.enable().await.unwrap();

    assert!(engine.force_rescan().await.unwrap());
    assert!(!page.doc.has_attribute(page.card, MARKER));
    assert_eq!(engine.pending_timers(), 1);
    engine.disable().await.unwrap();
    element(&page.doc, page.player, "div", "ytp-ce-element-show");

    advance(30_000).await;
    assert!(page.doc.select(&format!("[{MARKER}]")).unwrap().is_empty());
    assert_eq!(engine.status().suppressed, 0);
    assert!(!engine.force_rescan().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn reapply_remarks_after_settle_delay() {
    let page = page();
    let (engine, _) = engine(&page.doc);
    engine.enable().await.unwrap();

    let response = engine.handle(parse_command(r#"{"action":"reapply"}"#).unwrap()).await;
    assert_eq!(response.success, Some(true));
    assert_eq!(engine.status().suppressed, 0);
    advance(50).await;
    assert_eq!(engine.status().suppressed, 0);
    advance(60).await;
    assert_eq!(engine.status().suppressed, 1);
    assert_eq!(engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_honours_persisted_settings() {
    let page = page();
    let settings = Arc::new(MemorySettings::with_value(EngineConfig {
        enabled: false,
        intensity: 0.5,
    }));
    let engine = OverlayEngine::builder(page.doc.clone())
        .with_settings(settings.clone())
        .build();
    let status = engine.start().await.unwrap();
    assert!(!status.enabled);
    assert_eq!(status.opacity, 0.5);
    assert!(!page.doc.has_attribute(page.card, MARKER));

    let response = engine.handle(Command::ToggleEnabled { enabled: true }).await;
    assert_eq!(response.enabled, Some(true));
    assert_eq!(opacity(&page.doc, page.card), 0.5);
    assert_eq!(
        settings.current(),
        Some(EngineConfig {
            enabled: true,
            intensity: 0.5
        })
    );

    engine.shutdown().await;
    assert!(!page.doc.has_attribute(page.card, MARKER));
    assert!(settings.current().unwrap().enabled);
}

#[tokio::test(start_paused = true)]
async fn unreadable_settings_fall_back_to_defaults_and_writes_are_best_effort() {
    let page = page();
    let settings = Arc::new(MemorySettings::new());
    settings.set_unavailable(true);
    let engine = OverlayEngine::builder(page.doc.clone())
        .with_settings(settings.clone())
        .build();
    let mut events = engine.subscribe();

    let status = engine.start().await.unwrap();
    assert!(status.enabled);
    assert_eq!(status.opacity, 0.3);

    let response = engine.handle(Command::SetOpacity { opacity: 0.2 }).await;
    assert_eq!(response.success, Some(true));
    assert_eq!(opacity(&page.doc, page.card), 0.2);

    let mut persist_failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, EngineEvent::PersistFailed { .. }) {
            persist_failures += 1;
        }
    }
    assert_eq!(persist_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn get_status_reports_enabled_and_opacity() {
    let page = page();
    let (engine, _) = engine(&page.doc);
    let response = engine.handle(Command::GetStatus).await;
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"enabled":false,"opacity":0.3}"#
    );
    engine.start().await.unwrap();
    let response = engine.handle(Command::GetStatus).await;
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"enabled":true,"opacity":0.3}"#
    );
    engine.handle(Command::ToggleEnabled { enabled: false }).await;
    let response = engine.handle(Command::GetStatus).await;
    assert_eq!(response.enabled, Some(false));
}

#[tokio::test(start_paused = true)]
async fn engine_is_idle_until_started() {
    let page = page();
    let (engine, settings) = engine(&page.doc);

    let status = engine.status();
    assert!(!status.enabled);
    assert!(!status.rule_installed);
    assert_eq!(status.schedule.phase, SchedulerPhase::Stopped);

    let report = engine.scan_now();
    assert_eq!(report.found(), 0);
    assert_eq!(report.candidates, 0);
    assert!(!page.doc.has_attribute(page.card, MARKER));
    assert!(!engine.force_rescan().await.unwrap());
    assert_eq!(page.doc.observer_count(), 0);
    assert_eq!(settings.current(), None);

    engine.start().await.unwrap();
    assert!(engine.status().enabled);
    assert_eq!(page.doc.get_attribute(page.card, MARKER).as_deref(), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn imperative_hover_writes_inline_opacity() {
    let page = page();
    let policy = EnginePolicy {
        hover_mode: HoverMode::Imperative,
        ..EnginePolicy::default()
    };
    let engine = OverlayEngine::builder(page.doc.clone())
        .with_policy(policy)
        .build();
    engine.enable().await.unwrap();

    assert!(engine.status().hover_listener);
    assert_eq!(page.doc.style_property(page.card, "opacity").as_deref(), Some("0.3"));
    assert_eq!(opacity(&page.doc, page.card), 0.3);

    page.doc.pointer_over(page.card).unwrap();
    assert_eq!(opacity(&page.doc, page.card), 1.0);
    page.doc.pointer_out();
    assert_eq!(opacity(&page.doc, page.card), 0.3);

    engine.set_intensity(0.7).await.unwrap();
    assert_eq!(page.doc.style_property(page.card, "opacity").as_deref(), Some("0.7"));

    page.doc.add_class(page.player, "ytp-autohide").unwrap();
    assert_eq!(opacity(&page.doc, page.card), 0.0);
    page.doc.remove_class(page.player, "ytp-autohide").unwrap();

    engine.disable().await.unwrap();
    assert_eq!(page.doc.style_property(page.card, "opacity"), None);
    assert_eq!(page.doc.pointer_listener_count(), 0);
}
