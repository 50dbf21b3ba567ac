//! Engine state machine. Every pass runs under one lock; background tasks
//! only hold `Weak` references and re-check their session before acting.

use std::sync::{Arc, Weak};
use std::time::Duration;

use document_tree::{Document, Selector};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::EngineError;
use crate::events::{EngineEvent, EngineEventBus};
use crate::hover::HoverRestorer;
use crate::metrics;
use crate::model::{clamp_intensity, EngineConfig, EngineStatus, ScanReport, ScanTrigger, SharedConfig};
use crate::policy::{EnginePolicy, HoverMode};
use crate::schedule::AdaptiveSchedule;
use crate::scanner::Scanner;
use crate::scheduler::{spawn_scheduler, ScanDriver};
use crate::store::SuppressionStore;
use crate::style::StyleRuleGenerator;
use crate::timers::{LoopHandle, TimerKey, TimerSet};
use crate::watcher::{resolve_watch_root, spawn_watcher, WatchDriver};

/// Everything owned by one enable → disable span.
struct Session {
    token: CancellationToken,
    wake: Arc<Notify>,
    timers: TimerSet,
    _scheduler: LoopHandle,
    _watcher: LoopHandle,
}

impl Session {
    fn end(mut self) {
        self.token.cancel();
        self.timers.cancel_all();
    }
}

struct EngineState {
    store: SuppressionStore,
    schedule: AdaptiveSchedule,
    rules: StyleRuleGenerator,
    hover: Option<HoverRestorer>,
    session: Option<Session>,
    last_scan: Option<ScanReport>,
}

pub(crate) struct EngineCore {
    me: Weak<EngineCore>,
    document: Document,
    policy: EnginePolicy,
    config: SharedConfig,
    scanner: Scanner,
    state: Mutex<EngineState>,
    events: EngineEventBus,
}

impl EngineCore {
    pub fn new(
        document: Document,
        policy: EnginePolicy,
        config: EngineConfig,
        events: EngineEventBus,
    ) -> Arc<Self> {
        let config: SharedConfig = Arc::new(RwLock::new(config.sanitized()));
        let profile = &policy.profile;
        let hover = match policy.hover_mode {
            HoverMode::Declarative => None,
            HoverMode::Imperative => match Selector::parse(&profile.marker_selector()) {
                Ok(marker) => Some(HoverRestorer::new(document.clone(), marker, config.clone())),
                Err(err) => {
                    warn!(target: "overlay-engine", %err, "marker attribute unusable; hover restore off");
                    None
                }
            },
        };
        let state = EngineState {
            store: SuppressionStore::new(&profile.marker_attribute),
            schedule: AdaptiveSchedule::new(policy.schedule.clone()),
            rules: StyleRuleGenerator::new(profile, policy.hover_mode),
            hover,
            session: None,
            last_scan: None,
        };
        let scanner = Scanner::from_profile(profile);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            document,
            scanner,
            config,
            state: Mutex::new(state),
            events,
            policy,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub fn config(&self) -> EngineConfig {
        *self.config.read()
    }

    /// Replaces the config wholesale without side effects (startup only).
    pub fn seed_config(&self, config: EngineConfig) {
        *self.config.write() = config.sanitized();
    }

    /// Returns `true` when this call turned the engine on.
    pub fn enable(&self) -> Result<bool, EngineError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let intensity = self.config.read().intensity;
        state.rules.install(&self.document, intensity)?;
        self.config.write().enabled = true;
        if state.session.is_some() {
            trace!(target: "overlay-engine", "enable: already running");
            return Ok(false);
        }
        state.schedule.start();
        state.session = Some(self.start_session());
        let report = self.run_scan(state, ScanTrigger::Enable);
        info!(target: "overlay-engine", intensity, marked = report.found(), "suppression enabled");
        self.emit(EngineEvent::Enabled);
        Ok(true)
    }

    fn start_session(&self) -> Session {
        let token = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let scheduler = spawn_scheduler(self.me.clone(), token.clone(), wake.clone());
        let root = resolve_watch_root(&self.document, &self.policy.profile.content_roots);
        let watcher = spawn_watcher(
            self.me.clone(),
            self.document.clone(),
            self.scanner.patterns().clone(),
            self.document.observe(root),
            self.policy.mutation_coalesce(),
            token.clone(),
        );
        Session {
            timers: TimerSet::new(token.child_token()),
            token,
            wake,
            _scheduler: scheduler,
            _watcher: watcher,
        }
    }

    /// Returns how many elements were restored.
    pub fn disable(&self) -> usize {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let was_enabled = std::mem::replace(&mut self.config.write().enabled, false);
        if let Some(session) = state.session.take() {
            session.end();
        }
        state.schedule.stop();
        if let Some(hover) = state.hover.as_mut() {
            hover.detach();
        }
        let restored = state.store.unmark_all(&self.document);
        state.rules.uninstall(&self.document);
        metrics::record_restored(restored);
        metrics::set_suppressed(0);
        if was_enabled {
            info!(target: "overlay-engine", restored, "suppression disabled");
            self.emit(EngineEvent::Disabled { restored });
        }
        restored
    }

    pub fn set_intensity(&self, value: f64) -> Result<f64, EngineError> {
        let intensity = clamp_intensity(value).ok_or(EngineError::InvalidIntensity(value))?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let enabled = {
            let mut config = self.config.write();
            config.intensity = intensity;
            config.enabled
        };
        if enabled && state.session.is_some() {
            state.rules.install(&self.document, intensity)?;
            if let Some(hover) = &state.hover {
                hover.apply_all(&state.store.nodes());
            }
        }
        info!(target: "overlay-engine", intensity, enabled, "intensity updated");
        self.emit(EngineEvent::IntensityChanged { intensity });
        Ok(intensity)
    }

    /// Unmarks everything and queues one scan after the settle delay.
    pub fn force_rescan(&self) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !self.config.read().enabled {
            return false;
        }
        let Some(session) = state.session.as_mut() else {
            return false;
        };
        let restored = state.store.unmark_all(&self.document);
        metrics::record_restored(restored);
        state.schedule.reset();
        session.wake.notify_one();
        let delay = self.policy.settle_delay();
        let me = self.me.clone();
        let token = session.token.clone();
        session.timers.arm(TimerKey::Settle, delay, async move {
            if let Some(core) = me.upgrade() {
                core.with_session(&token, |state| core.run_scan(state, ScanTrigger::Rescan));
            }
        });
        debug!(target: "overlay-engine", restored, delay_ms = delay.as_millis() as u64, "rescan scheduled");
        self.emit(EngineEvent::RescanScheduled {
            delay_ms: delay.as_millis() as u64,
        });
        true
    }

    /// Immediate pass outside the schedule. Empty report without a session.
    pub fn scan_now(&self) -> ScanReport {
        let mut guard = self.state.lock();
        if guard.session.is_none() {
            trace!(target: "overlay-engine", "manual scan skipped; engine not running");
            return ScanReport::new(ScanTrigger::Manual);
        }
        self.run_scan(&mut guard, ScanTrigger::Manual)
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state.lock();
        let config = self.config();
        EngineStatus {
            enabled: config.enabled,
            opacity: config.intensity,
            suppressed: state.store.len(),
            rule_installed: state.rules.is_installed(&self.document),
            hover_listener: state.hover.as_ref().map(|h| h.is_attached()).unwrap_or(false),
            schedule: state.schedule.snapshot(),
            last_scan: state.last_scan.clone(),
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|s| s.timers.pending())
            .unwrap_or(0)
    }

    fn with_session<R>(
        &self,
        session: &CancellationToken,
        f: impl FnOnce(&mut EngineState) -> R,
    ) -> Option<R> {
        let mut guard = self.state.lock();
        if session.is_cancelled() || !self.config.read().enabled {
            return None;
        }
        Some(f(&mut guard))
    }

    fn run_scan(&self, state: &mut EngineState, trigger: ScanTrigger) -> ScanReport {
        let config = self.config();
        if config.enabled {
            if let Err(err) = state.rules.install(&self.document, config.intensity) {
                warn!(target: "overlay-engine", ?err, "rule reinstall failed");
            }
        }
        let report = self
            .scanner
            .scan(&self.document, &config, &mut state.store, trigger);
        if !report.newly_marked.is_empty() {
            if let Some(hover) = state.hover.as_mut() {
                hover.attach();
                hover.apply_all(&report.newly_marked);
            }
        }
        metrics::record_scan(trigger, report.found());
        metrics::set_suppressed(state.store.len());
        self.emit(EngineEvent::ScanCompleted {
            trigger,
            newly_marked: report.found(),
            suppressed: state.store.len(),
        });
        state.last_scan = Some(report.clone());
        report
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

impl ScanDriver for EngineCore {
    fn next_delay(&self, session: &CancellationToken) -> Option<Duration> {
        let state = self.state.lock();
        (!session.is_cancelled() && state.schedule.is_running())
            .then(|| state.schedule.current_delay())
    }

    fn scheduled_scan(&self, session: &CancellationToken) -> bool {
        self.with_session(session, |state| {
            state.schedule.begin_scan();
            let report = self.run_scan(state, ScanTrigger::Schedule);
            let next = state.schedule.record_scan(report.found());
            trace!(
                target: "overlay-engine",
                found = report.found(),
                next_delay_ms = next.as_millis() as u64,
                "scheduled scan"
            );
        })
        .is_some()
    }
}

impl WatchDriver for EngineCore {
    fn mutation_scan(&self, session: &CancellationToken) -> bool {
        self.with_session(session, |state| {
            metrics::record_mutation_trigger();
            let report = self.run_scan(state, ScanTrigger::Mutation);
            state.schedule.reset();
            if let Some(session) = &state.session {
                session.wake.notify_one();
            }
            debug!(target: "overlay-engine", marked = report.found(), "mutation rescan");
        })
        .is_some()
    }
}
