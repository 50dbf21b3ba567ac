//! Mutation-driven rescans, debounced so a burst of additions costs one scan.

use std::collections::HashSet;
use std::sync::Weak;
use std::time::Duration;

use document_tree::{Document, MutationObserver, NodeId, Selector};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::scanner::PatternSet;
use crate::timers::LoopHandle;

pub trait WatchDriver: Send + Sync + 'static {
    /// Runs a rescan after relevant additions; `false` once the session ended.
    fn mutation_scan(&self, session: &CancellationToken) -> bool;
}

/// First existing content root in preference order, else the document root.
pub fn resolve_watch_root(doc: &Document, content_roots: &[String]) -> NodeId {
    for source in content_roots {
        match Selector::parse(source) {
            Ok(selector) => {
                if let Some(node) = doc.query_selector(doc.root(), &selector) {
                    debug!(target: "overlay-engine", root = %source, %node, "watching content root");
                    return node;
                }
            }
            Err(err) => warn!(target: "overlay-engine", root = %source, %err, "content root skipped"),
        }
    }
    doc.root()
}

/// True as soon as one connected added node is, or contains, a candidate.
pub fn additions_contain_candidate(doc: &Document, patterns: &PatternSet, added: &[NodeId]) -> bool {
    added
        .iter()
        .any(|node| doc.is_connected(*node) && patterns.matches_subtree(doc, *node))
}

/// A window never stays open longer than this many `coalesce` periods.
const MAX_WAIT_PERIODS: u32 = 4;

/// Spawns the watcher loop. Every batch that adds a node not already pending
/// pushes the timer out to `coalesce` from now, capped at
/// `MAX_WAIT_PERIODS * coalesce` after the batch that opened the window.
pub fn spawn_watcher<D: WatchDriver>(
    driver: Weak<D>,
    doc: Document,
    patterns: PatternSet,
    mut observer: MutationObserver,
    coalesce: Duration,
    session: CancellationToken,
) -> LoopHandle {
    let cancel = session.child_token();
    let loop_token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut pending: Vec<NodeId> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut opened: Option<Instant> = None;
        let mut deadline: Option<Instant> = None;
        loop {
            let armed = deadline;
            let fire = async move {
                match armed {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = loop_token.cancelled() => break,
                batch = observer.next_batch() => {
                    let Some(records) = batch else { break };
                    let before = pending.len();
                    for node in records.into_iter().flat_map(|r| r.added) {
                        if seen.insert(node) {
                            pending.push(node);
                        }
                    }
                    if pending.len() > before {
                        let now = Instant::now();
                        let cap = *opened.get_or_insert(now) + coalesce * MAX_WAIT_PERIODS;
                        deadline = Some((now + coalesce).min(cap));
                    }
                }
                _ = fire => {
                    deadline = None;
                    opened = None;
                    seen.clear();
                    let added = std::mem::take(&mut pending);
                    if !additions_contain_candidate(&doc, &patterns, &added) {
                        trace!(target: "overlay-engine", added = added.len(), "mutation window without candidates");
                        continue;
                    }
                    let Some(driver) = driver.upgrade() else { break };
                    if !driver.mutation_scan(&session) {
                        break;
                    }
                }
            }
        }
        observer.disconnect();
        trace!(target: "overlay-engine", "watcher loop exited");
    });
    LoopHandle::new(cancel, task)
}
