//! Per-element suppression records keyed by node identity.
//!
//! Records never keep a node alive: every lookup is checked against the live
//! document, and records for nodes that no longer exist are simply dropped.

use std::collections::HashMap;

use document_tree::{Document, NodeId};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::model::{SuppressionRecord, VisualBaseline};

#[derive(Debug)]
pub struct SuppressionStore {
    marker: String,
    records: HashMap<NodeId, SuppressionRecord>,
}

impl SuppressionStore {
    pub fn new(marker_attribute: impl Into<String>) -> Self {
        Self {
            marker: marker_attribute.into(),
            records: HashMap::new(),
        }
    }

    pub fn marker_attribute(&self) -> &str {
        &self.marker
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Suppressed nodes in ascending id (creation) order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.records.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn baseline(&self, node: NodeId) -> Option<&VisualBaseline> {
        self.records.get(&node).map(|record| &record.baseline)
    }

    pub fn is_suppressed(&self, doc: &Document, node: NodeId) -> bool {
        self.records
            .get(&node)
            .map(|record| record.suppressed)
            .unwrap_or(false)
            && doc.get_attribute(node, &self.marker).as_deref() == Some("true")
    }

    /// Captures the baseline and applies the marker. `Ok(false)` when the
    /// node was already suppressed.
    pub fn mark_suppressed(&mut self, doc: &Document, node: NodeId) -> Result<bool, EngineError> {
        if self.is_suppressed(doc, node) {
            return Ok(false);
        }
        let baseline = match self.records.remove(&node) {
            // Marker was stripped externally; keep the original baseline.
            Some(existing) => existing.baseline,
            None => VisualBaseline {
                inline_opacity: doc.style_property(node, "opacity"),
                computed_opacity: doc.computed_style(node)?.opacity,
            },
        };
        doc.set_attribute(node, &self.marker, "true")?;
        self.records.insert(
            node,
            SuppressionRecord {
                baseline,
                suppressed: true,
            },
        );
        Ok(true)
    }

    /// Restores the captured baseline exactly and removes the marker.
    pub fn unmark_suppressed(&mut self, doc: &Document, node: NodeId) -> Result<bool, EngineError> {
        let Some(record) = self.records.remove(&node) else {
            return Ok(false);
        };
        if !doc.contains(node) {
            return Ok(true);
        }
        doc.remove_attribute(node, &self.marker)?;
        match &record.baseline.inline_opacity {
            Some(value) => doc.set_style_property(node, "opacity", value)?,
            None => doc.remove_style_property(node, "opacity")?,
        }
        Ok(true)
    }

    /// Restores every record, then strips markers no record accounts for.
    pub fn unmark_all(&mut self, doc: &Document) -> usize {
        let mut restored = 0;
        for node in self.nodes() {
            match self.unmark_suppressed(doc, node) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(err) => warn!(target: "overlay-engine", %node, ?err, "restore failed"),
            }
        }
        let orphan_selector = format!("[{}]", self.marker);
        match doc.select(&orphan_selector) {
            Ok(orphans) => {
                for node in orphans {
                    if doc.remove_attribute(node, &self.marker).unwrap_or(false) {
                        debug!(target: "overlay-engine", %node, "orphan marker removed");
                    }
                }
            }
            Err(err) => warn!(target: "overlay-engine", ?err, "orphan sweep skipped"),
        }
        restored
    }

    /// Drops records for gone nodes and restores detached or externally
    /// unmarked ones. Returns how many records were removed.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let stale: Vec<NodeId> = self
            .records
            .keys()
            .copied()
            .filter(|node| !doc.is_connected(*node) || !self.is_suppressed(doc, *node))
            .collect();
        for node in &stale {
            if let Err(err) = self.unmark_suppressed(doc, *node) {
                warn!(target: "overlay-engine", node = %node, ?err, "prune restore failed");
                self.records.remove(node);
            }
        }
        stale.len()
    }
}
