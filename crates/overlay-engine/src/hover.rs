//! Imperative hover restoration through one delegated capture listener.

use std::sync::Arc;

use document_tree::{Document, ListenerId, NodeId, PointerEvent, PointerKind, Selector};
use tracing::{trace, warn};

use crate::model::{format_opacity, SharedConfig};

pub struct HoverRestorer {
    doc: Document,
    marker: Selector,
    config: SharedConfig,
    listener: Option<ListenerId>,
}

impl HoverRestorer {
    pub fn new(doc: Document, marker: Selector, config: SharedConfig) -> Self {
        Self {
            doc,
            marker,
            config,
            listener: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Registers the listener once; later calls are no-ops.
    pub fn attach(&mut self) {
        if self.listener.is_some() {
            return;
        }
        let doc = self.doc.clone();
        let marker = self.marker.clone();
        let config = self.config.clone();
        let id = self.doc.add_pointer_listener(
            true,
            Arc::new(move |event: &PointerEvent| on_pointer(&doc, &marker, &config, event)),
        );
        trace!(target: "overlay-engine", listener = id.0, "hover listener attached");
        self.listener = Some(id);
    }

    pub fn detach(&mut self) {
        if let Some(id) = self.listener.take() {
            self.doc.remove_pointer_listener(id);
            trace!(target: "overlay-engine", listener = id.0, "hover listener detached");
        }
    }

    /// Writes the resting intensity, or full opacity while hovered.
    pub fn apply(&self, node: NodeId) {
        let intensity = self.config.read().intensity;
        let hovered = self
            .doc
            .hovered()
            .map(|h| self.doc.closest(h, &self.marker) == Some(node))
            .unwrap_or(false);
        let value = if hovered { "1".to_string() } else { format_opacity(intensity) };
        if let Err(err) = self.doc.set_style_property(node, "opacity", &value) {
            warn!(target: "overlay-engine", %node, ?err, "inline opacity write failed");
        }
    }

    pub fn apply_all(&self, nodes: &[NodeId]) {
        for node in nodes {
            self.apply(*node);
        }
    }
}

impl Drop for HoverRestorer {
    fn drop(&mut self) {
        self.detach();
    }
}

fn on_pointer(doc: &Document, marker: &Selector, config: &SharedConfig, event: &PointerEvent) {
    let Some(node) = doc.closest(event.target, marker) else {
        return;
    };
    let value = match event.kind {
        PointerKind::Over => "1".to_string(),
        PointerKind::Out => format_opacity(config.read().intensity),
    };
    if let Err(err) = doc.set_style_property(node, "opacity", &value) {
        warn!(target: "overlay-engine", %node, ?err, "hover opacity write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EngineConfig;
    use parking_lot::RwLock;

    fn setup() -> (Document, NodeId, NodeId, HoverRestorer) {
        let doc = Document::new();
        let card = doc.create_element("div");
        doc.set_attribute(card, "data-overlay-dimmed", "true").unwrap();
        doc.append_child(doc.body(), card).unwrap();
        let label = doc.create_element("span");
        doc.append_child(card, label).unwrap();
        let config = Arc::new(RwLock::new(EngineConfig::default()));
        let restorer = HoverRestorer::new(
            doc.clone(),
            Selector::parse("[data-overlay-dimmed=\"true\"]").unwrap(),
            config,
        );
        (doc, card, label, restorer)
    }

    #[test]
    fn hover_over_child_restores_marked_ancestor() {
        let (doc, card, label, mut restorer) = setup();
        restorer.attach();
        restorer.attach();
        assert_eq!(doc.pointer_listener_count(), 1);
        restorer.apply(card);
        assert_eq!(doc.style_property(card, "opacity").as_deref(), Some("0.3"));

        doc.pointer_over(label).unwrap();
        assert_eq!(doc.style_property(card, "opacity").as_deref(), Some("1"));
        doc.pointer_out();
        assert_eq!(doc.style_property(card, "opacity").as_deref(), Some("0.3"));
    }

    #[test]
    fn detach_stops_reacting() {
        let (doc, card, _label, mut restorer) = setup();
        restorer.attach();
        restorer.apply(card);
        restorer.detach();
        assert_eq!(doc.pointer_listener_count(), 0);
        doc.pointer_over(card).unwrap();
        assert_eq!(doc.style_property(card, "opacity").as_deref(), Some("0.3"));
    }
}
