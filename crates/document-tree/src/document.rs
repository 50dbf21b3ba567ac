use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

use crate::errors::DocumentError;
use crate::events::{ListenerId, PointerEvent, PointerKind, PointerListener};
use crate::mutation::{MutationObserver, MutationRecord, ObserverId};
use crate::selector::Selector;
use crate::style::{parse_declarations, serialize_declarations, ComputedStyle, Declaration, StyleSheet};
use crate::tree::{InstalledSheet, Tree};
use crate::NodeId;

struct ObserverEntry {
    id: ObserverId,
    target: NodeId,
    tx: mpsc::UnboundedSender<MutationRecord>,
}

struct ListenerEntry {
    id: ListenerId,
    capture: bool,
    callback: PointerListener,
}

pub(crate) struct Shared {
    tree: RwLock<Tree>,
    observers: Mutex<Vec<ObserverEntry>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_handle: AtomicU64,
}

impl Shared {
    pub(crate) fn disconnect(&self, id: ObserverId) {
        self.observers.lock().retain(|entry| entry.id != id);
    }
}

/// Shared handle to an in-process document.
///
/// Nodes are addressed by [`NodeId`]; ids are never reused, so a stale id
/// simply stops resolving once the host removes the node.
#[derive(Clone)]
pub struct Document {
    shared: Arc<Shared>,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.shared.tree.read().nodes.len())
            .finish()
    }
}

impl Document {
    /// Creates `<html><head/><body/></html>`.
    pub fn new() -> Self {
        let mut tree = Tree::new("html");
        let root = tree.root;
        let head = tree.create("head");
        let body = tree.create("body");
        for child in [head, body] {
            if let Some(node) = tree.nodes.get_mut(&child) {
                node.parent = Some(root);
            }
            if let Some(node) = tree.nodes.get_mut(&root) {
                node.children.push(child);
            }
        }
        Self {
            shared: Arc::new(Shared {
                tree: RwLock::new(tree),
                observers: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }),
            head,
            body,
        }
    }

    pub fn root(&self) -> NodeId {
        self.shared.tree.read().root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.shared.tree.write().create(tag)
    }

    /// Node still exists (attached or detached).
    pub fn contains(&self, node: NodeId) -> bool {
        self.shared.tree.read().nodes.contains_key(&node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.shared.tree.read().is_connected(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.shared.tree.read().nodes.get(&node)?.parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.shared
            .tree
            .read()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.shared.tree.read().nodes.get(&node).map(|n| n.tag.clone())
    }

    /// Appends `child` to `parent`, moving it if it is already attached.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let mut records = Vec::new();
        {
            let mut tree = self.shared.tree.write();
            if !tree.nodes.contains_key(&parent) {
                return Err(DocumentError::NodeNotFound(parent));
            }
            if !tree.nodes.contains_key(&child) {
                return Err(DocumentError::NodeNotFound(child));
            }
            if tree.is_inclusive_ancestor(child, parent) {
                return Err(DocumentError::Hierarchy(format!(
                    "{child} is an ancestor of {parent}"
                )));
            }
            if let Some(old_parent) = tree.unlink(child) {
                records.push(MutationRecord::removed(old_parent, child));
            }
            if let Some(node) = tree.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
            if let Some(node) = tree.nodes.get_mut(&parent) {
                node.children.push(child);
            }
            records.push(MutationRecord::added(parent, child));
            self.notify(&tree, records);
        }
        Ok(())
    }

    /// Unlinks `node` but keeps it (and its subtree) alive for reinsertion.
    pub fn detach(&self, node: NodeId) -> Result<(), DocumentError> {
        let mut tree = self.shared.tree.write();
        if !tree.nodes.contains_key(&node) {
            return Err(DocumentError::NodeNotFound(node));
        }
        if node == tree.root {
            return Err(DocumentError::Hierarchy("cannot detach the root".into()));
        }
        if let Some(parent) = tree.unlink(node) {
            self.notify(&tree, vec![MutationRecord::removed(parent, node)]);
        }
        Ok(())
    }

    /// Unlinks `node` and releases its subtree; its ids stop resolving.
    pub fn remove(&self, node: NodeId) -> Result<(), DocumentError> {
        let mut tree = self.shared.tree.write();
        if !tree.nodes.contains_key(&node) {
            return Err(DocumentError::NodeNotFound(node));
        }
        if node == tree.root || node == self.head || node == self.body {
            return Err(DocumentError::Hierarchy(format!("cannot remove {node}")));
        }
        let parent = tree.unlink(node);
        if let Some(parent) = parent {
            self.notify(&tree, vec![MutationRecord::removed(parent, node)]);
        }
        tree.purge(node);
        Ok(())
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.shared
            .tree
            .read()
            .nodes
            .get(&node)?
            .attributes
            .get(name)
            .cloned()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.shared
            .tree
            .read()
            .nodes
            .get(&node)
            .map(|n| n.attributes.contains_key(name))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        let mut tree = self.shared.tree.write();
        let data = tree
            .nodes
            .get_mut(&node)
            .ok_or(DocumentError::NodeNotFound(node))?;
        data.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<bool, DocumentError> {
        let mut tree = self.shared.tree.write();
        let data = tree
            .nodes
            .get_mut(&node)
            .ok_or(DocumentError::NodeNotFound(node))?;
        Ok(data.attributes.remove(name).is_some())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.get_attribute(node, "class")
            .map(|v| v.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DocumentError> {
        let current = self.get_attribute(node, "class").unwrap_or_default();
        if current.split_ascii_whitespace().any(|c| c == class) {
            return Ok(());
        }
        let next = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {}", current.trim(), class)
        };
        self.set_attribute(node, "class", &next)
    }

    pub fn remove_class(&self, node: NodeId, class: &str) -> Result<(), DocumentError> {
        let Some(current) = self.get_attribute(node, "class") else {
            return Ok(());
        };
        let next = current
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &next)
    }

    /// Inline `style` value for one property.
    pub fn style_property(&self, node: NodeId, property: &str) -> Option<String> {
        self.shared.tree.read().inline_value(node, property)
    }

    pub fn set_style_property(
        &self,
        node: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        self.edit_inline_style(node, |decls| {
            decls.retain(|d| d.property != property);
            decls.push(Declaration {
                property: property.to_ascii_lowercase(),
                value: value.to_string(),
                important: false,
            });
        })
    }

    pub fn remove_style_property(&self, node: NodeId, property: &str) -> Result<(), DocumentError> {
        self.edit_inline_style(node, |decls| decls.retain(|d| d.property != property))
    }

    fn edit_inline_style(
        &self,
        node: NodeId,
        edit: impl FnOnce(&mut Vec<Declaration>),
    ) -> Result<(), DocumentError> {
        let mut tree = self.shared.tree.write();
        let data = tree
            .nodes
            .get_mut(&node)
            .ok_or(DocumentError::NodeNotFound(node))?;
        let mut decls = data
            .attributes
            .get("style")
            .map(|s| parse_declarations(s))
            .unwrap_or_default();
        edit(&mut decls);
        if decls.is_empty() {
            data.attributes.remove("style");
        } else {
            data.attributes
                .insert("style".into(), serialize_declarations(&decls));
        }
        Ok(())
    }

    pub fn computed_style(&self, node: NodeId) -> Result<ComputedStyle, DocumentError> {
        self.shared
            .tree
            .read()
            .computed_style(node)
            .ok_or(DocumentError::NodeNotFound(node))
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.shared.tree.read().matches(node, selector)
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.shared.tree.read();
        let mut current = Some(node);
        while let Some(id) = current {
            if tree.matches(id, selector) {
                return Some(id);
            }
            current = tree.nodes.get(&id).and_then(|n| n.parent);
        }
        None
    }

    /// First descendant of `scope` in document order; stops at the first hit.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.shared.tree.read();
        let found = tree.descendants(scope).find(|id| tree.matches(*id, selector));
        found
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.shared.tree.read();
        let found = tree
            .descendants(scope)
            .filter(|id| tree.matches(*id, selector))
            .collect();
        found
    }

    /// Convenience over [`Document::query_selector_all`] for the whole document.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>, DocumentError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_selector_all(self.root(), &selector))
    }

    /// `tag#id.class` summary for logs.
    pub fn describe(&self, node: NodeId) -> String {
        let tree = self.shared.tree.read();
        let Some(data) = tree.nodes.get(&node) else {
            return format!("<gone {node}>");
        };
        let mut out = data.tag.clone();
        if let Some(id) = data.attributes.get("id") {
            out.push('#');
            out.push_str(id);
        }
        if let Some(class) = data.attributes.get("class") {
            for c in class.split_ascii_whitespace() {
                out.push('.');
                out.push_str(c);
            }
        }
        out
    }

    /// Installs or atomically replaces the author stylesheet `id`.
    pub fn install_stylesheet(&self, id: &str, css: &str) -> Result<u64, DocumentError> {
        let sheet = StyleSheet::parse(css)?;
        let mut tree = self.shared.tree.write();
        if let Some(existing) = tree.sheets.iter_mut().find(|s| s.id == id) {
            existing.sheet = sheet;
            existing.revision += 1;
            return Ok(existing.revision);
        }
        tree.sheets.push(InstalledSheet {
            id: id.to_string(),
            sheet,
            revision: 1,
        });
        Ok(1)
    }

    pub fn remove_stylesheet(&self, id: &str) -> bool {
        let mut tree = self.shared.tree.write();
        let before = tree.sheets.len();
        tree.sheets.retain(|s| s.id != id);
        tree.sheets.len() != before
    }

    pub fn stylesheet_text(&self, id: &str) -> Option<String> {
        self.shared
            .tree
            .read()
            .sheets
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.sheet.text().to_string())
    }

    /// How many times sheet `id` has been written (0 when absent).
    pub fn stylesheet_revision(&self, id: &str) -> u64 {
        self.shared
            .tree
            .read()
            .sheets
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.revision)
            .unwrap_or(0)
    }

    /// Subscribes to child-list changes under `target` (subtree).
    pub fn observe(&self, target: NodeId) -> MutationObserver {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(self.shared.next_handle.fetch_add(1, Ordering::Relaxed));
        self.shared
            .observers
            .lock()
            .push(ObserverEntry { id, target, tx });
        MutationObserver::new(id, target, rx, Arc::downgrade(&self.shared))
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.lock().len()
    }

    fn notify(&self, tree: &Tree, records: Vec<MutationRecord>) {
        let mut observers = self.shared.observers.lock();
        observers.retain(|entry| !entry.tx.is_closed());
        for record in records {
            for entry in observers.iter() {
                if tree.is_inclusive_ancestor(entry.target, record.target) {
                    trace!(observer = entry.id.0, target = %record.target, "mutation delivered");
                    let _ = entry.tx.send(record.clone());
                }
            }
        }
    }

    pub fn add_pointer_listener(&self, capture: bool, callback: PointerListener) -> ListenerId {
        let id = ListenerId(self.shared.next_handle.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().push(ListenerEntry {
            id,
            capture,
            callback,
        });
        id
    }

    pub fn remove_pointer_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn pointer_listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.shared.tree.read().hovered
    }

    /// Moves the pointer onto `node`.
    pub fn pointer_over(&self, node: NodeId) -> Result<(), DocumentError> {
        let previous = {
            let mut tree = self.shared.tree.write();
            if !tree.nodes.contains_key(&node) {
                return Err(DocumentError::NodeNotFound(node));
            }
            tree.hovered.replace(node)
        };
        if let Some(previous) = previous.filter(|p| *p != node) {
            self.dispatch(PointerEvent {
                kind: PointerKind::Out,
                target: previous,
            });
        }
        self.dispatch(PointerEvent {
            kind: PointerKind::Over,
            target: node,
        });
        Ok(())
    }

    /// Moves the pointer off the document.
    pub fn pointer_out(&self) {
        let previous = self.shared.tree.write().hovered.take();
        if let Some(target) = previous {
            self.dispatch(PointerEvent {
                kind: PointerKind::Out,
                target,
            });
        }
    }

    fn dispatch(&self, event: PointerEvent) {
        let mut callbacks: Vec<(bool, PointerListener)> = self
            .shared
            .listeners
            .lock()
            .iter()
            .map(|l| (l.capture, l.callback.clone()))
            .collect();
        // capture listeners run before bubble listeners
        callbacks.sort_by_key(|(capture, _)| !*capture);
        for (_, callback) in callbacks {
            callback(&event);
        }
    }
}
