//! Node arena plus cascade resolution.

use std::collections::{BTreeMap, HashMap};

use crate::selector::{Selector, Specificity, Subject};
use crate::style::{parse_declarations, ComputedStyle, StyleSheet};
use crate::NodeId;

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub(crate) struct InstalledSheet {
    pub id: String,
    pub sheet: StyleSheet,
    pub revision: u64,
}

#[derive(Debug)]
pub(crate) struct Tree {
    pub nodes: HashMap<NodeId, Node>,
    pub root: NodeId,
    pub next_id: u64,
    pub hovered: Option<NodeId>,
    pub sheets: Vec<InstalledSheet>,
}

/// Cascade rank: important author > inline > normal author, then
/// specificity, then source order.
type Rank = (u8, Specificity, usize, usize);

impl Tree {
    pub fn new(root_tag: &str) -> Self {
        let root = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                tag: root_tag.to_ascii_lowercase(),
                attributes: BTreeMap::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            root,
            next_id: 2,
            hovered: None,
            sheets: Vec::new(),
        }
    }

    pub fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                attributes: BTreeMap::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Unlinks `node` from its parent; returns the former parent.
    pub fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
        Some(parent)
    }

    /// Drops `node` and its subtree from the arena.
    pub fn purge(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                stack.extend(removed.children);
            }
            if self.hovered == Some(id) {
                self.hovered = None;
            }
        }
    }

    /// Descendants of `scope` (exclusive) in document order.
    pub fn descendants(&self, scope: NodeId) -> Descendants<'_> {
        let mut stack = Vec::new();
        if let Some(node) = self.nodes.get(&scope) {
            stack.extend(node.children.iter().rev().copied());
        }
        Descendants { tree: self, stack }
    }

    pub fn inline_value(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.nodes.get(&node)?.attributes.get("style")?;
        parse_declarations(style)
            .into_iter()
            .rev()
            .find(|decl| decl.property == property)
            .map(|decl| decl.value)
    }

    fn cascaded(&self, node: NodeId, property: &str) -> Option<String> {
        let mut best: Option<(Rank, String)> = None;
        let mut consider = |rank: Rank, value: &str| {
            if best.as_ref().map(|(r, _)| rank >= *r).unwrap_or(true) {
                best = Some((rank, value.to_string()));
            }
        };
        if let Some(value) = self.inline_value(node, property) {
            consider((1, Specificity::default(), 0, 0), &value);
        }
        for (sheet_idx, installed) in self.sheets.iter().enumerate() {
            for (rule_idx, rule) in installed.sheet.rules().iter().enumerate() {
                let Some(spec) = rule.selector.match_specificity(self, node) else {
                    continue;
                };
                for decl in rule.declarations.iter().filter(|d| d.property == property) {
                    let level = if decl.important { 2 } else { 0 };
                    consider((level, spec, sheet_idx, rule_idx), &decl.value);
                }
            }
        }
        best.map(|(_, value)| value)
    }

    pub fn computed_style(&self, node: NodeId) -> Option<ComputedStyle> {
        let data = self.nodes.get(&node)?;
        let display = self.cascaded(node, "display").unwrap_or_else(|| {
            if data.attributes.contains_key("hidden") {
                "none".to_string()
            } else {
                "block".to_string()
            }
        });
        let visibility = self.inherited(node, "visibility", "visible");
        let pointer_events = self.inherited(node, "pointer-events", "auto");
        let opacity = self
            .cascaded(node, "opacity")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        Some(ComputedStyle {
            display,
            visibility,
            opacity,
            pointer_events,
        })
    }

    fn inherited(&self, node: NodeId, property: &str, initial: &str) -> String {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.cascaded(id, property) {
                Some(value) if value != "inherit" => return value,
                _ => current = self.nodes.get(&id).and_then(|n| n.parent),
            }
        }
        initial.to_string()
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        selector.matches(self, node)
    }
}

impl Subject for Tree {
    fn local_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }

    fn is_hovered(&self, node: NodeId) -> bool {
        self.hovered
            .map(|hovered| self.is_inclusive_ancestor(node, hovered))
            .unwrap_or(false)
    }
}

pub(crate) struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.tree.nodes.get(&id) {
            self.stack.extend(node.children.iter().rev().copied());
        }
        Some(id)
    }
}
