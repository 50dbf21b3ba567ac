//! Declarative document fixtures (YAML or JSON) with a mutation timeline.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DocumentError;
use crate::selector::Selector;
use crate::{Document, NodeId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOp {
    Append { parent: String, node: NodeSpec },
    Remove { target: String },
    SetAttribute {
        target: String,
        name: String,
        value: String,
    },
    RemoveAttribute { target: String, name: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MutationStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub op: MutationOp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentFixture {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
    #[serde(default)]
    pub mutations: Vec<MutationStep>,
}

impl DocumentFixture {
    pub fn build(&self) -> Result<Document, DocumentError> {
        let doc = Document::new();
        for spec in &self.body {
            let node = build_node(&doc, spec)?;
            doc.append_child(doc.body(), node)?;
        }
        Ok(doc)
    }

    /// Timeline steps ordered by `at_ms` (stable for equal offsets).
    pub fn timeline(&self) -> Vec<MutationStep> {
        let mut steps = self.mutations.clone();
        steps.sort_by_key(|step| step.at_ms);
        steps
    }
}

/// Creates a detached subtree for `spec` and returns its root.
pub fn build_node(doc: &Document, spec: &NodeSpec) -> Result<NodeId, DocumentError> {
    if spec.tag.trim().is_empty() {
        return Err(DocumentError::Fixture("node without tag".into()));
    }
    let node = doc.create_element(&spec.tag);
    for (name, value) in &spec.attrs {
        doc.set_attribute(node, name, value)?;
    }
    if let Some(id) = &spec.id {
        doc.set_attribute(node, "id", id)?;
    }
    for class in &spec.classes {
        doc.add_class(node, class)?;
    }
    if let Some(style) = &spec.style {
        doc.set_attribute(node, "style", style)?;
    }
    for child in &spec.children {
        let child = build_node(doc, child)?;
        doc.append_child(node, child)?;
    }
    Ok(node)
}

impl MutationStep {
    /// Applies the step; returns how many nodes it touched.
    pub fn apply(&self, doc: &Document) -> Result<usize, DocumentError> {
        let count = match &self.op {
            MutationOp::Append { parent, node } => {
                let selector = Selector::parse(parent)?;
                let Some(parent) = doc.query_selector(doc.root(), &selector) else {
                    return Err(DocumentError::Fixture(format!(
                        "no parent matches `{selector}`"
                    )));
                };
                let child = build_node(doc, node)?;
                doc.append_child(parent, child)?;
                1
            }
            MutationOp::Remove { target } => {
                let targets = doc.select(target)?;
                let mut removed = 0;
                for node in targets {
                    // an earlier removal may already have taken this one with it
                    if doc.contains(node) {
                        doc.remove(node)?;
                        removed += 1;
                    }
                }
                removed
            }
            MutationOp::SetAttribute {
                target,
                name,
                value,
            } => {
                let targets = doc.select(target)?;
                for node in &targets {
                    doc.set_attribute(*node, name, value)?;
                }
                targets.len()
            }
            MutationOp::RemoveAttribute { target, name } => {
                let targets = doc.select(target)?;
                for node in &targets {
                    doc.remove_attribute(*node, name)?;
                }
                targets.len()
            }
        };
        debug!(at_ms = self.at_ms, count, "fixture step applied");
        Ok(count)
    }
}

pub fn parse_fixture_str(raw: &str) -> Result<DocumentFixture, DocumentError> {
    match serde_json::from_str(raw) {
        Ok(fixture) => Ok(fixture),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            DocumentError::Fixture(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}

pub fn load_fixture_from_reader<R: Read>(mut reader: R) -> Result<DocumentFixture, DocumentError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_fixture_str(&buf)
}

pub fn load_fixture_from_path(path: impl AsRef<Path>) -> Result<DocumentFixture, DocumentError> {
    let file = File::open(path.as_ref())?;
    load_fixture_from_reader(file)
}
