//! Inline declarations and author stylesheets.

use serde::{Deserialize, Serialize};

use crate::selector::{Selector, SelectorError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Splits a `style` attribute (or rule body) into declarations.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    text.split(';')
        .filter_map(|chunk| {
            let (property, value) = chunk.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim().to_string();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            let important = match value.to_ascii_lowercase().rfind("!important") {
                Some(idx) => {
                    value.truncate(idx);
                    value = value.trim_end().to_string();
                    true
                }
                None => false,
            };
            Some(Declaration {
                property,
                value,
                important,
            })
        })
        .collect()
}

/// Serializes declarations back into `style` attribute form.
pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|decl| {
            if decl.important {
                format!("{}: {} !important;", decl.property, decl.value)
            } else {
                format!("{}: {};", decl.property, decl.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug)]
pub struct StyleRule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
}

/// Parsed author stylesheet; keeps the exact text it was built from.
#[derive(Clone, Debug)]
pub struct StyleSheet {
    text: String,
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let stripped = strip_comments(text);
        let mut rules = Vec::new();
        for block in stripped.split('}') {
            let Some((prelude, body)) = block.split_once('{') else {
                continue;
            };
            if prelude.trim().is_empty() {
                continue;
            }
            let selector = Selector::parse(prelude)?;
            rules.push(StyleRule {
                selector,
                declarations: parse_declarations(body),
            });
        }
        Ok(Self {
            text: text.to_string(),
            rules,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolved style for one element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub pointer_events: String,
}

impl ComputedStyle {
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden"
    }
}
