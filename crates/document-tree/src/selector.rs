//! Minimal CSS selector engine.
//!
//! Supports the subset the overlay engine and its stylesheets rely on: type,
//! universal, `#id`, `.class`, attribute presence and `=`, `~=`, `^=`, `*=`
//! comparisons, `:hover`, `:not(...)` (with complex arguments), and the
//! descendant / child combinators. Selector lists are comma separated.

use std::fmt;

use thiserror::Error;

use crate::NodeId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected '{found}' at offset {offset} in `{selector}`")]
    Unexpected {
        selector: String,
        offset: usize,
        found: char,
    },
    #[error("unexpected end of selector `{0}`")]
    UnexpectedEnd(String),
    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),
}

/// Read-only view over element nodes used while matching.
pub trait Subject {
    fn local_name(&self, node: NodeId) -> Option<&str>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
    fn is_hovered(&self, node: NodeId) -> bool;

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|value| value.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// `(ids, classes/attributes/pseudo-classes, types)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl std::ops::Add for Specificity {
    type Output = Specificity;

    fn add(self, rhs: Self) -> Self::Output {
        Specificity(self.0 + rhs.0, self.1 + rhs.1, self.2 + rhs.2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Contains,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        test: Option<(AttrOp, String)>,
    },
    Hover,
    Not(Vec<Complex>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    simples: Vec<Simple>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// Parsed selector list; keeps its source text for serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut parser = Parser::new(trimmed);
        let alternatives = parser.selector_list()?;
        Ok(Self {
            source: trimmed.to_string(),
            alternatives,
        })
    }

    /// Joins several selectors into one list, e.g. for a combined query.
    pub fn union<'a>(selectors: impl IntoIterator<Item = &'a Selector>) -> Option<Selector> {
        let mut source = String::new();
        let mut alternatives = Vec::new();
        for selector in selectors {
            if !source.is_empty() {
                source.push_str(", ");
            }
            source.push_str(&selector.source);
            alternatives.extend(selector.alternatives.iter().cloned());
        }
        if alternatives.is_empty() {
            None
        } else {
            Some(Selector {
                source,
                alternatives,
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches<S: Subject + ?Sized>(&self, subject: &S, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches(subject, node))
    }

    /// Highest specificity among the alternatives that match `node`.
    pub fn match_specificity<S: Subject + ?Sized>(
        &self,
        subject: &S,
        node: NodeId,
    ) -> Option<Specificity> {
        self.alternatives
            .iter()
            .filter(|complex| complex.matches(subject, node))
            .map(Complex::specificity)
            .max()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Complex {
    fn matches<S: Subject + ?Sized>(&self, subject: &S, node: NodeId) -> bool {
        self.match_at(subject, node, self.parts.len() - 1)
    }

    fn match_at<S: Subject + ?Sized>(&self, subject: &S, node: NodeId, index: usize) -> bool {
        if !self.parts[index].matches(subject, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => subject
                .parent_element(node)
                .map(|parent| self.match_at(subject, parent, index - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut current = subject.parent_element(node);
                while let Some(ancestor) = current {
                    if self.match_at(subject, ancestor, index - 1) {
                        return true;
                    }
                    current = subject.parent_element(ancestor);
                }
                false
            }
        }
    }

    fn specificity(&self) -> Specificity {
        self.parts
            .iter()
            .fold(Specificity::default(), |acc, part| acc + part.specificity())
    }
}

impl Compound {
    fn matches<S: Subject + ?Sized>(&self, subject: &S, node: NodeId) -> bool {
        let Some(name) = subject.local_name(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(name) {
                return false;
            }
        }
        self.simples.iter().all(|simple| match simple {
            Simple::Id(id) => subject.attribute(node, "id") == Some(id.as_str()),
            Simple::Class(class) => subject.has_class(node, class),
            Simple::Attribute { name, test } => match (subject.attribute(node, name), test) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some((op, expected))) => attr_test(*op, actual, expected),
            },
            Simple::Hover => subject.is_hovered(node),
            Simple::Not(inner) => !inner.iter().any(|c| c.matches(subject, node)),
        })
    }

    fn specificity(&self) -> Specificity {
        let mut spec = Specificity(0, 0, u32::from(self.tag.is_some()));
        for simple in &self.simples {
            spec = spec
                + match simple {
                    Simple::Id(_) => Specificity(1, 0, 0),
                    Simple::Class(_) | Simple::Attribute { .. } | Simple::Hover => {
                        Specificity(0, 1, 0)
                    }
                    Simple::Not(inner) => inner
                        .iter()
                        .map(Complex::specificity)
                        .max()
                        .unwrap_or_default(),
                };
        }
        spec
    }
}

fn attr_test(op: AttrOp, actual: &str, expected: &str) -> bool {
    match op {
        AttrOp::Equals => actual == expected,
        AttrOp::Includes => actual.split_ascii_whitespace().any(|w| w == expected),
        AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
        AttrOp::Contains => !expected.is_empty() && actual.contains(expected),
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                selector: self.source.to_string(),
                offset: self.pos,
                found,
            },
            None => SelectorError::UnexpectedEnd(self.source.to_string()),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn selector_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.complex()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                None => return Ok(list),
                Some(_) => return Err(self.unexpected()),
            }
        }
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(',') | Some(')') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            combinators.push(combinator);
            parts.push(self.compound()?);
        }
        Ok(Complex { parts, combinators })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                universal = true;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.simples.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.simples.push(Simple::Class(self.ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    compound.simples.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.simples.push(self.pseudo()?);
                }
                _ => break,
            }
        }
        if compound.tag.is_none() && compound.simples.is_empty() && !universal {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<Simple, SelectorError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(Simple::Attribute { name, test: None });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c @ ('~' | '^' | '*')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    _ => AttrOp::Contains,
                }
            }
            _ => return Err(self.unexpected()),
        };
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => return Err(SelectorError::UnexpectedEnd(self.source.into())),
                    }
                }
                value
            }
            _ => self.ident()?,
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(Simple::Attribute {
            name,
            test: Some((op, value)),
        })
    }

    fn pseudo(&mut self) -> Result<Simple, SelectorError> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "hover" => Ok(Simple::Hover),
            "not" => {
                self.expect('(')?;
                let mut inner = Vec::new();
                loop {
                    self.skip_ws();
                    inner.push(self.complex()?);
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(')') => {
                            self.pos += 1;
                            break;
                        }
                        _ => return Err(self.unexpected()),
                    }
                }
                Ok(Simple::Not(inner))
            }
            _ => Err(SelectorError::UnsupportedPseudo(name)),
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
