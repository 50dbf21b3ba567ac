//! In-process host document for the overlay dimmer.
//!
//! A small DOM model: id-addressed element arena, a selector engine, author
//! stylesheets with a cascade that resolves effective opacity, child-list
//! mutation observers, and pointer event dispatch.

pub mod document;
pub mod errors;
pub mod events;
pub mod fixture;
pub mod mutation;
pub mod selector;
pub mod style;

mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use document::Document;
pub use errors::DocumentError;
pub use events::{ListenerId, PointerEvent, PointerKind, PointerListener};
pub use fixture::{DocumentFixture, MutationOp, MutationStep, NodeSpec};
pub use mutation::{MutationObserver, MutationRecord};
pub use selector::{Selector, SelectorError};
pub use style::ComputedStyle;

/// Opaque element handle, comparable to a CDP backend node id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}
