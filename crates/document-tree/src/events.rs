//! Pointer events delivered to document-level listeners.

use std::sync::Arc;

use crate::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Over,
    Out,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub target: NodeId,
}

pub type PointerListener = Arc<dyn Fn(&PointerEvent) + Send + Sync>;
