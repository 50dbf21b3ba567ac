//! Child-list mutation observation.

use std::sync::Weak;

use tokio::sync::mpsc;

use crate::document::Shared;
use crate::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// One child-list change, reported against the parent that changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub(crate) fn added(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added: vec![node],
            removed: Vec::new(),
        }
    }

    pub(crate) fn removed(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added: Vec::new(),
            removed: vec![node],
        }
    }
}

/// Receives records for a subtree until disconnected or dropped.
pub struct MutationObserver {
    id: ObserverId,
    target: NodeId,
    rx: mpsc::UnboundedReceiver<MutationRecord>,
    document: Weak<Shared>,
}

impl MutationObserver {
    pub(crate) fn new(
        id: ObserverId,
        target: NodeId,
        rx: mpsc::UnboundedReceiver<MutationRecord>,
        document: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            target,
            rx,
            document,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Waits for the next record, then drains whatever else is already queued.
    ///
    /// Returns `None` once the document is gone or the observer disconnected.
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        Some(batch)
    }

    /// Non-blocking drain of queued records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        let mut batch = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        batch
    }

    pub fn disconnect(&mut self) {
        if let Some(shared) = self.document.upgrade() {
            shared.disconnect(self.id);
        }
        self.rx.close();
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationObserver")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish()
    }
}
