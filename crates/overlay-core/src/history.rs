//! Linear undo/redo over element store snapshots

use crate::model::Element;
use std::sync::Arc;

/// Immutable copy of the store's elements at a commit point.
///
/// Cloning is cheap; the element list is shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    elements: Arc<[Element]>,
}

impl HistorySnapshot {
    pub fn new(elements: Arc<[Element]>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

/// Ordered snapshots plus a cursor. Entry 0 is the state before any commit.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    snapshots: Vec<HistorySnapshot>,
    index: usize,
    limit: Option<usize>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistorySnapshot::default())
    }
}

impl HistoryManager {
    pub fn new(initial: HistorySnapshot) -> Self {
        Self {
            snapshots: vec![initial],
            index: 0,
            limit: None,
        }
    }

    /// Keep at most `limit` undo steps; the oldest are dropped first
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self
    }

    /// Record a new state. Anything past the cursor (the redo branch) is dropped.
    pub fn commit(&mut self, snapshot: HistorySnapshot) {
        self.snapshots.truncate(self.index + 1);
        self.snapshots.push(snapshot);
        self.index = self.snapshots.len() - 1;

        if let Some(limit) = self.limit {
            let excess = self.snapshots.len().saturating_sub(limit + 1);
            if excess > 0 {
                self.snapshots.drain(..excess);
                self.index -= excess;
            }
        }
    }

    /// Step back, returning the state to restore
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.snapshots.get(self.index)
    }

    /// Step forward again after an undo
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if self.index + 1 >= self.snapshots.len() {
            return None;
        }
        self.index += 1;
        self.snapshots.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    pub fn current(&self) -> &HistorySnapshot {
        &self.snapshots[self.index]
    }

    /// Number of commits that can be undone
    pub fn undo_depth(&self) -> usize {
        self.index
    }
}
