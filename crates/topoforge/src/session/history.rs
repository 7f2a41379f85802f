//! Undo/redo over topology snapshots
//!
//! Entries are `Arc` clones of the store aggregate, so recording one is O(1)
//! and the copy only happens on the next mutation.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::Topology;

/// Default number of steps kept in each direction
pub const DEFAULT_DEPTH: usize = 100;

/// Bounded undo and redo stacks
#[derive(Debug, Clone)]
pub struct EditHistory {
    undo_stack: VecDeque<Arc<Topology>>,
    redo_stack: VecDeque<Arc<Topology>>,
    max_depth: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::with_depth(DEFAULT_DEPTH)
    }
}

impl EditHistory {
    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Record the state before a mutation. Clears the redo stack.
    pub fn record(&mut self, before: Arc<Topology>) {
        push_bounded(&mut self.undo_stack, before, self.max_depth);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Pop an undo entry, pushing `current` onto the redo stack
    pub fn undo(&mut self, current: Arc<Topology>) -> Option<Arc<Topology>> {
        let previous = self.undo_stack.pop_back()?;
        push_bounded(&mut self.redo_stack, current, self.max_depth);
        Some(previous)
    }

    /// Pop a redo entry, pushing `current` onto the undo stack
    pub fn redo(&mut self, current: Arc<Topology>) -> Option<Arc<Topology>> {
        let next = self.redo_stack.pop_back()?;
        push_bounded(&mut self.undo_stack, current, self.max_depth);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<Arc<Topology>>, entry: Arc<Topology>, max_depth: usize) {
    if stack.len() >= max_depth {
        stack.pop_front();
    }
    stack.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeviceKind, Position, TopologyStore};

    fn with_devices(count: usize) -> Arc<Topology> {
        let mut store = TopologyStore::new();
        for i in 0..count {
            store
                .add_device_from_template(DeviceKind::Switch, format!("sw{}", i), Position::default())
                .unwrap();
        }
        store.snapshot()
    }

    #[test]
    fn test_empty_history() {
        let history = EditHistory::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = EditHistory::default();
        history.record(with_devices(1));

        let restored = history.undo(with_devices(3)).unwrap();
        assert_eq!(restored.device_count(), 1);
        assert!(history.can_redo());

        let again = history.redo(restored).unwrap();
        assert_eq!(again.device_count(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = EditHistory::default();
        history.record(with_devices(0));
        history.undo(with_devices(1));
        history.record(with_devices(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = EditHistory::with_depth(2);
        for n in 0..4 {
            history.record(with_devices(n));
        }
        assert_eq!(history.undo_depth(), 2);
        // the two oldest entries were dropped
        assert_eq!(history.undo(with_devices(0)).unwrap().device_count(), 3);
        assert_eq!(history.undo(with_devices(0)).unwrap().device_count(), 2);
        assert!(history.undo(with_devices(0)).is_none());
    }
}
