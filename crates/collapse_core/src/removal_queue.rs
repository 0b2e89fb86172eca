//! Pending-removal worklist for constraint propagation.

use std::collections::hash_map::Entry;
use std::collections::VecDeque;

use fxhash::FxHashMap;
use glam::IVec3;

use crate::module_set::ModuleSet;

/// FIFO worklist of positions with pending candidate removals.
///
/// Insertions for a position already queued union into its pending set
/// without changing its place in line; positions drain in first-insertion
/// order.
#[derive(Debug)]
pub struct RemovalQueue {
    universe: usize,
    order: VecDeque<IVec3>,
    pending: FxHashMap<IVec3, ModuleSet>,
}

impl RemovalQueue {
    pub fn new(universe: usize) -> Self {
        Self {
            universe,
            order: VecDeque::new(),
            pending: FxHashMap::default(),
        }
    }

    /// Queue `module` for removal at `position`.
    pub fn insert(&mut self, position: IVec3, module: usize) {
        match self.pending.entry(position) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().add(module);
            }
            Entry::Vacant(entry) => {
                let mut set = ModuleSet::empty(self.universe);
                set.add(module);
                entry.insert(set);
                self.order.push_back(position);
            }
        }
    }

    /// Dequeue the oldest position with its accumulated set.
    pub fn pop(&mut self) -> Option<(IVec3, ModuleSet)> {
        let position = self.order.pop_front()?;
        let set = self
            .pending
            .remove(&position)
            .expect("pending set exists for every queued position");
        Some((position, set))
    }

    /// Drop all pending work.
    pub fn clear(&mut self) {
        self.order.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drains_in_insertion_order() {
        let mut queue = RemovalQueue::new(4);
        queue.insert(IVec3::new(2, 0, 0), 1);
        queue.insert(IVec3::new(0, 0, 0), 0);
        queue.insert(IVec3::new(1, 0, 0), 3);
        let order: Vec<IVec3> = std::iter::from_fn(|| queue.pop().map(|(p, _)| p)).collect();
        assert_eq!(
            order,
            vec![
                IVec3::new(2, 0, 0),
                IVec3::new(0, 0, 0),
                IVec3::new(1, 0, 0)
            ]
        );
    }

    #[test]
    fn test_same_position_accumulates() {
        let mut queue = RemovalQueue::new(4);
        let position = IVec3::new(1, 2, 3);
        queue.insert(position, 0);
        queue.insert(position, 2);
        queue.insert(position, 2);
        assert_eq!(queue.len(), 1);
        let (popped, set) = queue.pop().unwrap();
        assert_eq!(popped, position);
        assert_eq!(set, ModuleSet::from_modules(4, &[0, 2]));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_discards_pending_work() {
        let mut queue = RemovalQueue::new(4);
        queue.insert(IVec3::ZERO, 1);
        queue.insert(IVec3::ONE, 2);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }
}
