//! Bounded ring of collapse records for backtracking.

use std::collections::VecDeque;

use fxhash::FxHashMap;
use glam::IVec3;

use crate::module_set::ModuleSet;

/// Default number of collapse records kept for undo.
pub const DEFAULT_HISTORY_CAPACITY: usize = 3000;

/// Record of one collapse: the target slot and every candidate removed
/// anywhere in the lattice while that collapse propagated.
#[derive(Debug, Clone)]
pub struct HistoryItem {
    slot: IVec3,
    removed: FxHashMap<IVec3, ModuleSet>,
}

impl HistoryItem {
    pub fn new(slot: IVec3) -> Self {
        Self {
            slot,
            removed: FxHashMap::default(),
        }
    }

    /// Position of the collapse target.
    pub fn slot(&self) -> IVec3 {
        self.slot
    }

    /// Removed candidates per position.
    pub fn removed(&self) -> &FxHashMap<IVec3, ModuleSet> {
        &self.removed
    }

    /// Merge `removed` into the record for `position`.
    pub(crate) fn record(&mut self, position: IVec3, removed: &ModuleSet) {
        self.removed
            .entry(position)
            .and_modify(|set| set.union(removed))
            .or_insert_with(|| removed.clone());
    }

    pub(crate) fn into_parts(self) -> (IVec3, FxHashMap<IVec3, ModuleSet>) {
        (self.slot, self.removed)
    }
}

/// FIFO-evicting ring of [`HistoryItem`]s with stack-style access on the
/// newest end, used by undo.
///
/// Eviction returns the dropped item so the caller can forget its slot —
/// forgetting on overflow is part of the correctness contract, not a
/// convenience.
#[derive(Debug)]
pub struct History {
    items: VecDeque<HistoryItem>,
    capacity: usize,
    total_pushes: u64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be at least 1");
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
            total_pushes: 0,
        }
    }

    /// Push a new record; returns the evicted oldest record when full.
    #[must_use = "the evicted item's slot must be forgotten"]
    pub fn push(&mut self, item: HistoryItem) -> Option<HistoryItem> {
        self.total_pushes += 1;
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Pop the newest record.
    pub fn pop(&mut self) -> Option<HistoryItem> {
        self.items.pop_back()
    }

    /// Newest record, if any.
    pub fn peek(&self) -> Option<&HistoryItem> {
        self.items.back()
    }

    pub(crate) fn peek_mut(&mut self) -> Option<&mut HistoryItem> {
        self.items.back_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime number of pushes; monotonic, unaffected by pop and eviction.
    pub fn total_pushes(&self) -> u64 {
        self.total_pushes
    }
}
