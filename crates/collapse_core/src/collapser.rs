//! The collapse driver: selection, propagation, backtracking.
//!
//! The `Collapser` owns all mutable generation state (map, history, removal
//! queue, work area, RNG) and runs the main loop: pick the lowest-entropy
//! slot, collapse it to a weighted-random candidate, propagate removals
//! through the support counters, and answer contradictions by rewinding
//! history with a geometrically growing undo window.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use fxhash::FxHashSet;
use glam::IVec3;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::direction::{direction_between, opposite, DIRECTION_COUNT, OFFSETS};
use crate::history::{History, HistoryItem, DEFAULT_HISTORY_CAPACITY};
use crate::map::{BoundaryConstraint, ConstraintMode, SlotMap};
use crate::module_set::ModuleSet;
use crate::removal_queue::RemovalQueue;
use crate::rng::WfcRng;

/// How many selections pass between progress-observer polls.
const PROGRESS_INTERVAL: usize = 20;

/// Error type for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollapseError {
    /// Propagation emptied the candidate set at this position. Handled by
    /// backtracking inside [`Collapser::collapse`]; surfaces verbatim from
    /// constraint application and explicit [`Collapser::collapse_into`]
    /// calls.
    Contradiction(IVec3),
    /// A contradiction occurred with no history left to unwind.
    GenerationFailed,
    /// The progress observer requested cancellation.
    Cancelled,
}

impl fmt::Display for CollapseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseError::Contradiction(position) => {
                write!(f, "no candidates remain at {:?}", position)
            }
            CollapseError::GenerationFailed => {
                write!(f, "generation failed: no history left to backtrack into")
            }
            CollapseError::Cancelled => write!(f, "generation cancelled by observer"),
        }
    }
}

impl std::error::Error for CollapseError {}

/// Host callbacks, all optional.
pub trait CollapseObserver {
    /// Polled roughly every twenty selections with the work-area size and
    /// the size it started at. Return true to cancel the run.
    fn on_progress(&mut self, remaining: usize, total: usize) -> bool {
        let _ = (remaining, total);
        false
    }

    /// Propagation wanted to cross into a cell beyond the map's range limit.
    fn on_hit_range_limit(&mut self, position: IVec3, blocked: &ModuleSet) {
        let _ = (position, blocked);
    }

    /// A slot has collapsed and is ready for downstream instantiation.
    fn on_build_ready(&mut self, position: IVec3, module: usize) {
        let _ = (position, module);
    }
}

struct NullObserver;

impl CollapseObserver for NullObserver {}

/// Entropy-driven collapse driver over a [`SlotMap`].
pub struct Collapser<M: SlotMap> {
    map: M,
    catalog: Arc<Catalog>,
    history: History,
    queue: RemovalQueue,
    work_area: FxHashSet<IVec3>,
    build_queue: VecDeque<IVec3>,
    rng: Box<dyn WfcRng>,
    observer: Box<dyn CollapseObserver>,
    /// Highest lifetime push count seen at a contradiction.
    barrier: u64,
    /// Steps the next backtrack will unwind.
    amount: u32,
}

impl<M: SlotMap> Collapser<M> {
    pub fn new(map: M, catalog: Arc<Catalog>, rng: Box<dyn WfcRng>) -> Self {
        Self::with_history_capacity(map, catalog, rng, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(
        map: M,
        catalog: Arc<Catalog>,
        rng: Box<dyn WfcRng>,
        capacity: usize,
    ) -> Self {
        let queue = RemovalQueue::new(catalog.len());
        Self {
            map,
            catalog,
            history: History::new(capacity),
            queue,
            work_area: FxHashSet::default(),
            build_queue: VecDeque::new(),
            rng,
            observer: Box::new(NullObserver),
            barrier: 0,
            amount: 2,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn CollapseObserver>) {
        self.observer = observer;
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    #[cfg(test)]
    pub(crate) fn backtrack_state(&self) -> (u64, u32) {
        (self.barrier, self.amount)
    }

    /// Collapse every cell of the box `[origin, origin + size)`.
    pub fn collapse_area(&mut self, origin: IVec3, size: IVec3) -> Result<(), CollapseError> {
        let mut targets = Vec::new();
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    targets.push(origin + IVec3::new(x, y, z));
                }
            }
        }
        self.collapse(targets)
    }

    /// Collapse the given cells, lowest entropy first, backtracking through
    /// contradictions until every target (plus anything undo re-opened) is
    /// decided.
    pub fn collapse<I>(&mut self, targets: I) -> Result<(), CollapseError>
    where
        I: IntoIterator<Item = IVec3>,
    {
        self.queue.clear();
        self.work_area.clear();
        for position in targets {
            if let Some(slot) = self.map.get_slot_mut(position, true) {
                if !slot.is_collapsed() && !slot.is_forgotten() {
                    self.work_area.insert(position);
                }
            }
        }

        let total = self.work_area.len();
        let mut selections = 0usize;
        while !self.work_area.is_empty() {
            if selections % PROGRESS_INTERVAL == 0
                && self.observer.on_progress(self.work_area.len(), total)
            {
                self.queue.clear();
                return Err(CollapseError::Cancelled);
            }
            selections += 1;

            let Some(selected) = self.min_entropy_slot() else {
                break;
            };
            match self.collapse_random(selected) {
                Ok(()) => self.flush_build_queue(),
                Err(CollapseError::Contradiction(position)) => {
                    self.queue.clear();
                    if self.history.is_empty() {
                        debug!(position = ?position, "contradiction with empty history");
                        return Err(CollapseError::GenerationFailed);
                    }
                    if self.history.total_pushes() > self.barrier {
                        self.barrier = self.history.total_pushes();
                        self.amount = 2;
                    } else {
                        self.amount = self.amount.saturating_mul(2);
                    }
                    debug!(position = ?position, steps = self.amount, "backtracking");
                    self.undo(self.amount);
                }
                Err(other) => return Err(other),
            }
        }
        self.flush_build_queue();
        Ok(())
    }

    /// Collapse the slot at `position` to `module`.
    ///
    /// # Panics
    /// Panics if there is no slot at `position`, the slot is already
    /// collapsed or forgotten, `module` is not among its candidates, or a
    /// collapsed neighbor does not admit `module`. These indicate driver
    /// bugs or calls outside the documented contract, not recoverable
    /// contradictions.
    pub fn collapse_into(&mut self, position: IVec3, module: usize) -> Result<(), CollapseError> {
        let rest = {
            let slot = self
                .map
                .get_slot_mut(position, true)
                .unwrap_or_else(|| panic!("illegal collapse: no slot at {:?}", position));
            assert!(
                !slot.is_collapsed(),
                "illegal collapse: slot at {:?} is already collapsed",
                position
            );
            let candidates = slot
                .modules()
                .unwrap_or_else(|| panic!("illegal collapse: slot at {:?} is forgotten", position));
            assert!(
                candidates.contains(module),
                "illegal collapse: module {} is not a candidate at {:?}",
                module,
                position
            );
            let mut rest = candidates.clone();
            rest.remove(module);
            rest
        };
        for direction in 0..DIRECTION_COUNT {
            if let Some(neighbor) = self.map.get_slot(position + OFFSETS[direction]) {
                if let Some(chosen) = neighbor.module() {
                    assert!(
                        self.catalog
                            .possible_neighbors(chosen, opposite(direction))
                            .contains(module),
                        "illegal collapse: module {} at {:?} contradicts collapsed neighbor",
                        module,
                        position
                    );
                }
            }
        }

        trace!(position = ?position, module, "collapsing");
        if let Some(evicted) = self.history.push(HistoryItem::new(position)) {
            let evicted_position = evicted.slot();
            trace!(position = ?evicted_position, "history full, forgetting slot");
            if let Some(slot) = self.map.get_slot_mut(evicted_position, false) {
                slot.forget();
            }
        }
        self.map
            .get_slot_mut(position, false)
            .expect("slot exists while collapsing")
            .set_module(module);
        self.remove_modules(position, rest, true)?;
        self.notify_collapsed(position);
        Ok(())
    }

    /// Weighted-random collapse of the slot at `position`.
    fn collapse_random(&mut self, position: IVec3) -> Result<(), CollapseError> {
        let weight_sum = match self.map.get_slot(position).and_then(|slot| slot.modules()) {
            Some(modules) if !modules.is_empty() => modules
                .iter()
                .map(|module| self.catalog.probability(module))
                .sum::<f64>(),
            _ => return Err(CollapseError::Contradiction(position)),
        };
        let roll = self.rng.next_double() * weight_sum;

        // First candidate whose partial weight sum reaches the roll; the
        // first candidate backstops any floating-point shortfall.
        let mut chosen = None;
        let mut fallback = None;
        let mut partial_sum = 0.0;
        let modules = self
            .map
            .get_slot(position)
            .and_then(|slot| slot.modules())
            .expect("candidates checked above");
        for module in modules.iter() {
            if fallback.is_none() {
                fallback = Some(module);
            }
            partial_sum += self.catalog.probability(module);
            if partial_sum >= roll {
                chosen = Some(module);
                break;
            }
        }
        let module = chosen
            .or(fallback)
            .expect("candidate set is non-empty");
        self.collapse_into(position, module)
    }

    /// Work-area slot with minimum entropy; first encountered wins ties.
    /// The scan order is a hash-set walk, so runs are reproducible only
    /// together with the map's insertion history.
    fn min_entropy_slot(&mut self) -> Option<IVec3> {
        let map = &mut self.map;
        let catalog = &self.catalog;
        let mut best: Option<(f64, IVec3)> = None;
        for &position in &self.work_area {
            let Some(slot) = map.get_slot_mut(position, false) else {
                continue;
            };
            let entropy = slot.entropy(catalog);
            let better = match best {
                Some((lowest, _)) => entropy < lowest,
                None => true,
            };
            if better {
                best = Some((entropy, position));
            }
        }
        best.map(|(_, position)| position)
    }

    /// Remove `to_remove` from the slot at `position`, weakening neighbor
    /// support counters and queueing follow-up removals for any neighbor
    /// candidate whose support just ran out. With `recursive`, drains the
    /// queue before returning.
    fn remove_modules(
        &mut self,
        position: IVec3,
        mut to_remove: ModuleSet,
        recursive: bool,
    ) -> Result<(), CollapseError> {
        {
            let Some(slot) = self.map.get_slot(position) else {
                return Ok(());
            };
            let Some(current) = slot.modules() else {
                return Ok(());
            };
            to_remove.intersect(current);
        }
        if to_remove.is_empty() {
            return Ok(());
        }
        if let Some(item) = self.history.peek_mut() {
            item.record(position, &to_remove);
        }

        let map = &mut self.map;
        let queue = &mut self.queue;
        let observer = &mut self.observer;
        let catalog = &self.catalog;
        for direction in 0..DIRECTION_COUNT {
            let neighbor_position = position + OFFSETS[direction];
            let inverse = opposite(direction);
            if map.over_range_limit(neighbor_position) {
                observer.on_hit_range_limit(neighbor_position, &to_remove);
                continue;
            }
            let Some(neighbor) = map.get_slot_mut(neighbor_position, true) else {
                continue;
            };
            if neighbor.is_forgotten() {
                continue;
            }
            for module in to_remove.iter() {
                for candidate in catalog.possible_neighbors(module, direction).iter() {
                    if neighbor.health(inverse, candidate) == 1
                        && neighbor.has_candidate(candidate)
                    {
                        queue.insert(neighbor_position, candidate);
                    }
                    neighbor.decrement_health(inverse, candidate);
                }
            }
        }

        let slot = map
            .get_slot_mut(position, false)
            .expect("slot exists while removing candidates");
        let modules = slot
            .modules_mut()
            .expect("slot is not forgotten while removing candidates");
        modules.difference(&to_remove);
        if modules.is_empty() {
            trace!(position = ?position, "candidate set emptied");
            return Err(CollapseError::Contradiction(position));
        }

        if recursive {
            self.drain_removal_queue()
        } else {
            Ok(())
        }
    }

    /// Apply queued removals in FIFO order; collapsed slots are skipped,
    /// their pending sets dropped.
    fn drain_removal_queue(&mut self) -> Result<(), CollapseError> {
        while let Some((position, pending)) = self.queue.pop() {
            let skip = match self.map.get_slot(position) {
                Some(slot) => slot.is_collapsed(),
                None => true,
            };
            if skip {
                continue;
            }
            self.remove_modules(position, pending, false)?;
        }
        Ok(())
    }

    /// Restore candidates removed earlier, re-strengthening neighbor
    /// support. Only undo calls this; propagation never runs here.
    fn add_modules(&mut self, position: IVec3, to_add: ModuleSet) {
        let map = &mut self.map;
        let catalog = &self.catalog;
        let (mut fresh, chosen) = {
            let Some(slot) = map.get_slot_mut(position, false) else {
                return;
            };
            let Some(current) = slot.modules() else {
                return;
            };
            let mut fresh = to_add;
            fresh.difference(current);
            (fresh, slot.module())
        };
        if let Some(module) = chosen {
            fresh.remove(module);
        }

        for module in fresh.iter() {
            for direction in 0..DIRECTION_COUNT {
                let Some(neighbor) = map.get_slot_mut(position + OFFSETS[direction], false)
                else {
                    continue;
                };
                if neighbor.is_forgotten() {
                    continue;
                }
                let inverse = opposite(direction);
                for candidate in catalog.possible_neighbors(module, direction).iter() {
                    neighbor.increment_health(inverse, candidate);
                }
            }
        }

        let slot = map
            .get_slot_mut(position, false)
            .expect("slot exists while restoring candidates");
        let modules = slot
            .modules_mut()
            .expect("slot is not forgotten while restoring candidates");
        modules.union(&fresh);
        let has_candidates = !modules.is_empty();
        let uncollapsed = slot.is_collapsed() && has_candidates;
        if uncollapsed {
            slot.clear_module();
            self.notify_collapse_undone(position);
        }
    }

    /// Rewind up to `steps` collapse records, restoring every candidate
    /// they removed. Forgotten slots stay as they are.
    pub fn undo(&mut self, steps: u32) {
        let mut remaining = steps;
        while remaining > 0 {
            let Some(item) = self.history.pop() else {
                break;
            };
            let (slot_position, removed) = item.into_parts();
            trace!(position = ?slot_position, "undoing collapse");
            for (position, set) in removed {
                self.add_modules(position, set);
            }
            if let Some(slot) = self.map.get_slot_mut(slot_position, false) {
                if !slot.is_forgotten() {
                    slot.clear_module();
                }
            }
            self.notify_collapse_undone(slot_position);
            remaining -= 1;
        }
        if self.history.is_empty() {
            self.barrier = 0;
        }
    }

    /// Apply authored boundary conditions; call before collapsing the area
    /// they touch.
    pub fn apply_boundary_constraints(
        &mut self,
        constraints: &[BoundaryConstraint],
    ) -> Result<(), CollapseError> {
        for constraint in constraints {
            match constraint.mode {
                ConstraintMode::Enforce => self.enforce_connector(
                    constraint.position,
                    constraint.direction,
                    constraint.connector,
                )?,
                ConstraintMode::Exclude => self.exclude_connector(
                    constraint.position,
                    constraint.direction,
                    constraint.connector,
                )?,
            }
        }
        Ok(())
    }

    /// Keep only candidates whose face on `direction` carries `connector`.
    pub fn enforce_connector(
        &mut self,
        position: IVec3,
        direction: usize,
        connector: u32,
    ) -> Result<(), CollapseError> {
        self.filter_connector(position, direction, connector, true)
    }

    /// Drop candidates whose face on `direction` carries `connector`.
    pub fn exclude_connector(
        &mut self,
        position: IVec3,
        direction: usize,
        connector: u32,
    ) -> Result<(), CollapseError> {
        self.filter_connector(position, direction, connector, false)
    }

    fn filter_connector(
        &mut self,
        position: IVec3,
        direction: usize,
        connector: u32,
        keep_matching: bool,
    ) -> Result<(), CollapseError> {
        let to_remove = {
            let Some(slot) = self.map.get_slot_mut(position, true) else {
                return Ok(());
            };
            let Some(current) = slot.modules() else {
                return Ok(());
            };
            let mut to_remove = ModuleSet::empty(self.catalog.len());
            for module in current.iter() {
                let matches =
                    self.catalog.module(module).faces[direction].connector == connector;
                if matches != keep_matching {
                    to_remove.add(module);
                }
            }
            to_remove
        };
        self.remove_modules(position, to_remove, true)
    }

    /// Drop candidates whose face on `direction` is not walkable.
    pub fn enforce_walkway(
        &mut self,
        position: IVec3,
        direction: usize,
    ) -> Result<(), CollapseError> {
        let to_remove = {
            let Some(slot) = self.map.get_slot_mut(position, true) else {
                return Ok(());
            };
            let Some(current) = slot.modules() else {
                return Ok(());
            };
            let mut to_remove = ModuleSet::empty(self.catalog.len());
            for module in current.iter() {
                if !self.catalog.module(module).faces[direction].walkable {
                    to_remove.add(module);
                }
            }
            to_remove
        };
        self.remove_modules(position, to_remove, true)
    }

    /// Walkway across the shared face of two adjacent cells.
    ///
    /// # Panics
    /// Panics if `a` and `b` are not lattice neighbors.
    pub fn enforce_walkway_between(
        &mut self,
        a: IVec3,
        b: IVec3,
    ) -> Result<(), CollapseError> {
        let direction = direction_between(a, b)
            .unwrap_or_else(|| panic!("{:?} and {:?} are not lattice neighbors", a, b));
        self.enforce_walkway(a, direction)?;
        self.enforce_walkway(b, opposite(direction))
    }

    fn notify_collapsed(&mut self, position: IVec3) {
        self.work_area.remove(&position);
        self.build_queue.push_back(position);
    }

    fn notify_collapse_undone(&mut self, position: IVec3) {
        self.work_area.insert(position);
        self.build_queue.retain(|queued| *queued != position);
    }

    fn flush_build_queue(&mut self) {
        while let Some(position) = self.build_queue.pop_front() {
            let Some(module) = self.map.get_slot(position).and_then(|slot| slot.module())
            else {
                continue;
            };
            self.observer.on_build_ready(position, module);
        }
    }
}
