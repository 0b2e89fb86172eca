//! One lattice cell: candidates, support counters, chosen module.

use glam::IVec3;

use crate::catalog::Catalog;
use crate::module_set::ModuleSet;

/// A single cell of the lattice.
///
/// Holds the still-admissible candidate set, the per-direction support
/// counters (`health[direction][module]`, stored flat), and the chosen
/// module once collapsed. A slot evicted from history is *forgotten*:
/// its candidate set and counters are released for good, it keeps only
/// its position and final module, and propagation treats it as absent.
#[derive(Debug, Clone)]
pub struct Slot {
    position: IVec3,
    module_count: usize,
    modules: Option<ModuleSet>,
    health: Option<Box<[i16]>>,
    module: Option<usize>,
}

impl Slot {
    /// Fresh slot with every candidate and the catalog's baseline support.
    pub fn full(position: IVec3, catalog: &Catalog) -> Self {
        Self {
            position,
            module_count: catalog.len(),
            modules: Some(ModuleSet::full(catalog.len())),
            health: Some(Box::from(catalog.init_health())),
            module: None,
        }
    }

    /// Copy of this slot relocated to `position`.
    pub(crate) fn clone_at(&self, position: IVec3) -> Self {
        let mut slot = self.clone();
        slot.position = position;
        slot
    }

    #[inline]
    pub fn position(&self) -> IVec3 {
        self.position
    }

    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.module.is_some()
    }

    #[inline]
    pub fn is_forgotten(&self) -> bool {
        self.modules.is_none()
    }

    /// The chosen module, if collapsed.
    #[inline]
    pub fn module(&self) -> Option<usize> {
        self.module
    }

    /// Current candidates; `None` once forgotten.
    #[inline]
    pub fn modules(&self) -> Option<&ModuleSet> {
        self.modules.as_ref()
    }

    #[inline]
    pub(crate) fn modules_mut(&mut self) -> Option<&mut ModuleSet> {
        self.modules.as_mut()
    }

    #[inline]
    pub fn has_candidate(&self, module: usize) -> bool {
        self.modules
            .as_ref()
            .is_some_and(|modules| modules.contains(module))
    }

    /// Support counter for `module` from `direction`.
    ///
    /// # Panics
    /// Panics if the slot has been forgotten.
    #[inline]
    pub fn health(&self, direction: usize, module: usize) -> i16 {
        let health = self
            .health
            .as_ref()
            .expect("support counters queried on a forgotten slot");
        health[direction * self.module_count + module]
    }

    pub(crate) fn decrement_health(&mut self, direction: usize, module: usize) {
        let count = self.module_count;
        let health = self
            .health
            .as_mut()
            .expect("support counters mutated on a forgotten slot");
        let cell = &mut health[direction * count + module];
        assert!(
            *cell > 0,
            "support counter underflow for module {} at {:?}",
            module,
            self.position
        );
        *cell -= 1;
    }

    pub(crate) fn increment_health(&mut self, direction: usize, module: usize) {
        let count = self.module_count;
        let health = self
            .health
            .as_mut()
            .expect("support counters mutated on a forgotten slot");
        health[direction * count + module] += 1;
    }

    pub(crate) fn set_module(&mut self, module: usize) {
        self.module = Some(module);
    }

    pub(crate) fn clear_module(&mut self) {
        self.module = None;
    }

    /// Release candidates and counters permanently.
    pub(crate) fn forget(&mut self) {
        self.modules = None;
        self.health = None;
    }

    /// Entropy of the candidate set; infinite once forgotten.
    pub fn entropy(&mut self, catalog: &Catalog) -> f64 {
        match self.modules.as_mut() {
            Some(modules) => modules.entropy(catalog),
            None => f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::uniform_catalog;
    use crate::direction::{DIRECTION_COUNT, POS_Y};

    #[test]
    fn test_full_slot_starts_with_baseline_health() {
        let catalog = uniform_catalog(3);
        let slot = Slot::full(IVec3::ZERO, &catalog);
        assert!(!slot.is_collapsed());
        assert!(!slot.is_forgotten());
        assert_eq!(slot.modules().unwrap().count(), 3);
        for direction in 0..DIRECTION_COUNT {
            for module in 0..3 {
                assert_eq!(slot.health(direction, module), 3);
            }
        }
    }

    #[test]
    fn test_health_round_trip() {
        let catalog = uniform_catalog(2);
        let mut slot = Slot::full(IVec3::ZERO, &catalog);
        slot.decrement_health(POS_Y, 1);
        assert_eq!(slot.health(POS_Y, 1), 1);
        assert_eq!(slot.health(POS_Y, 0), 2);
        slot.increment_health(POS_Y, 1);
        assert_eq!(slot.health(POS_Y, 1), 2);
    }

    #[test]
    #[should_panic(expected = "support counter underflow")]
    fn test_health_underflow_panics() {
        let catalog = uniform_catalog(2);
        let mut slot = Slot::full(IVec3::ZERO, &catalog);
        slot.decrement_health(POS_Y, 0);
        slot.decrement_health(POS_Y, 0);
        slot.decrement_health(POS_Y, 0);
    }

    #[test]
    fn test_forget_releases_state() {
        let catalog = uniform_catalog(2);
        let mut slot = Slot::full(IVec3::ZERO, &catalog);
        slot.set_module(1);
        slot.forget();
        assert!(slot.is_forgotten());
        assert!(slot.modules().is_none());
        assert_eq!(slot.module(), Some(1));
        assert_eq!(slot.entropy(&catalog), f64::INFINITY);
    }

    #[test]
    fn test_clone_at_relocates() {
        let catalog = uniform_catalog(2);
        let slot = Slot::full(IVec3::ZERO, &catalog);
        let moved = slot.clone_at(IVec3::new(1, 2, 3));
        assert_eq!(moved.position(), IVec3::new(1, 2, 3));
        assert_eq!(moved.modules(), slot.modules());
    }
}
