//! Slot addressing: bounded boxes and streaming infinite lattices.
//!
//! The collapse driver only needs position-indexed slot lookup, so it is
//! generic over [`SlotMap`]. Two backings are provided:
//! - [`BoundedMap`]: a fixed box, every slot allocated up front
//! - [`InfiniteMap`]: slots created lazily on first access, bounded by a
//!   Chebyshev range limit past which lookups fail and propagation reports
//!   the miss through the range-limit observer hook

use fxhash::FxHashMap;
use glam::IVec3;

use crate::catalog::Catalog;
use crate::slot::Slot;

/// Position-indexed slot storage.
///
/// Neighbor relationships are expressed purely through position lookup, so
/// slots never point at each other.
pub trait SlotMap {
    fn get_slot(&self, position: IVec3) -> Option<&Slot>;

    /// Mutable lookup. With `create`, maps that instantiate lazily bring the
    /// slot into existence first; maps with fixed extent ignore the flag.
    fn get_slot_mut(&mut self, position: IVec3, create: bool) -> Option<&mut Slot>;

    /// True when `position` is unaddressable because it lies beyond a
    /// streaming range limit (as opposed to outside a fixed box).
    fn over_range_limit(&self, position: IVec3) -> bool {
        let _ = position;
        false
    }

    /// Positions of all instantiated slots.
    fn positions(&self) -> Vec<IVec3>;
}

/// How a boundary constraint filters candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintMode {
    /// Keep only modules whose face matches the connector.
    Enforce,
    /// Drop modules whose face matches the connector.
    Exclude,
}

/// One authored boundary condition, applied before generation starts.
#[derive(Debug, Clone)]
pub struct BoundaryConstraint {
    pub position: IVec3,
    pub direction: usize,
    pub connector: u32,
    pub mode: ConstraintMode,
}

/// Axis-aligned box of slots, all created at construction.
#[derive(Debug)]
pub struct BoundedMap {
    origin: IVec3,
    size: IVec3,
    slots: Vec<Slot>,
}

impl BoundedMap {
    pub fn new(origin: IVec3, size: IVec3, catalog: &Catalog) -> Self {
        assert!(
            size.x > 0 && size.y > 0 && size.z > 0,
            "map size must be positive, got {:?}",
            size
        );
        let mut slots = Vec::with_capacity((size.x * size.y * size.z) as usize);
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    slots.push(Slot::full(origin + IVec3::new(x, y, z), catalog));
                }
            }
        }
        Self {
            origin,
            size,
            slots,
        }
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    pub fn size(&self) -> IVec3 {
        self.size
    }

    fn index(&self, position: IVec3) -> Option<usize> {
        let local = position - self.origin;
        if local.cmpge(IVec3::ZERO).all() && local.cmplt(self.size).all() {
            Some((local.x + local.y * self.size.x + local.z * self.size.x * self.size.y) as usize)
        } else {
            None
        }
    }
}

impl SlotMap for BoundedMap {
    fn get_slot(&self, position: IVec3) -> Option<&Slot> {
        self.index(position).map(|index| &self.slots[index])
    }

    fn get_slot_mut(&mut self, position: IVec3, _create: bool) -> Option<&mut Slot> {
        self.index(position).map(|index| &mut self.slots[index])
    }

    fn positions(&self) -> Vec<IVec3> {
        self.slots.iter().map(Slot::position).collect()
    }
}

/// Default Chebyshev distance past which an [`InfiniteMap`] stops
/// instantiating slots.
pub const DEFAULT_RANGE_LIMIT: i32 = 80;

/// Unbounded lattice with lazily created slots.
///
/// Slots are cloned from a full prototype on first mutable access with
/// `create`. Because propagation acquires a neighbor before touching its
/// counters, a slot always comes into existence with the exact baseline
/// support its absence was credited with.
#[derive(Debug)]
pub struct InfiniteMap {
    slots: FxHashMap<IVec3, Slot>,
    prototype: Slot,
    range_limit: i32,
}

impl InfiniteMap {
    pub fn new(catalog: &Catalog, range_limit: i32) -> Self {
        assert!(range_limit > 0, "range limit must be positive");
        Self {
            slots: FxHashMap::default(),
            prototype: Slot::full(IVec3::ZERO, catalog),
            range_limit,
        }
    }

    pub fn range_limit(&self) -> i32 {
        self.range_limit
    }

    /// Number of instantiated slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn in_range(&self, position: IVec3) -> bool {
        position.abs().max_element() <= self.range_limit
    }
}

impl SlotMap for InfiniteMap {
    fn get_slot(&self, position: IVec3) -> Option<&Slot> {
        self.slots.get(&position)
    }

    fn get_slot_mut(&mut self, position: IVec3, create: bool) -> Option<&mut Slot> {
        if !self.in_range(position) {
            return None;
        }
        if create {
            let prototype = &self.prototype;
            Some(
                self.slots
                    .entry(position)
                    .or_insert_with(|| prototype.clone_at(position)),
            )
        } else {
            self.slots.get_mut(&position)
        }
    }

    fn over_range_limit(&self, position: IVec3) -> bool {
        !self.in_range(position)
    }

    fn positions(&self) -> Vec<IVec3> {
        self.slots.keys().copied().collect()
    }
}
