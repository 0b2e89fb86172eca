//! 3D wave function collapse engine.
//!
//! Assigns one module from a finite catalog to every cell of a 3D integer
//! lattice, honoring per-direction adjacency rules. The solver repeatedly
//! collapses the lowest-entropy cell to a weighted-random candidate,
//! propagates the consequences through per-cell support counters, and
//! backtracks with a geometrically growing undo window when a cell runs out
//! of candidates.
//!
//! This crate provides:
//! - `Catalog`: the immutable module table (probabilities, faces, adjacency)
//! - `ModuleSet`: candidate bitsets with lazily cached entropy
//! - `Slot`, `SlotMap`, `BoundedMap`, `InfiniteMap`: the lattice
//! - `History`, `RemovalQueue`: undo records and the propagation worklist
//! - `Collapser`: the driver tying it all together
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use collapse_core::{BoundedMap, Catalog, Collapser, StdRandom};
//! use glam::IVec3;
//!
//! let catalog = Arc::new(Catalog::new(prototypes)?);
//! let map = BoundedMap::new(IVec3::ZERO, IVec3::new(16, 8, 16), &catalog);
//! let mut collapser = Collapser::new(map, catalog, Box::new(StdRandom::from_seed(7)));
//! collapser.collapse_area(IVec3::ZERO, IVec3::new(16, 8, 16))?;
//! ```

pub mod catalog;
pub mod collapser;
pub mod direction;
pub mod history;
pub mod map;
pub mod module_set;
pub mod removal_queue;
pub mod rng;
pub mod slot;


pub use catalog::{Catalog, CatalogError, Face, Module, ModulePrototype};
pub use collapser::{CollapseError, CollapseObserver, Collapser};
pub use direction::{opposite, DIRECTION_COUNT, OFFSETS};
pub use history::{History, HistoryItem, DEFAULT_HISTORY_CAPACITY};
pub use map::{
    BoundaryConstraint, BoundedMap, ConstraintMode, InfiniteMap, SlotMap, DEFAULT_RANGE_LIMIT,
};
pub use module_set::ModuleSet;
pub use removal_queue::RemovalQueue;
pub use rng::{SequenceRandom, StdRandom, WfcRng};
pub use slot::Slot;
