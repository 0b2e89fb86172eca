//! Immutable module catalog: probabilities, faces, and adjacency sets.
//!
//! The catalog is authored elsewhere and consumed here as precomputed input:
//! per module a positive probability, six faces (connector id plus walkable
//! flag), and six possible-neighbor sets. Construction validates the input
//! and precomputes the entropy terms and the per-direction support ceilings
//! every fresh slot starts from.

use std::fmt;

use crate::direction::{opposite, DIRECTION_COUNT, DIRECTION_NAMES};
use crate::module_set::ModuleSet;

/// One typed face of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Face {
    /// Connector id; boundary constraints match against this.
    pub connector: u32,
    /// Whether this face can carry a walkway.
    pub walkable: bool,
}

/// Catalog-construction input for one module.
#[derive(Debug, Clone)]
pub struct ModulePrototype {
    /// Authoring name, used in error messages and logs only.
    pub name: String,
    /// Relative selection weight; must be positive and finite.
    pub probability: f64,
    pub faces: [Face; DIRECTION_COUNT],
    /// Allowed neighbor indices per direction.
    pub possible_neighbors: [Vec<usize>; DIRECTION_COUNT],
}

impl ModulePrototype {
    /// Prototype with no neighbors and default faces.
    pub fn new(name: impl Into<String>, probability: f64) -> Self {
        Self {
            name: name.into(),
            probability,
            faces: [Face::default(); DIRECTION_COUNT],
            possible_neighbors: std::array::from_fn(|_| Vec::new()),
        }
    }
}

/// A validated catalog entry.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub index: usize,
    pub probability: f64,
    /// Precomputed `probability * ln(probability)` for entropy sums.
    pub plogp: f64,
    pub faces: [Face; DIRECTION_COUNT],
    possible_neighbors: [ModuleSet; DIRECTION_COUNT],
}

impl Module {
    /// Modules allowed as this module's neighbor in `direction`.
    #[inline]
    pub fn possible_neighbors(&self, direction: usize) -> &ModuleSet {
        &self.possible_neighbors[direction]
    }
}

/// Error type for catalog validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// No modules at all
    Empty,
    /// Probability is zero, negative, or not finite
    NonPositiveProbability {
        module: usize,
        name: String,
        probability: f64,
    },
    /// A possible-neighbor index does not name a module
    NeighborOutOfRange {
        module: usize,
        direction: usize,
        neighbor: usize,
    },
    /// `neighbor` is listed by `module` but the inverse rule is missing
    Asymmetric {
        module: usize,
        direction: usize,
        neighbor: usize,
    },
    /// No module at all supports `module` from `direction`
    Unreachable {
        module: usize,
        name: String,
        direction: usize,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "catalog contains no modules"),
            CatalogError::NonPositiveProbability {
                module,
                name,
                probability,
            } => write!(
                f,
                "module {} ('{}') has non-positive probability {}",
                module, name, probability
            ),
            CatalogError::NeighborOutOfRange {
                module,
                direction,
                neighbor,
            } => write!(
                f,
                "module {} lists unknown neighbor {} on {}",
                module, neighbor, DIRECTION_NAMES[*direction]
            ),
            CatalogError::Asymmetric {
                module,
                direction,
                neighbor,
            } => write!(
                f,
                "module {} admits {} on {} but the inverse rule is missing",
                module, neighbor, DIRECTION_NAMES[*direction]
            ),
            CatalogError::Unreachable {
                module,
                name,
                direction,
            } => write!(
                f,
                "module {} ('{}') cannot be supported from {}",
                module, name, DIRECTION_NAMES[*direction]
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The immutable module table shared by every slot of a run.
#[derive(Debug, Clone)]
pub struct Catalog {
    modules: Vec<Module>,
    /// Flat `direction * len + module`: support each module receives from a
    /// direction whose neighbor still has every candidate.
    init_health: Box<[i16]>,
}

impl Catalog {
    /// Validate prototypes and build the catalog.
    ///
    /// Rejected inputs: an empty list, non-positive probabilities, neighbor
    /// indices out of range, asymmetric adjacency rules, and modules with a
    /// direction no other module supports them from (such a module could
    /// never survive next to an instantiated neighbor).
    pub fn new(prototypes: Vec<ModulePrototype>) -> Result<Self, CatalogError> {
        let module_count = prototypes.len();
        if module_count == 0 {
            return Err(CatalogError::Empty);
        }
        assert!(
            module_count <= i16::MAX as usize,
            "support counters are i16; catalog of {} modules is too large",
            module_count
        );

        let mut modules = Vec::with_capacity(module_count);
        for (index, prototype) in prototypes.into_iter().enumerate() {
            if !prototype.probability.is_finite() || prototype.probability <= 0.0 {
                return Err(CatalogError::NonPositiveProbability {
                    module: index,
                    name: prototype.name,
                    probability: prototype.probability,
                });
            }
            let mut possible_neighbors: [ModuleSet; DIRECTION_COUNT] =
                std::array::from_fn(|_| ModuleSet::empty(module_count));
            for (direction, neighbors) in prototype.possible_neighbors.iter().enumerate() {
                for &neighbor in neighbors {
                    if neighbor >= module_count {
                        return Err(CatalogError::NeighborOutOfRange {
                            module: index,
                            direction,
                            neighbor,
                        });
                    }
                    possible_neighbors[direction].add(neighbor);
                }
            }
            let plogp = prototype.probability * prototype.probability.ln();
            modules.push(Module {
                name: prototype.name,
                index,
                probability: prototype.probability,
                plogp,
                faces: prototype.faces,
                possible_neighbors,
            });
        }

        for module in &modules {
            for direction in 0..DIRECTION_COUNT {
                for neighbor in module.possible_neighbors[direction].iter() {
                    if !modules[neighbor].possible_neighbors[opposite(direction)]
                        .contains(module.index)
                    {
                        return Err(CatalogError::Asymmetric {
                            module: module.index,
                            direction,
                            neighbor,
                        });
                    }
                }
            }
        }

        let mut init_health = vec![0i16; DIRECTION_COUNT * module_count];
        for direction in 0..DIRECTION_COUNT {
            let inverse = opposite(direction);
            for module in &modules {
                for neighbor in module.possible_neighbors[inverse].iter() {
                    init_health[direction * module_count + neighbor] += 1;
                }
            }
        }
        for direction in 0..DIRECTION_COUNT {
            for module in 0..module_count {
                if init_health[direction * module_count + module] == 0 {
                    return Err(CatalogError::Unreachable {
                        module,
                        name: modules[module].name.clone(),
                        direction,
                    });
                }
            }
        }

        Ok(Self {
            modules,
            init_health: init_health.into_boxed_slice(),
        })
    }

    /// Number of modules.
    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[inline]
    pub fn module(&self, index: usize) -> &Module {
        &self.modules[index]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[inline]
    pub fn probability(&self, index: usize) -> f64 {
        self.modules[index].probability
    }

    #[inline]
    pub fn plogp(&self, index: usize) -> f64 {
        self.modules[index].plogp
    }

    #[inline]
    pub fn possible_neighbors(&self, module: usize, direction: usize) -> &ModuleSet {
        &self.modules[module].possible_neighbors[direction]
    }

    /// The full support table, flat `direction * len + module`.
    pub fn init_health(&self) -> &[i16] {
        &self.init_health
    }

    /// Support `module` receives from `direction` when the neighbor there
    /// still has every candidate.
    #[inline]
    pub fn init_health_at(&self, direction: usize, module: usize) -> i16 {
        self.init_health[direction * self.modules.len() + module]
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Catalog of `n` unit-weight modules where everything neighbors
    /// everything in every direction.
    pub fn uniform_catalog(n: usize) -> Catalog {
        let all: Vec<usize> = (0..n).collect();
        let prototypes = (0..n)
            .map(|index| {
                let mut prototype = ModulePrototype::new(format!("m{}", index), 1.0);
                prototype.possible_neighbors = std::array::from_fn(|_| all.clone());
                prototype
            })
            .collect();
        Catalog::new(prototypes).expect("uniform catalog is valid")
    }

    /// Record `left` (at the lower coordinate) next to `right` along
    /// `axis_direction`, together with the inverse rule.
    pub fn allow(
        prototypes: &mut [ModulePrototype],
        left: usize,
        right: usize,
        axis_direction: usize,
    ) {
        prototypes[left].possible_neighbors[axis_direction].push(right);
        prototypes[right].possible_neighbors[crate::direction::opposite(axis_direction)]
            .push(left);
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{allow, uniform_catalog};
    use super::*;
    use crate::direction::{NEG_X, POS_X, POS_Y, POS_Z};

    #[test]
    fn test_uniform_catalog_init_health() {
        let catalog = uniform_catalog(3);
        for direction in 0..DIRECTION_COUNT {
            for module in 0..3 {
                assert_eq!(catalog.init_health_at(direction, module), 3);
            }
        }
    }

    #[test]
    fn test_init_health_counts_supporters() {
        // On x: 0-0, 0-1; other axes fully open.
        let mut prototypes: Vec<ModulePrototype> =
            (0..2).map(|i| ModulePrototype::new(format!("m{}", i), 1.0)).collect();
        allow(&mut prototypes, 0, 0, POS_X);
        allow(&mut prototypes, 0, 1, POS_X);
        allow(&mut prototypes, 1, 0, POS_X);
        for axis in [POS_Y, POS_Z] {
            for a in 0..2 {
                for b in 0..2 {
                    allow(&mut prototypes, a, b, axis);
                }
            }
        }
        let catalog = Catalog::new(prototypes).unwrap();
        // Module 0 is accepted from +x by both modules, module 1 only by 0.
        assert_eq!(catalog.init_health_at(POS_X, 0), 2);
        assert_eq!(catalog.init_health_at(POS_X, 1), 1);
        assert_eq!(catalog.init_health_at(NEG_X, 0), 2);
        assert_eq!(catalog.init_health_at(NEG_X, 1), 1);
    }

    #[test]
    fn test_plogp_precomputed() {
        let mut prototype = ModulePrototype::new("m0", 0.25);
        prototype.possible_neighbors = std::array::from_fn(|_| vec![0]);
        let catalog = Catalog::new(vec![prototype]).unwrap();
        assert!((catalog.plogp(0) - 0.25 * 0.25f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(Catalog::new(Vec::new()).unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn test_zero_probability_rejected() {
        let prototype = ModulePrototype::new("m0", 0.0);
        assert!(matches!(
            Catalog::new(vec![prototype]),
            Err(CatalogError::NonPositiveProbability { module: 0, .. })
        ));
    }

    #[test]
    fn test_neighbor_out_of_range_rejected() {
        let mut prototype = ModulePrototype::new("m0", 1.0);
        prototype.possible_neighbors[POS_X].push(7);
        assert_eq!(
            Catalog::new(vec![prototype]).unwrap_err(),
            CatalogError::NeighborOutOfRange {
                module: 0,
                direction: POS_X,
                neighbor: 7
            }
        );
    }

    #[test]
    fn test_one_sided_rule_rejected() {
        // Module 0 lists module 1 everywhere, but nothing lists module 0.
        let mut prototypes: Vec<ModulePrototype> =
            (0..2).map(|i| ModulePrototype::new(format!("m{}", i), 1.0)).collect();
        for direction in 0..DIRECTION_COUNT {
            prototypes[0].possible_neighbors[direction].push(1);
            prototypes[1].possible_neighbors[direction].push(1);
        }
        assert_eq!(
            Catalog::new(prototypes).unwrap_err(),
            CatalogError::Asymmetric {
                module: 0,
                direction: 0,
                neighbor: 1
            }
        );
    }

    #[test]
    fn test_unreachable_module_rejected() {
        // Symmetric rules, but module 0 pairs with nothing on the x axis.
        let mut prototypes: Vec<ModulePrototype> =
            (0..2).map(|i| ModulePrototype::new(format!("m{}", i), 1.0)).collect();
        allow(&mut prototypes, 1, 1, POS_X);
        for axis in [POS_Y, POS_Z] {
            for a in 0..2 {
                for b in 0..2 {
                    allow(&mut prototypes, a, b, axis);
                }
            }
        }
        let error = Catalog::new(prototypes).unwrap_err();
        assert!(matches!(error, CatalogError::Unreachable { module: 0, .. }));
        let message = error.to_string();
        assert!(message.contains("module 0"));
        assert!(message.contains('x'));
    }
}
