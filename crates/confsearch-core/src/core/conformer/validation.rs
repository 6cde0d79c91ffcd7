use crate::core::models::geometry::Geometry;
use serde::{Deserialize, Serialize};

/// Geometry sanity checks owned by the caller of a search.
pub trait GeometryValidator {
    fn is_valid(&self, geometry: &Geometry) -> bool;

    /// Relaxed check used for children straight out of crossover.
    fn is_valid_after_crossover(&self, geometry: &Geometry) -> bool {
        self.is_valid(geometry)
    }

    /// Whether `geometry` overlaps with fixed `surroundings`.
    fn has_clash(&self, geometry: &Geometry, surroundings: &Geometry) -> bool;
}

/// Distance-based validity checks on attached atoms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceValidator {
    /// Minimum distance between atoms that are not bonded.
    pub min_nonbonded: f64,
    /// Maximum length of any bond.
    pub max_bond: f64,
    /// Multiplier on `min_nonbonded` used right after crossover.
    pub crossover_factor: f64,
    /// Minimum distance between the molecule and its surroundings.
    pub clash_distance: f64,
}

impl Default for DistanceValidator {
    fn default() -> Self {
        Self {
            min_nonbonded: 1.2,
            max_bond: 2.15,
            crossover_factor: 0.9,
            clash_distance: 1.8,
        }
    }
}

impl DistanceValidator {
    fn check(&self, geometry: &Geometry, min_nonbonded: f64) -> bool {
        let active: Vec<usize> = geometry.active_atoms().map(|(i, _)| i).collect();
        let mut bonded = vec![Vec::new(); geometry.len()];
        for bond in &geometry.bonds {
            if geometry.atoms[bond.a].detached || geometry.atoms[bond.b].detached {
                continue;
            }
            if (geometry.position(bond.a) - geometry.position(bond.b)).norm() > self.max_bond {
                return false;
            }
            bonded[bond.a].push(bond.b);
            bonded[bond.b].push(bond.a);
        }

        let limit = min_nonbonded * min_nonbonded;
        for (k, &i) in active.iter().enumerate() {
            for &j in &active[k + 1..] {
                if bonded[i].contains(&j) {
                    continue;
                }
                if (geometry.position(i) - geometry.position(j)).norm_squared() < limit {
                    return false;
                }
            }
        }
        true
    }
}

impl GeometryValidator for DistanceValidator {
    fn is_valid(&self, geometry: &Geometry) -> bool {
        self.check(geometry, self.min_nonbonded)
    }

    fn is_valid_after_crossover(&self, geometry: &Geometry) -> bool {
        self.check(geometry, self.min_nonbonded * self.crossover_factor)
    }

    fn has_clash(&self, geometry: &Geometry, surroundings: &Geometry) -> bool {
        let limit = self.clash_distance * self.clash_distance;
        geometry.active_atoms().any(|(_, atom)| {
            surroundings
                .active_atoms()
                .any(|(_, other)| (atom.position - other.position).norm_squared() < limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::BondOrder;
    use nalgebra::Point3;

    fn pair(distance: f64, bonded: bool) -> Geometry {
        let mut g = Geometry::default();
        g.add_atom(Atom::new("C", Point3::origin()));
        g.add_atom(Atom::new("C", Point3::new(distance, 0.0, 0.0)));
        if bonded {
            g.add_bond(0, 1, BondOrder::Single);
        }
        g
    }

    #[test]
    fn bonded_atoms_may_be_close_but_not_stretched() {
        let v = DistanceValidator::default();
        assert!(v.is_valid(&pair(1.0, true)));
        assert!(!v.is_valid(&pair(2.5, true)));
    }

    #[test]
    fn nonbonded_atoms_must_keep_distance() {
        let v = DistanceValidator::default();
        assert!(!v.is_valid(&pair(1.1, false)));
        assert!(v.is_valid(&pair(1.3, false)));
        assert!(v.is_valid_after_crossover(&pair(1.15, false)));
    }

    #[test]
    fn detached_atoms_are_ignored() {
        let v = DistanceValidator::default();
        let mut g = pair(0.5, false);
        g.set_detached(1, true);
        assert!(v.is_valid(&g));
    }

    #[test]
    fn clash_with_surroundings() {
        let v = DistanceValidator::default();
        let molecule = pair(1.5, true);
        let mut wall = Geometry::default();
        wall.add_atom(Atom::new("O", Point3::new(0.0, 1.0, 0.0)));
        assert!(v.has_clash(&molecule, &wall));
        wall.atoms[0].position = Point3::new(0.0, 5.0, 0.0);
        assert!(!v.has_clash(&molecule, &wall));
    }
}
