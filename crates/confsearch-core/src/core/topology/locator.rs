use crate::core::models::geometry::Geometry;
use crate::core::models::topology::BondOrder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// The kinds of chemical sites a degree of freedom can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SitePattern {
    /// `[a, b, c, d]` quadruples around a rotatable single bond `b-c`.
    RotatableBond,
    /// `[a, b, c, d]` quadruples around a non-ring double bond `b=c`.
    CisTransBond,
    /// `[C1, C2, C3, C4, C5, O5, O1]`: a pyranose ring plus the exocyclic
    /// oxygen on the anomeric carbon.
    PyranoseRing,
    /// `[heavy, hydrogen]` pairs for protons bound to N, O or S.
    MovableProton,
    /// A single tuple holding every atom of the molecule.
    WholeMolecule,
}

/// Locates the atom index tuples matching a site pattern in a template.
///
/// An absent pattern yields an empty list, never an error.
pub trait PatternLocator {
    fn find_positions(&self, template: &Geometry, pattern: SitePattern) -> Vec<Vec<usize>>;
}

/// Pattern locator working directly on the bond graph of the template.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopologyLocator;

impl PatternLocator for TopologyLocator {
    fn find_positions(&self, template: &Geometry, pattern: SitePattern) -> Vec<Vec<usize>> {
        let positions = match pattern {
            SitePattern::RotatableBond => rotatable_bonds(template),
            SitePattern::CisTransBond => cis_trans_bonds(template),
            SitePattern::PyranoseRing => pyranose_rings(template),
            SitePattern::MovableProton => movable_protons(template),
            SitePattern::WholeMolecule => {
                if template.is_empty() {
                    Vec::new()
                } else {
                    vec![(0..template.len()).collect()]
                }
            }
        };
        debug!(?pattern, count = positions.len(), "Located pattern sites.");
        positions
    }
}

fn in_triple_bond(geometry: &Geometry, atom: usize) -> bool {
    geometry
        .bonds
        .iter()
        .any(|b| b.contains(atom) && b.order == BondOrder::Triple)
}

/// Picks a neighbour of `atom` other than `exclude`, preferring heavy atoms.
fn outer_neighbor(geometry: &Geometry, atom: usize, exclude: usize, heavy_only: bool) -> Option<usize> {
    let neighbors: Vec<usize> = geometry
        .neighbors(atom)
        .into_iter()
        .filter(|&n| n != exclude)
        .collect();
    neighbors
        .iter()
        .copied()
        .find(|&n| geometry.atoms[n].is_heavy())
        .or_else(|| {
            if heavy_only {
                None
            } else {
                neighbors.first().copied()
            }
        })
}

fn rotatable_bonds(geometry: &Geometry) -> Vec<Vec<usize>> {
    let mut seen = HashSet::new();
    let mut positions = Vec::new();
    for bond in &geometry.bonds {
        if bond.order != BondOrder::Single {
            continue;
        }
        let (b, c) = (bond.a, bond.b);
        if geometry.degree(b) < 2 || geometry.degree(c) < 2 {
            continue;
        }
        if in_triple_bond(geometry, b) || in_triple_bond(geometry, c) {
            continue;
        }
        if geometry.is_ring_bond(b, c) {
            continue;
        }
        if !seen.insert((b.min(c), b.max(c))) {
            continue;
        }
        if let (Some(a), Some(d)) = (
            outer_neighbor(geometry, b, c, false),
            outer_neighbor(geometry, c, b, false),
        ) {
            positions.push(vec![a, b, c, d]);
        }
    }
    positions
}

fn cis_trans_bonds(geometry: &Geometry) -> Vec<Vec<usize>> {
    let mut positions = Vec::new();
    for bond in &geometry.bonds {
        if bond.order != BondOrder::Double {
            continue;
        }
        let (b, c) = (bond.a, bond.b);
        if geometry.is_ring_bond(b, c) {
            continue;
        }
        if let (Some(a), Some(d)) = (
            outer_neighbor(geometry, b, c, true),
            outer_neighbor(geometry, c, b, true),
        ) {
            positions.push(vec![a, b, c, d]);
        }
    }
    positions
}

fn exocyclic_oxygen(geometry: &Geometry, atom: usize, ring: &[usize]) -> Option<usize> {
    geometry
        .neighbors(atom)
        .into_iter()
        .find(|n| !ring.contains(n) && geometry.atoms[*n].is_element("O"))
}

fn pyranose_rings(geometry: &Geometry) -> Vec<Vec<usize>> {
    let adjacency = geometry.adjacency();
    let is_carbon = |i: usize| geometry.atoms[i].is_element("C");
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut positions = Vec::new();

    for (ring_o, atom) in geometry.atoms.iter().enumerate() {
        if !atom.is_element("O") {
            continue;
        }
        // Walk O5 -> C1 -> C2 -> C3 -> C4 -> C5 -> O5 over carbons only.
        let mut stack: Vec<Vec<usize>> = adjacency[ring_o]
            .iter()
            .copied()
            .filter(|&n| is_carbon(n))
            .map(|n| vec![n])
            .collect();
        while let Some(path) = stack.pop() {
            let last = path[path.len() - 1];
            if path.len() == 5 {
                if !adjacency[last].contains(&ring_o) {
                    continue;
                }
                let mut ring = path.clone();
                ring.push(ring_o);
                let c1 = ring[0];
                let Some(o1) = exocyclic_oxygen(geometry, c1, &ring) else {
                    continue;
                };
                let mut key = ring.clone();
                key.sort_unstable();
                if seen.insert(key) {
                    ring.push(o1);
                    positions.push(ring);
                }
                continue;
            }
            for &next in &adjacency[last] {
                if is_carbon(next) && !path.contains(&next) {
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push(extended);
                }
            }
        }
    }
    positions.sort();
    positions
}

fn movable_protons(geometry: &Geometry) -> Vec<Vec<usize>> {
    let mut positions = Vec::new();
    for bond in &geometry.bonds {
        for (heavy, h) in [(bond.a, bond.b), (bond.b, bond.a)] {
            let heavy_atom = &geometry.atoms[heavy];
            if geometry.atoms[h].is_hydrogen()
                && ["N", "O", "S"].iter().any(|e| heavy_atom.is_element(e))
            {
                positions.push(vec![heavy, h]);
            }
        }
    }
    positions.sort();
    positions
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn add(g: &mut Geometry, element: &str, x: f64, y: f64, z: f64) -> usize {
        g.add_atom(Atom::new(element, Point3::new(x, y, z)))
    }

    /// Butan-1-ol heavy atoms with the hydroxyl hydrogen.
    fn butanol() -> Geometry {
        let mut g = Geometry::default();
        let c1 = add(&mut g, "C", 0.0, 0.0, 0.0);
        let c2 = add(&mut g, "C", 1.5, 0.0, 0.0);
        let c3 = add(&mut g, "C", 2.0, 1.4, 0.0);
        let c4 = add(&mut g, "C", 3.5, 1.4, 0.0);
        let o = add(&mut g, "O", -0.5, -1.3, 0.0);
        let h = add(&mut g, "H", -1.4, -1.3, 0.0);
        g.add_bond(c1, c2, BondOrder::Single);
        g.add_bond(c2, c3, BondOrder::Single);
        g.add_bond(c3, c4, BondOrder::Single);
        g.add_bond(c1, o, BondOrder::Single);
        g.add_bond(o, h, BondOrder::Single);
        g
    }

    /// A tetrahydropyran-2-ol ring (heavy atoms only) in a chair-like layout.
    pub(crate) fn pyranose() -> Geometry {
        let mut g = Geometry::default();
        let ring: [(&str, [f64; 3]); 6] = [
            ("C", [1.25, 0.72, 0.25]),
            ("C", [0.0, 1.44, -0.25]),
            ("C", [-1.25, 0.72, 0.25]),
            ("C", [-1.25, -0.72, -0.25]),
            ("C", [0.0, -1.44, 0.25]),
            ("O", [1.25, -0.72, -0.25]),
        ];
        for (element, [x, y, z]) in ring {
            add(&mut g, element, x, y, z);
        }
        for i in 0..6 {
            g.add_bond(i, (i + 1) % 6, BondOrder::Single);
        }
        let o1 = add(&mut g, "O", 2.5, 1.44, 0.0);
        g.add_bond(0, o1, BondOrder::Single);
        let c6 = add(&mut g, "C", 0.0, -2.9, 0.0);
        g.add_bond(4, c6, BondOrder::Single);
        g
    }

    #[test]
    fn finds_rotatable_bonds_outside_rings() {
        let positions = TopologyLocator.find_positions(&butanol(), SitePattern::RotatableBond);
        let centrals: HashSet<(usize, usize)> = positions
            .iter()
            .map(|p| (p[1].min(p[2]), p[1].max(p[2])))
            .collect();
        assert_eq!(
            centrals,
            HashSet::from([(0, 1), (1, 2), (0, 4)]),
            "C1-C2, C2-C3 and C1-O are rotatable, terminal C3-C4 and O-H are not"
        );
        for p in &positions {
            assert_eq!(p.len(), 4);
            assert!(p.iter().collect::<HashSet<_>>().len() == 4);
        }
    }

    #[test]
    fn ring_bonds_are_not_rotatable() {
        let positions = TopologyLocator.find_positions(&pyranose(), SitePattern::RotatableBond);
        for p in positions {
            assert!(!(p[1] < 6 && p[2] < 6), "ring bond {:?} reported", p);
        }
    }

    #[test]
    fn triple_bond_neighbours_are_not_rotatable() {
        let mut g = Geometry::default();
        for k in 0..4 {
            add(&mut g, "C", k as f64 * 1.3, 0.0, 0.0);
        }
        g.add_bond(0, 1, BondOrder::Triple);
        g.add_bond(1, 2, BondOrder::Single);
        g.add_bond(2, 3, BondOrder::Single);
        let positions = TopologyLocator.find_positions(&g, SitePattern::RotatableBond);
        assert!(positions.is_empty());
    }

    #[test]
    fn finds_cis_trans_double_bond() {
        let mut g = Geometry::default();
        let a = add(&mut g, "C", 0.0, 1.0, 0.0);
        let b = add(&mut g, "C", 0.5, 0.0, 0.0);
        let c = add(&mut g, "C", 1.8, 0.0, 0.0);
        let d = add(&mut g, "C", 2.3, 1.0, 0.0);
        g.add_bond(a, b, BondOrder::Single);
        g.add_bond(b, c, BondOrder::Double);
        g.add_bond(c, d, BondOrder::Single);
        let positions = TopologyLocator.find_positions(&g, SitePattern::CisTransBond);
        assert_eq!(positions, vec![vec![a, b, c, d]]);
    }

    #[test]
    fn finds_pyranose_ring_in_order() {
        let positions = TopologyLocator.find_positions(&pyranose(), SitePattern::PyranoseRing);
        assert_eq!(positions, vec![vec![0, 1, 2, 3, 4, 5, 6]]);
    }

    #[test]
    fn finds_movable_protons() {
        let positions = TopologyLocator.find_positions(&butanol(), SitePattern::MovableProton);
        assert_eq!(positions, vec![vec![4, 5]]);
    }

    #[test]
    fn absent_patterns_yield_empty_lists() {
        let g = butanol();
        assert!(TopologyLocator.find_positions(&g, SitePattern::PyranoseRing).is_empty());
        assert!(TopologyLocator.find_positions(&g, SitePattern::CisTransBond).is_empty());
        assert!(TopologyLocator
            .find_positions(&Geometry::default(), SitePattern::WholeMolecule)
            .is_empty());
    }
}
