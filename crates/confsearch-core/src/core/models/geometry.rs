use super::atom::Atom;
use super::topology::{Bond, BondOrder};
use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A molecular geometry: an ordered list of atoms plus the bond graph.
///
/// Every conformer produced during a search shares the atom ordering and the
/// bond list of the template it was built from, so degrees of freedom can refer
/// to atoms by plain indices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

/// An axis-aligned box that bounds where a molecule may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|k| point[k] >= self.min[k] && point[k] <= self.max[k])
    }

    /// Returns the point of the box closest to `point`.
    pub fn clamp(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        )
    }
}

impl Geometry {
    pub fn new(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        Self { atoms, bonds }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) {
        self.bonds.push(Bond::new(a, b, order));
    }

    pub fn position(&self, index: usize) -> Point3<f64> {
        self.atoms[index].position
    }

    /// Iterates over `(index, atom)` for atoms that are not detached.
    pub fn active_atoms(&self) -> impl Iterator<Item = (usize, &Atom)> {
        self.atoms.iter().enumerate().filter(|(_, a)| !a.detached)
    }

    pub fn neighbors(&self, atom: usize) -> Vec<usize> {
        self.bonds.iter().filter_map(|b| b.partner(atom)).collect()
    }

    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adjacency[bond.a].push(bond.b);
            adjacency[bond.b].push(bond.a);
        }
        adjacency
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds.iter().find(|bond| bond.connects(a, b))
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.bonds.iter().filter(|b| b.contains(atom)).count()
    }

    /// Geometric center of the attached atoms.
    pub fn centroid(&self) -> Point3<f64> {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for (_, atom) in self.active_atoms() {
            sum += atom.position.coords;
            count += 1;
        }
        if count == 0 {
            return Point3::origin();
        }
        Point3::from(sum / count as f64)
    }

    /// Index of the last heavy atom in file order.
    pub fn last_heavy_atom(&self) -> Option<usize> {
        self.atoms.iter().rposition(|a| a.is_heavy())
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += shift;
        }
    }

    /// Rotates the listed atoms about `origin`.
    pub fn rotate_atoms(&mut self, indices: &[usize], origin: &Point3<f64>, rotation: &Rotation3<f64>) {
        for &i in indices {
            let p = &mut self.atoms[i].position;
            *p = origin + rotation * (*p - origin);
        }
    }

    /// Rotates the whole geometry about `origin`.
    pub fn rotate_all(&mut self, origin: &Point3<f64>, rotation: &Rotation3<f64>) {
        for atom in &mut self.atoms {
            atom.position = origin + rotation * (atom.position - origin);
        }
    }

    /// Copies coordinates of a geometry that only lists the attached atoms
    /// (as written to and read back from a file) onto this geometry.
    ///
    /// Returns `false` and leaves `self` untouched when the atom counts differ.
    pub fn adopt_active_positions(&mut self, compact: &Geometry) -> bool {
        let active: Vec<usize> = self.active_atoms().map(|(i, _)| i).collect();
        if active.len() != compact.len() {
            return false;
        }
        for (i, atom) in active.into_iter().zip(compact.atoms.iter()) {
            self.atoms[i].position = atom.position;
        }
        true
    }

    pub fn set_detached(&mut self, atom: usize, detached: bool) {
        self.atoms[atom].detached = detached;
    }

    /// Atoms reachable from `across` without walking the bond `from`-`across`.
    ///
    /// Returns `None` when `from` is reachable too, i.e. the bond is part of a
    /// ring and the two sides cannot be moved independently.
    pub fn side_of_bond(&self, from: usize, across: usize) -> Option<Vec<usize>> {
        let adjacency = self.adjacency();
        let mut visited = vec![false; self.atoms.len()];
        let mut queue = VecDeque::from([across]);
        visited[across] = true;
        visited[from] = true;
        let mut side = Vec::new();

        while let Some(current) = queue.pop_front() {
            side.push(current);
            for &next in &adjacency[current] {
                if current == across && next == from {
                    continue;
                }
                if next == from {
                    return None;
                }
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        Some(side)
    }

    pub fn is_ring_bond(&self, a: usize, b: usize) -> bool {
        self.side_of_bond(a, b).is_none()
    }

    /// Atoms reachable from `start` while never entering any atom in `blocked`.
    pub fn reachable_without(&self, start: usize, blocked: &[usize]) -> Vec<usize> {
        let adjacency = self.adjacency();
        let mut visited = vec![false; self.atoms.len()];
        for &b in blocked {
            visited[b] = true;
        }
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            out.push(current);
            for &next in &adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        out
    }
}
