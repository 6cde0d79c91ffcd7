use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_atoms, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation};
use crate::core::models::geometry::Geometry;
use crate::core::utils::geometry::{circular_difference, dihedral_deg, place_atom};
use nalgebra::{Matrix3, Point3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `[C1, C2, C3, C4, C5, O5, O1]`.
pub const SITE_LEN: usize = 7;
const RING_LEN: usize = 6;

/// Ring dihedrals of the canonical puckers, `dihedral(r[i], r[i+1], r[i+2], r[i+3])`
/// with indices taken modulo six.
///
/// 0-1 chairs, 2-7 boats, 8-13 skew boats, 14-25 half chairs, 26-37 envelopes.
pub const RING_DIHEDRALS: [[f64; 6]; 38] = [
    [60.0, -60.0, 60.0, -60.0, 60.0, -60.0],
    [-60.0, 60.0, -60.0, 60.0, -60.0, 60.0],
    [0.0, 60.0, -60.0, 0.0, 60.0, -60.0],
    [60.0, 0.0, -60.0, 60.0, 0.0, -60.0],
    [60.0, -60.0, 0.0, 60.0, -60.0, 0.0],
    [0.0, -60.0, 60.0, 0.0, -60.0, 60.0],
    [-60.0, 0.0, 60.0, -60.0, 0.0, 60.0],
    [-60.0, 60.0, 0.0, -60.0, 60.0, 0.0],
    [30.0, 30.0, -60.0, 30.0, 30.0, -60.0],
    [60.0, -30.0, -30.0, 60.0, -30.0, -30.0],
    [30.0, -60.0, 30.0, 30.0, -60.0, 30.0],
    [-30.0, -30.0, 60.0, -30.0, -30.0, 60.0],
    [-60.0, 30.0, 30.0, -60.0, 30.0, 30.0],
    [-30.0, 60.0, -30.0, -30.0, 60.0, -30.0],
    [45.0, -15.0, 0.0, -15.0, 45.0, -60.0],
    [60.0, -45.0, 15.0, 0.0, 15.0, -45.0],
    [45.0, -60.0, 45.0, -15.0, 0.0, -15.0],
    [15.0, -45.0, 60.0, -45.0, 15.0, 0.0],
    [0.0, -15.0, 45.0, -60.0, 45.0, -15.0],
    [15.0, 0.0, 15.0, -45.0, 60.0, -45.0],
    [-15.0, 45.0, -60.0, 45.0, -15.0, 0.0],
    [0.0, 15.0, -45.0, 60.0, -45.0, 15.0],
    [-15.0, 0.0, -15.0, 45.0, -60.0, 45.0],
    [-45.0, 15.0, 0.0, 15.0, -45.0, 60.0],
    [-60.0, 45.0, -15.0, 0.0, -15.0, 45.0],
    [-45.0, 60.0, -45.0, 15.0, 0.0, 15.0],
    [30.0, 0.0, 0.0, -30.0, 60.0, -60.0],
    [60.0, -30.0, 0.0, 0.0, 30.0, -60.0],
    [60.0, -60.0, 30.0, 0.0, 0.0, -30.0],
    [30.0, -60.0, 60.0, -30.0, 0.0, 0.0],
    [0.0, -30.0, 60.0, -60.0, 30.0, 0.0],
    [0.0, 0.0, 30.0, -60.0, 60.0, -30.0],
    [-30.0, 60.0, -60.0, 30.0, 0.0, 0.0],
    [0.0, 30.0, -60.0, 60.0, -30.0, 0.0],
    [0.0, 0.0, -30.0, 60.0, -60.0, 30.0],
    [-30.0, 0.0, 0.0, 30.0, -60.0, 60.0],
    [-60.0, 30.0, 0.0, 0.0, -30.0, 60.0],
    [-60.0, 60.0, -30.0, 0.0, 0.0, 30.0],
];

/// Ring bond angles of the canonical puckers, `angle(r[i], r[i+1], r[i+2])`.
pub const RING_ANGLES: [[f64; 5]; 38] = [
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [109.5, 109.5, 109.5, 109.5, 109.5],
    [114.0, 112.9, 112.9, 112.9, 112.9],
    [114.0, 114.0, 112.9, 112.9, 112.9],
    [112.9, 112.9, 112.9, 112.9, 114.0],
    [114.0, 112.9, 112.9, 112.9, 112.9],
    [114.0, 114.0, 112.9, 112.9, 112.9],
    [112.9, 112.9, 112.9, 112.9, 114.0],
    [111.4, 118.2, 118.2, 118.2, 118.2],
    [111.4, 111.4, 118.2, 118.2, 118.2],
    [118.2, 111.4, 111.4, 118.2, 118.2],
    [118.2, 118.2, 111.4, 111.4, 118.2],
    [118.2, 118.2, 118.2, 111.4, 111.4],
    [118.2, 118.2, 118.2, 118.2, 111.4],
    [118.2, 118.2, 111.4, 111.4, 118.2],
    [118.2, 118.2, 118.2, 111.4, 111.4],
    [118.2, 118.2, 118.2, 118.2, 111.4],
    [111.4, 118.2, 118.2, 118.2, 118.2],
    [111.4, 111.4, 118.2, 118.2, 118.2],
    [118.2, 111.4, 111.4, 118.2, 118.2],
    [117.7, 117.7, 117.7, 117.7, 117.7],
    [105.1, 117.7, 117.7, 117.7, 117.7],
    [117.7, 105.1, 117.7, 117.7, 117.7],
    [117.7, 117.7, 105.1, 117.7, 117.7],
    [117.7, 117.7, 117.7, 105.1, 117.7],
    [117.7, 117.7, 117.7, 117.7, 105.1],
    [117.7, 117.7, 105.1, 117.7, 117.7],
    [117.7, 117.7, 117.7, 105.1, 117.7],
    [117.7, 117.7, 117.7, 117.7, 105.1],
    [117.7, 117.7, 117.7, 117.7, 117.7],
    [105.1, 117.7, 117.7, 117.7, 117.7],
    [117.7, 105.1, 117.7, 117.7, 117.7],
];

pub static PYRANOSE_DOMAIN: LazyLock<Vec<f64>> =
    LazyLock::new(|| (0..RING_DIHEDRALS.len()).map(|i| i as f64).collect());

/// Ring puckers of pyranoses, one template index per ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyranoseRing {
    pub state: DofState,
}

impl PyranoseRing {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self {
            state: DofState::new(positions),
        }
    }
}

fn template_index(value: f64) -> Option<usize> {
    if value.fract() != 0.0 || value < 0.0 {
        return None;
    }
    let index = value as usize;
    (index < RING_DIHEDRALS.len()).then_some(index)
}

fn ring_dihedrals(points: &[Point3<f64>; RING_LEN]) -> [f64; RING_LEN] {
    std::array::from_fn(|i| {
        dihedral_deg(
            &points[i],
            &points[(i + 1) % RING_LEN],
            &points[(i + 2) % RING_LEN],
            &points[(i + 3) % RING_LEN],
        )
    })
}

/// Index of the template whose dihedrals are closest to the measured ones.
fn nearest_template(dihedrals: &[f64; RING_LEN]) -> usize {
    let mut best = (0, f64::INFINITY);
    for (index, template) in RING_DIHEDRALS.iter().enumerate() {
        let score: f64 = dihedrals
            .iter()
            .zip(template)
            .map(|(m, t)| circular_difference(*m, *t).powi(2))
            .sum();
        if score < best.1 {
            best = (index, score);
        }
    }
    best.0
}

/// Ring atom positions built from a template in a local frame.
fn build_local_ring(lengths: &[f64; 5], dihedrals: &[f64; 6], angles: &[f64; 5]) -> [Point3<f64>; RING_LEN] {
    let theta = angles[0].to_radians();
    let n0 = Point3::origin();
    let n1 = Point3::new(lengths[0], 0.0, 0.0);
    let n2 = n1 + Vector3::new(-theta.cos(), theta.sin(), 0.0) * lengths[1];
    let n3 = place_atom(&n0, &n1, &n2, lengths[2], angles[1], dihedrals[0]);
    let n4 = place_atom(&n1, &n2, &n3, lengths[3], angles[2], dihedrals[1]);
    let n5 = place_atom(&n2, &n3, &n4, lengths[4], angles[3], dihedrals[2]);
    [n0, n1, n2, n3, n4, n5]
}

fn centroid_of(points: &[Point3<f64>]) -> Point3<f64> {
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

/// Least-squares superposition of `moving` onto `target`.
///
/// Returns the proper rotation `r` and both centroids, so a moving point `p`
/// maps to `ct + r * (p - cm)`.
fn superpose(
    moving: &[Point3<f64>],
    target: &[Point3<f64>],
) -> Option<(Matrix3<f64>, Point3<f64>, Point3<f64>)> {
    let cm = centroid_of(moving);
    let ct = centroid_of(target);
    let mut h = Matrix3::zeros();
    for (m, t) in moving.iter().zip(target) {
        h += (m - cm) * (t - ct).transpose();
    }
    let svd = h.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();
    let mut correction = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        correction[(2, 2)] = -1.0;
    }
    Some((v * correction * u.transpose(), cm, ct))
}

/// Orthonormal frame at a ring atom from its two ring neighbours.
fn ring_atom_frame(prev: &Point3<f64>, center: &Point3<f64>, next: &Point3<f64>) -> Option<Matrix3<f64>> {
    let u = (prev - center).try_normalize(1e-9)?;
    let w = (next - center).try_normalize(1e-9)?;
    let e1 = (u + w).try_normalize(1e-9)?;
    let e3 = u.cross(&w).try_normalize(1e-9)?;
    let e2 = e3.cross(&e1);
    Some(Matrix3::from_columns(&[e1, e2, e3]))
}

fn rebuild_ring(geometry: &mut Geometry, site: &[usize], template: usize) -> Result<(), DofError> {
    let degenerate = |reason: &str| DofError::DegenerateGeometry {
        kind: DofKind::PyranoseRing,
        reason: reason.to_string(),
    };
    let ring: [usize; RING_LEN] = std::array::from_fn(|i| site[i]);
    let old: [Point3<f64>; RING_LEN] = std::array::from_fn(|i| geometry.position(ring[i]));
    let lengths: [f64; 5] = std::array::from_fn(|i| (old[i + 1] - old[i]).norm());

    let local = build_local_ring(&lengths, &RING_DIHEDRALS[template], &RING_ANGLES[template]);
    let (rotation, cm, ct) = superpose(&local, &old).ok_or_else(|| degenerate("ring superposition failed"))?;
    let new: [Point3<f64>; RING_LEN] = std::array::from_fn(|i| ct + rotation * (local[i] - cm));

    let mut moved = vec![false; geometry.len()];
    for &r in &ring {
        moved[r] = true;
    }
    for i in 0..RING_LEN {
        let prev = (i + RING_LEN - 1) % RING_LEN;
        let next = (i + 1) % RING_LEN;
        let old_frame = ring_atom_frame(&old[prev], &old[i], &old[next])
            .ok_or_else(|| degenerate("collinear ring atoms"))?;
        let new_frame = ring_atom_frame(&new[prev], &new[i], &new[next])
            .ok_or_else(|| degenerate("collinear ring atoms"))?;
        let local_rotation = new_frame * old_frame.transpose();

        for neighbor in geometry.neighbors(ring[i]) {
            if ring.contains(&neighbor) || moved[neighbor] {
                continue;
            }
            for atom in geometry.reachable_without(neighbor, &ring) {
                if moved[atom] {
                    continue;
                }
                moved[atom] = true;
                let offset = geometry.position(atom) - old[i];
                geometry.atoms[atom].position = new[i] + local_rotation * offset;
            }
        }
    }
    for (i, &r) in ring.iter().enumerate() {
        geometry.atoms[r].position = new[i];
    }
    Ok(())
}

impl DegreeOfFreedom for PyranoseRing {
    fn kind(&self) -> DofKind {
        DofKind::PyranoseRing
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&PYRANOSE_DOMAIN, None, None, rng).unwrap_or(0.0))
            .collect();
    }

    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&PYRANOSE_DOMAIN, Some(weights), None, rng).unwrap_or(0.0))
            .collect();
    }

    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(self.state.values.len()));
        self.state.values = mutation(&self.state.values, max, &PYRANOSE_DOMAIN, weights, rng);
    }

    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        check_value_count(self.kind(), self.state.positions.len(), &self.state.values)?;
        let mut out = geometry.clone();
        for (site, &value) in self.state.positions.iter().zip(&self.state.values) {
            let template = template_index(value).ok_or(DofError::InvalidValue {
                kind: self.kind(),
                value,
            })?;
            rebuild_ring(&mut out, site, template)?;
        }
        Ok(out)
    }

    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        self.state.values = self
            .state
            .positions
            .iter()
            .map(|site| {
                let points: [Point3<f64>; RING_LEN] = std::array::from_fn(|i| geometry.position(site[i]));
                nearest_template(&ring_dihedrals(&points)) as f64
            })
            .collect();
        Ok(())
    }

    /// Fraction of rings whose template differs.
    fn distance(&self, mine: &[f64], theirs: &[f64], _chiral: bool) -> f64 {
        if mine.is_empty() {
            return 0.0;
        }
        let mismatched = mine.iter().zip(theirs).filter(|(a, b)| a != b).count();
        mismatched as f64 / mine.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::locator::tests::pyranose;

    fn site() -> Vec<Vec<usize>> {
        vec![vec![0, 1, 2, 3, 4, 5, 6]]
    }

    #[test]
    fn tables_cover_all_templates() {
        assert_eq!(RING_DIHEDRALS.len(), 38);
        assert_eq!(RING_ANGLES.len(), 38);
        assert_eq!(PYRANOSE_DOMAIN.len(), 38);
        assert_eq!(nearest_template(&RING_DIHEDRALS[17]), 17);
    }

    #[test]
    fn applying_a_template_is_measured_back() {
        let geometry = pyranose();
        for template in [0usize, 1, 2, 5] {
            let mut dof = PyranoseRing::new(site());
            let out = dof.apply_values(&geometry, Some(&[template as f64])).unwrap();
            let mut measured = PyranoseRing::new(site());
            measured.update_values(&out).unwrap();
            assert_eq!(measured.state.values, vec![template as f64], "template {}", template);
        }
    }

    #[test]
    fn measure_then_reapply_is_stable() {
        let geometry = pyranose();
        let mut dof = PyranoseRing::new(site());
        let chair = dof.apply_values(&geometry, Some(&[1.0])).unwrap();
        dof.update_values(&chair).unwrap();
        let again = dof.apply_on(&chair).unwrap();
        let mut measured = PyranoseRing::new(site());
        measured.update_values(&again).unwrap();
        assert_eq!(measured.state.values, dof.state.values);
    }

    #[test]
    fn substituents_follow_their_ring_atom() {
        let geometry = pyranose();
        let mut dof = PyranoseRing::new(site());
        let out = dof.apply_values(&geometry, Some(&[3.0])).unwrap();
        for (ring_atom, substituent) in [(0usize, 6usize), (4, 7)] {
            let before = (geometry.position(ring_atom) - geometry.position(substituent)).norm();
            let after = (out.position(ring_atom) - out.position(substituent)).norm();
            assert!((before - after).abs() < 1e-9);
        }
        for i in 0..4 {
            let before = (geometry.position(i) - geometry.position(i + 1)).norm();
            let after = (out.position(i) - out.position(i + 1)).norm();
            assert!((before - after).abs() < 1e-9);
        }
    }

    #[test]
    fn equality_is_fraction_of_mismatched_rings() {
        let mut a = PyranoseRing::new(vec![vec![0; 7], vec![0; 7]]);
        a.state.values = vec![0.0, 5.0];
        let mut b = a.clone();
        b.state.values = vec![0.0, 6.0];
        assert_eq!(a.distance(&a.state.values, &b.state.values, true), 0.5);
        assert!(!a.is_equal(&b, 0.2, true));
        assert!(a.is_equal(&b, 0.5, true));
    }

    #[test]
    fn rejects_out_of_range_templates() {
        let mut dof = PyranoseRing::new(site());
        let result = dof.apply_values(&pyranose(), Some(&[38.0]));
        assert!(matches!(result, Err(DofError::InvalidValue { .. })));
    }
}
