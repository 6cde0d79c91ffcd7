use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation_with};
use crate::core::models::geometry::Geometry;
use crate::core::utils::geometry::{rotation_from_axis_angle, rotation_to_align, signed_angle};
use nalgebra::{Point3, Rotation3, Unit, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const DEFAULT_ANGLES: [f64; 4] = [0.0, 90.0, 180.0, 270.0];
pub const AXIS_COMPONENTS: [f64; 3] = [-1.0, 0.0, 1.0];

const POLE_NUDGE: f64 = 0.00001;
const POLE_SCALE: f64 = 0.99999;

/// Rigid-body orientation of the whole molecule.
///
/// Values are `[angle, x, y, z]`: the reference vector (first atom to last
/// heavy atom) is aligned with the axis `(x, y, z)` and the molecule is then
/// twisted about that axis to `angle` degrees. The twist is measured from the
/// projection of the global z axis (or x, when z is parallel to the axis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub state: DofState,
    #[serde(default = "default_angles")]
    pub angles: Vec<f64>,
}

fn default_angles() -> Vec<f64> {
    DEFAULT_ANGLES.to_vec()
}

/// Nudges axes that are zero or exactly on a pole.
pub fn fix_degenerate_axis(values: &mut [f64]) {
    if values.len() != 4 {
        return;
    }
    let (x, y, z) = (values[1], values[2], values[3]);
    let zero = x == 0.0 && y == 0.0 && z == 0.0;
    if zero || (x == 0.0 && y == 0.0 && z == 1.0) {
        values[1..].copy_from_slice(&[0.0, POLE_NUDGE, POLE_SCALE]);
    } else if x == 0.0 && y == 0.0 && z == -1.0 {
        values[1..].copy_from_slice(&[0.0, -POLE_NUDGE, -POLE_SCALE]);
    }
}

/// The `(x, y, z)` axis of a value vector, if it has the `[angle, x, y, z]` shape.
fn axis_of(values: &[f64]) -> Option<Vector3<f64>> {
    match values {
        [_, x, y, z] => Some(Vector3::new(*x, *y, *z)),
        _ => None,
    }
}

fn reference_perpendicular(axis: &Unit<Vector3<f64>>) -> Vector3<f64> {
    let project = |v: Vector3<f64>| v - axis.into_inner() * v.dot(axis);
    let from_z = project(Vector3::z());
    if from_z.norm() > 1e-9 {
        from_z.normalize()
    } else {
        project(Vector3::x()).normalize()
    }
}

struct Frame {
    origin: usize,
    tip: usize,
}

impl Frame {
    fn of(kind: DofKind, geometry: &Geometry) -> Result<Self, DofError> {
        let tip = geometry
            .last_heavy_atom()
            .ok_or_else(|| DofError::DegenerateGeometry {
                kind,
                reason: "no heavy atoms".to_string(),
            })?;
        let frame = Self { origin: 0, tip };
        if frame.direction(geometry).norm() < 1e-8 {
            return Err(DofError::DegenerateGeometry {
                kind,
                reason: "reference atoms coincide".to_string(),
            });
        }
        Ok(frame)
    }

    fn direction(&self, geometry: &Geometry) -> Vector3<f64> {
        geometry.position(self.tip) - geometry.position(self.origin)
    }

    /// Perpendicular offset of the first atom off the reference line.
    fn twist_vector(&self, geometry: &Geometry, axis: &Unit<Vector3<f64>>) -> Option<Vector3<f64>> {
        let origin = geometry.position(self.origin);
        geometry
            .atoms
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.origin && *i != self.tip)
            .map(|(_, atom)| {
                let offset = atom.position - origin;
                offset - axis.into_inner() * offset.dot(axis)
            })
            .find(|perp| perp.norm() > 1e-3)
    }

    fn twist(&self, geometry: &Geometry, axis: &Unit<Vector3<f64>>) -> Option<f64> {
        let u = self.twist_vector(geometry, axis)?;
        Some(signed_angle(&reference_perpendicular(axis), &u, axis))
    }
}

fn half_turn_about_perpendicular(v: &Vector3<f64>) -> Rotation3<f64> {
    let helper = if v.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    Rotation3::from_axis_angle(&Unit::new_normalize(v.cross(&helper)), PI)
}

impl Orientation {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self::with_angles(positions, default_angles())
    }

    pub fn with_angles(positions: Vec<Vec<usize>>, angles: Vec<f64>) -> Self {
        Self {
            state: DofState::new(positions),
            angles,
        }
    }

    fn domain(&self, locus: usize) -> &[f64] {
        if locus == 0 { &self.angles } else { &AXIS_COMPONENTS }
    }

    fn draw<R: Rng + ?Sized>(&mut self, weights: Option<&[f64]>, rng: &mut R) {
        let mut values: Vec<f64> = (0..4)
            .map(|locus| draw_value(self.domain(locus), weights, None, rng).unwrap_or(0.0))
            .collect();
        fix_degenerate_axis(&mut values);
        self.state.values = values;
    }
}

impl DegreeOfFreedom for Orientation {
    fn kind(&self) -> DofKind {
        DofKind::Orientation
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn value_count(&self) -> usize {
        4
    }

    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.draw(None, rng);
    }

    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        self.draw(Some(weights), rng);
    }

    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(4));
        let angles = self.angles.clone();
        let mut values = mutation_with(&self.state.values, max, rng, |rng, locus, current| {
            let domain: &[f64] = if locus == 0 { &angles } else { &AXIS_COMPONENTS };
            draw_value(domain, weights, Some(current), rng).unwrap_or(current)
        });
        fix_degenerate_axis(&mut values);
        self.state.values = values;
    }

    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        check_value_count(self.kind(), 4, &self.state.values)?;
        let mut values = self.state.values.clone();
        fix_degenerate_axis(&mut values);
        let axis = Unit::new_normalize(Vector3::new(values[1], values[2], values[3]));

        let frame = Frame::of(self.kind(), geometry)?;
        let mut out = geometry.clone();
        let pivot: Point3<f64> = out.centroid();

        let direction = frame.direction(&out);
        let align = rotation_to_align(&direction, &axis)
            .unwrap_or_else(|| half_turn_about_perpendicular(&direction));
        out.rotate_all(&pivot, &align);

        if let Some(current) = frame.twist(&out, &axis) {
            let twist = rotation_from_axis_angle(&axis, values[0] - current);
            out.rotate_all(&pivot, &twist);
        }
        Ok(out)
    }

    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        let frame = Frame::of(self.kind(), geometry)?;
        let axis = Unit::new_normalize(frame.direction(geometry));
        let angle = frame.twist(geometry, &axis).unwrap_or(0.0).rem_euclid(360.0);
        self.state.values = vec![angle, axis.x, axis.y, axis.z];
        Ok(())
    }

    /// Angle in degrees between the two axis vectors; the twist is ignored.
    fn distance(&self, mine: &[f64], theirs: &[f64], _chiral: bool) -> f64 {
        let (Some(a), Some(b)) = (axis_of(mine), axis_of(theirs)) else {
            return 180.0;
        };
        if a.norm() < 1e-12 || b.norm() < 1e-12 {
            return 180.0;
        }
        a.angle(&b).to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::BondOrder;
    use crate::core::utils::geometry::circular_difference;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn propanol() -> Geometry {
        let mut g = Geometry::default();
        g.add_atom(Atom::new("C", Point3::new(0.0, 0.0, 0.0)));
        g.add_atom(Atom::new("C", Point3::new(1.25, 0.85, 0.0)));
        g.add_atom(Atom::new("C", Point3::new(2.5, 0.0, 0.3)));
        g.add_atom(Atom::new("O", Point3::new(3.7, 0.8, 0.1)));
        g.add_atom(Atom::new("H", Point3::new(4.4, 0.3, -0.2)));
        for i in 0..4 {
            g.add_bond(i, i + 1, BondOrder::Single);
        }
        g
    }

    #[test]
    fn degenerate_axes_are_nudged() {
        let mut zero = vec![90.0, 0.0, 0.0, 0.0];
        fix_degenerate_axis(&mut zero);
        assert_eq!(zero, vec![90.0, 0.0, 0.00001, 0.99999]);
        let mut north = vec![0.0, 0.0, 0.0, 1.0];
        fix_degenerate_axis(&mut north);
        assert_eq!(north, vec![0.0, 0.0, 0.00001, 0.99999]);
        let mut south = vec![180.0, 0.0, 0.0, -1.0];
        fix_degenerate_axis(&mut south);
        assert_eq!(south, vec![180.0, 0.0, -0.00001, -0.99999]);
        let mut fine = vec![0.0, 1.0, 0.0, -1.0];
        fix_degenerate_axis(&mut fine);
        assert_eq!(fine, vec![0.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn random_values_never_hit_a_pole() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut dof = Orientation::new(vec![]);
        for _ in 0..200 {
            dof.get_random_values(&mut rng);
            let v = &dof.state.values;
            assert!(DEFAULT_ANGLES.contains(&v[0]));
            assert!(!(v[1] == 0.0 && v[2] == 0.0));
        }
    }

    #[test]
    fn apply_aligns_reference_vector_and_sets_twist() {
        let geometry = propanol();
        for axis in [[1.0, 1.0, 0.0], [0.0, -1.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 0.00001, 0.99999]] {
            for angle in DEFAULT_ANGLES {
                let mut dof = Orientation::new(vec![]);
                let out = dof
                    .apply_values(&geometry, Some(&[angle, axis[0], axis[1], axis[2]]))
                    .unwrap();
                assert!((out.centroid() - geometry.centroid()).norm() < 1e-9);

                let mut measured = Orientation::new(vec![]);
                measured.update_values(&out).unwrap();
                let target = Vector3::new(axis[0], axis[1], axis[2]);
                assert!(measured.distance(&measured.state.values, &[0.0, target.x, target.y, target.z], true) < 1e-6);
                assert!(circular_difference(measured.state.values[0], angle) < 1e-4);
            }
        }
    }

    #[test]
    fn measure_then_reapply_is_stable() {
        let mut dof = Orientation::new(vec![]);
        dof.update_values(&propanol()).unwrap();
        let first = dof.state.values.clone();
        let out = dof.apply_on(&propanol()).unwrap();
        let mut again = Orientation::new(vec![]);
        again.update_values(&out).unwrap();
        assert!(dof.distance(&first, &again.state.values, true) < 1e-6);
        assert!(circular_difference(first[0], again.state.values[0]) < 1e-4);
    }

    #[test]
    fn equality_compares_axis_angle_only() {
        let mut a = Orientation::new(vec![]);
        a.state.values = vec![0.0, 1.0, 0.0, 0.0];
        let mut b = a.clone();
        b.state.values = vec![270.0, 1.0, 1.0, 0.0];
        assert!(a.is_equal(&b, 45.0 + 1e-9, true));
        b.state.values = vec![0.0, 0.0, 1.0, 0.0];
        assert!(!a.is_equal(&b, 45.0, true));
    }

    #[test]
    fn truncated_values_are_never_equal() {
        let mut a = Orientation::new(vec![]);
        a.state.values = vec![0.0, 1.0];
        let b = a.clone();
        assert_eq!(a.distance(&a.state.values, &b.state.values, true), 180.0);
        assert!(!a.is_equal(&b, 45.0, true));
    }

    #[test]
    fn mutation_keeps_values_in_domain() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut dof = Orientation::new(vec![]);
        dof.get_random_values(&mut rng);
        for _ in 0..100 {
            dof.mutate_values(None, None, &mut rng);
            let v = &dof.state.values;
            assert!(DEFAULT_ANGLES.contains(&v[0]));
            assert!(!(v[1] == 0.0 && v[2] == 0.0 && v[3].abs() == 1.0));
            assert!(!(v[1] == 0.0 && v[2] == 0.0 && v[3] == 0.0));
        }
    }
}
