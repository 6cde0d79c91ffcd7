use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_atoms, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation};
use crate::core::models::geometry::Geometry;
use crate::core::utils::geometry::{circular_difference, dihedral_deg, rotation_from_axis_angle};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Integer degrees in `[-179, 180]`.
pub static TORSION_DOMAIN: LazyLock<Vec<f64>> = LazyLock::new(|| (-179..=180).map(f64::from).collect());

/// Rotatable bonds, each described by an `[a, b, c, d]` quadruple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torsion {
    pub state: DofState,
}

impl Torsion {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self {
            state: DofState::new(positions),
        }
    }
}

/// Sets the dihedral `a-b-c-d` by rotating everything on the `c` side of `b-c`.
pub(crate) fn set_dihedral(
    geometry: &mut Geometry,
    kind: DofKind,
    position: &[usize],
    target: f64,
) -> Result<(), DofError> {
    let (a, b, c, d) = (position[0], position[1], position[2], position[3]);
    let moving = geometry
        .side_of_bond(b, c)
        .ok_or(DofError::RingBond { kind, b, c })?;

    let (pa, pb, pc, pd) = (
        geometry.position(a),
        geometry.position(b),
        geometry.position(c),
        geometry.position(d),
    );
    let axis = pc - pb;
    if axis.norm() < 1e-8 {
        return Err(DofError::DegenerateGeometry {
            kind,
            reason: format!("atoms {} and {} coincide", b, c),
        });
    }
    let current = dihedral_deg(&pa, &pb, &pc, &pd);
    let rotation = rotation_from_axis_angle(&axis, target - current);
    geometry.rotate_atoms(&moving, &pc, &rotation);
    Ok(())
}

pub(crate) fn measure_dihedrals(geometry: &Geometry, positions: &[Vec<usize>]) -> Vec<f64> {
    positions
        .iter()
        .map(|p| {
            dihedral_deg(
                &geometry.position(p[0]),
                &geometry.position(p[1]),
                &geometry.position(p[2]),
                &geometry.position(p[3]),
            )
        })
        .collect()
}

/// Torsional RMS distance, normalized so that a uniform 180 degree offset is 1.
///
/// Without chirality the mirror image (every angle negated) is tried as well.
pub(crate) fn torsional_distance(mine: &[f64], theirs: &[f64], chiral: bool) -> f64 {
    let rms = |sign: f64| {
        if mine.is_empty() {
            return 0.0;
        }
        let sum: f64 = mine
            .iter()
            .zip(theirs)
            .map(|(a, b)| (circular_difference(*a, sign * b) / 180.0).powi(2))
            .sum();
        (sum / mine.len() as f64).sqrt()
    };
    let direct = rms(1.0);
    if chiral { direct } else { direct.min(rms(-1.0)) }
}

impl DegreeOfFreedom for Torsion {
    fn kind(&self) -> DofKind {
        DofKind::Torsion
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&TORSION_DOMAIN, None, None, rng).unwrap_or(0.0))
            .collect();
    }

    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&TORSION_DOMAIN, Some(weights), None, rng).unwrap_or(0.0))
            .collect();
    }

    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(self.state.values.len()));
        self.state.values = mutation(&self.state.values, max, &TORSION_DOMAIN, weights, rng);
    }

    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        check_value_count(self.kind(), self.state.positions.len(), &self.state.values)?;
        let mut out = geometry.clone();
        for (position, &value) in self.state.positions.iter().zip(&self.state.values) {
            set_dihedral(&mut out, self.kind(), position, value)?;
        }
        Ok(out)
    }

    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        self.state.values = measure_dihedrals(geometry, &self.state.positions);
        Ok(())
    }

    fn distance(&self, mine: &[f64], theirs: &[f64], chiral: bool) -> f64 {
        torsional_distance(mine, theirs, chiral)
    }
}
