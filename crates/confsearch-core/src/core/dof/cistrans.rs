use super::torsion::{measure_dihedrals, set_dihedral, torsional_distance};
use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_atoms, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation};
use crate::core::models::geometry::Geometry;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const CIS_TRANS_DOMAIN: [f64; 2] = [0.0, 180.0];

/// Non-ring double bonds that can flip between cis (0) and trans (180).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CisTrans {
    pub state: DofState,
}

impl CisTrans {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self {
            state: DofState::new(positions),
        }
    }
}

impl DegreeOfFreedom for CisTrans {
    fn kind(&self) -> DofKind {
        DofKind::CisTrans
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&CIS_TRANS_DOMAIN, None, None, rng).unwrap_or(180.0))
            .collect();
    }

    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&CIS_TRANS_DOMAIN, Some(weights), None, rng).unwrap_or(180.0))
            .collect();
    }

    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(self.state.values.len()));
        self.state.values = mutation(&self.state.values, max, &CIS_TRANS_DOMAIN, weights, rng);
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
