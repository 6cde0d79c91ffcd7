use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_atoms, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation};
use crate::core::models::geometry::Geometry;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `1` keeps the proton, `0` removes it.
pub const PROTOMER_DOMAIN: [f64; 2] = [0.0, 1.0];

/// Movable protons, each described by a `[heavy, hydrogen]` pair.
///
/// Removed protons stay in the geometry flagged as detached, so atom indices
/// used by other degrees of freedom remain valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protomeric {
    pub state: DofState,
}

impl Protomeric {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self {
            state: DofState::new(positions),
        }
    }
}

impl DegreeOfFreedom for Protomeric {
    fn kind(&self) -> DofKind {
        DofKind::Protomeric
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&PROTOMER_DOMAIN, None, None, rng).unwrap_or(1.0))
            .collect();
    }

    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        self.state.values = (0..self.state.positions.len())
            .map(|_| draw_value(&PROTOMER_DOMAIN, Some(weights), None, rng).unwrap_or(1.0))
            .collect();
    }

    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(self.state.values.len()));
        self.state.values = mutation(&self.state.values, max, &PROTOMER_DOMAIN, weights, rng);
    }

    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        check_value_count(self.kind(), self.state.positions.len(), &self.state.values)?;
        let mut out = geometry.clone();
        for (position, &value) in self.state.positions.iter().zip(&self.state.values) {
            if value != 0.0 && value != 1.0 {
                return Err(DofError::InvalidValue {
                    kind: self.kind(),
                    value,
                });
            }
            out.set_detached(position[1], value == 0.0);
        }
        Ok(out)
    }

    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        check_atoms(self.kind(), &self.state.positions, geometry)?;
        self.state.values = self
            .state
            .positions
            .iter()
            .map(|p| if geometry.atoms[p[1]].detached { 0.0 } else { 1.0 })
            .collect();
        Ok(())
    }

    /// Exact list equality: 0 when identical, 1 otherwise.
    fn distance(&self, mine: &[f64], theirs: &[f64], _chiral: bool) -> f64 {
        if mine == theirs { 0.0 } else { 1.0 }
    }
}
