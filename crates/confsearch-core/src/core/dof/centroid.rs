use super::{DegreeOfFreedom, DofError, DofKind, DofState, check_value_count};
use crate::core::genetics::mutation::{default_max_mutations, draw_value, mutation_with};
use crate::core::models::geometry::Geometry;
use nalgebra::Point3;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GRID: (i32, i32) = (-10, 10);

/// Absolute placement of the molecular centroid on an integer grid.
///
/// Values are `[x, y, z]`; each axis draws from its own inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub state: DofState,
    #[serde(default = "default_ranges")]
    pub ranges: [(i32, i32); 3],
}

fn default_ranges() -> [(i32, i32); 3] {
    [DEFAULT_GRID; 3]
}

impl Centroid {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self::with_ranges(positions, default_ranges())
    }

    pub fn with_ranges(positions: Vec<Vec<usize>>, ranges: [(i32, i32); 3]) -> Self {
        Self {
            state: DofState::new(positions),
            ranges,
        }
    }

    fn axis_domain(&self, axis: usize) -> Vec<f64> {
        let (lo, hi) = self.ranges[axis];
        (lo.min(hi)..=hi.max(lo)).map(f64::from).collect()
    }

    fn draw<R: Rng + ?Sized>(&mut self, weights: Option<&[f64]>, rng: &mut R) {
        self.state.values = (0..3)
            .map(|axis| draw_value(&self.axis_domain(axis), weights, None, rng).unwrap_or(0.0))
            .collect();
    }
}

impl DegreeOfFreedom for Centroid {
    fn kind(&self) -> DofKind {
        DofKind::Centroid
    }

    fn state(&self) -> &DofState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DofState {
        &mut self.state
    }

    fn value_count(&self) -> usize {
        3
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
        let max = max_mutations.unwrap_or_else(|| default_max_mutations(3));
        let domains: Vec<Vec<f64>> = (0..3).map(|axis| self.axis_domain(axis)).collect();
        self.state.values = mutation_with(&self.state.values, max, rng, |rng, axis, current| {
            draw_value(&domains[axis], weights, Some(current), rng).unwrap_or(current)
        });
    }

    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        check_value_count(self.kind(), 3, &self.state.values)?;
        let target = Point3::new(self.state.values[0], self.state.values[1], self.state.values[2]);
        let mut out = geometry.clone();
        let shift = target - out.centroid();
        out.translate(&shift);
        Ok(out)
    }

    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        let c = geometry.centroid();
        self.state.values = vec![c.x, c.y, c.z];
        Ok(())
    }

    /// Euclidean distance between the two centroids.
    fn distance(&self, mine: &[f64], theirs: &[f64], _chiral: bool) -> f64 {
        mine.iter()
            .zip(theirs)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
