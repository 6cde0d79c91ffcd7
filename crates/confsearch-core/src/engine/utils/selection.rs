use crate::core::conformer::structure::Structure;
use crate::engine::collaborators::FitnessTransform;
use crate::engine::config::SelectionMethod;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use thiserror::Error;
use tracing::{instrument, trace};

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Selection needs at least two individuals, the population has {0}")]
    PopulationTooSmall(usize),
    #[error("Individual at position {0} has no energy")]
    MissingEnergy(usize),
}

/// Picks two distinct parents from `population`.
///
/// Returns their positions in the population together with the fitness of
/// every individual. Roulette sampling falls back to a uniform draw when the
/// fitness sum does not exceed `fitness_sum_limit`. The second parent never
/// repeats the first: it is drawn from the remaining individuals with their
/// own weights, which is the distribution of resampling on collision.
#[instrument(level = "trace", skip_all, fields(method = %method))]
pub fn selection(
    population: &[Structure],
    method: SelectionMethod,
    transform: &dyn FitnessTransform,
    fitness_sum_limit: f64,
    rng: &mut impl Rng,
) -> Result<(usize, usize, Vec<f64>), SelectionError> {
    if population.len() < 2 {
        return Err(SelectionError::PopulationTooSmall(population.len()));
    }
    let energies = population
        .iter()
        .enumerate()
        .map(|(i, s)| s.energy.ok_or(SelectionError::MissingEnergy(i)))
        .collect::<Result<Vec<f64>, _>>()?;
    let fitness = transform.fitness(&energies);

    let fitness_sum: f64 = fitness.iter().sum();
    let use_wheel = method == SelectionMethod::RouletteWheel && fitness_sum > fitness_sum_limit;

    let first = if use_wheel {
        draw_weighted(&fitness, None, rng)
    } else {
        draw_uniform(population.len(), None, rng)
    };
    let second = if use_wheel {
        draw_weighted(&fitness, Some(first), rng)
    } else {
        draw_uniform(population.len(), Some(first), rng)
    };

    trace!(first, second, fitness_sum, use_wheel, "Parents selected.");
    Ok((first, second, fitness))
}

fn draw_uniform(len: usize, exclude: Option<usize>, rng: &mut impl Rng) -> usize {
    let candidates: Vec<usize> = (0..len).filter(|&i| Some(i) != exclude).collect();
    candidates.choose(rng).copied().unwrap_or(0)
}

fn draw_weighted(fitness: &[f64], exclude: Option<usize>, rng: &mut impl Rng) -> usize {
    let weights: Vec<f64> = fitness
        .iter()
        .enumerate()
        .map(|(i, &f)| if Some(i) == exclude || !f.is_finite() { 0.0 } else { f.max(0.0) })
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => draw_uniform(fitness.len(), exclude, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::geometry::Geometry;
    use crate::engine::collaborators::LinearFitness;
    use rand::rngs::StdRng;

    fn population(energies: &[f64]) -> Vec<Structure> {
        energies
            .iter()
            .map(|&e| {
                let mut s = Structure::new(Vec::new(), Geometry::default());
                s.energy = Some(e);
                s
            })
            .collect()
    }

    #[test]
    fn parents_are_always_distinct() {
        let mut rng = StdRng::seed_from_u64(41);
        let transform = LinearFitness::new(0.001);
        for energies in [vec![-1.0, 0.0], vec![-5.0, -4.0, 3.0, 10.0], vec![1.0; 6]] {
            let pop = population(&energies);
            for method in [SelectionMethod::RouletteWheel, SelectionMethod::Random] {
                for _ in 0..200 {
                    let (a, b, _) = selection(&pop, method, &transform, 1.2, &mut rng).unwrap();
                    assert_ne!(a, b);
                    assert!(a < pop.len() && b < pop.len());
                }
            }
        }
    }

    #[test]
    fn roulette_favours_low_energy() {
        let mut rng = StdRng::seed_from_u64(43);
        let pop = population(&[-10.0, -9.0, 0.0, 5.0, 10.0]);
        let transform = LinearFitness::new(0.001);
        let mut first_counts = [0usize; 5];
        for _ in 0..2000 {
            let (a, _, _) =
                selection(&pop, SelectionMethod::RouletteWheel, &transform, 1.2, &mut rng).unwrap();
            first_counts[a] += 1;
        }
        assert_eq!(first_counts[4], 0);
        assert!(first_counts[0] > first_counts[3]);
    }

    #[test]
    fn tiny_or_unevaluated_populations_are_rejected() {
        let mut rng = StdRng::seed_from_u64(47);
        let transform = LinearFitness::new(0.001);
        let single = population(&[1.0]);
        assert_eq!(
            selection(&single, SelectionMethod::Random, &transform, 1.2, &mut rng).unwrap_err(),
            SelectionError::PopulationTooSmall(1)
        );
        let mut pop = population(&[1.0, 2.0]);
        pop[1].energy = None;
        assert_eq!(
            selection(&pop, SelectionMethod::Random, &transform, 1.2, &mut rng).unwrap_err(),
            SelectionError::MissingEnergy(1)
        );
    }
}
