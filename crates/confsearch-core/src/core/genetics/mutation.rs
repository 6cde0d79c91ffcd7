use rand::{distributions::WeightedIndex, prelude::*, seq::index};
use tracing::{instrument, trace};

/// Draws one value from `domain`, skipping `exclude`.
///
/// When `weights` has the same length as `domain` the draw is weighted,
/// otherwise every admissible option is equally likely. Returns `None` only
/// when no option is left.
pub fn draw_value<R: Rng + ?Sized>(
    domain: &[f64],
    weights: Option<&[f64]>,
    exclude: Option<f64>,
    rng: &mut R,
) -> Option<f64> {
    let admissible: Vec<usize> = (0..domain.len())
        .filter(|&i| exclude.is_none_or(|x| domain[i] != x))
        .collect();
    if admissible.is_empty() {
        return None;
    }

    if let Some(weights) = weights.filter(|w| w.len() == domain.len()) {
        let subset: Vec<f64> = admissible.iter().map(|&i| weights[i].max(0.0)).collect();
        match WeightedIndex::new(&subset) {
            Ok(dist) => return Some(domain[admissible[dist.sample(rng)]]),
            Err(e) => trace!(error = %e, "Unusable mutation weights, drawing uniformly."),
        }
    }

    admissible.choose(rng).map(|&i| domain[i])
}

/// Replaces a random subset of loci, delegating each replacement to `draw`.
///
/// The subset size is drawn uniformly from `[1, min(max_mutations, n)]` and the
/// loci are picked without replacement. `draw` receives the locus index and its
/// current value; unselected loci are returned unchanged.
pub fn mutation_with<R, F>(values: &[f64], max_mutations: usize, rng: &mut R, mut draw: F) -> Vec<f64>
where
    R: Rng + ?Sized,
    F: FnMut(&mut R, usize, f64) -> f64,
{
    let mut mutated = values.to_vec();
    let n = values.len();
    if n == 0 {
        return mutated;
    }
    let upper = max_mutations.clamp(1, n);
    let count = rng.gen_range(1..=upper);
    for locus in index::sample(rng, n, count).into_iter() {
        mutated[locus] = draw(rng, locus, values[locus]);
    }
    mutated
}

/// The generic mutation operator over a single shared domain.
///
/// Each selected locus receives a value from `domain` different from its
/// current one. Periodicity plays no role here; it only matters to the
/// similarity metrics.
#[instrument(level = "trace", skip_all, fields(n = values.len(), max_mutations))]
pub fn mutation<R: Rng + ?Sized>(
    values: &[f64],
    max_mutations: usize,
    domain: &[f64],
    weights: Option<&[f64]>,
    rng: &mut R,
) -> Vec<f64> {
    mutation_with(values, max_mutations, rng, |rng, _, current| {
        draw_value(domain, weights, Some(current), rng).unwrap_or(current)
    })
}

/// Default number of loci a regular mutation may touch.
pub fn default_max_mutations(n: usize) -> usize {
    n.div_ceil(2).max(1)
}
