use super::acceptance::{check, resolve_clash};
use crate::core::conformer::structure::Structure;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::state::RunState;
use crate::engine::utils::selection::selection;
use rand::Rng;
use tracing::{debug, instrument, trace};

/// Selects two parents and produces two unevaluated children.
///
/// With probability `prob_for_crossing` crossover is attempted up to
/// `cnt_max` times; a try succeeds when both children are valid after
/// crossover and free of clashes. Otherwise the parents are copied without
/// their energies and lineage.
#[instrument(skip_all, name = "reproduction_task")]
pub fn run(
    context: &SearchContext,
    state: &mut RunState,
    rng: &mut impl Rng,
) -> Result<(Structure, Structure), EngineError> {
    let ga = &context.config.ga;
    let template = &context.molecule.template;
    let validator = context.validator();

    let (first, second, fitness) = selection(
        &state.population,
        ga.selection,
        context.collaborators.fitness,
        ga.fitness_sum_limit,
        rng,
    )?;
    let parent1 = &state.population[first];
    let parent2 = &state.population[second];
    debug!(parent1 = %parent1.name(), parent2 = %parent2.name(), "Parents selected.");
    trace!(?fitness, "Population fitness.");

    if rng.r#gen::<f64>() < ga.prob_for_crossing {
        let mut trials = 0;
        while trials < ga.cnt_max {
            trials += 1;
            let (mut child1, mut child2) = match Structure::crossover(parent1, parent2, template, rng) {
                Ok(children) => children,
                Err(e) => {
                    check(Err(e))?;
                    state.statistics.invalid_geometries += 1;
                    continue;
                }
            };
            if !(child1.is_geometry_valid_after_crossover(validator)
                && child2.is_geometry_valid_after_crossover(validator))
            {
                state.statistics.invalid_geometries += 1;
                continue;
            }
            if !(resolve_clash(context, &mut child1) && resolve_clash(context, &mut child2)) {
                state.statistics.clashes += 1;
                continue;
            }
            state.statistics.crossovers += 1;
            trace!(trials, "Crossover produced two children.");
            return Ok((child1, child2));
        }
        debug!(trials, "Crossover ran out of trials; copying the parents.");
    }

    let mut child1 = parent1.clone();
    let mut child2 = parent2.clone();
    child1.strip_lineage();
    child2.strip_lineage();
    state.statistics.copies += 1;
    Ok((child1, child2))
}
