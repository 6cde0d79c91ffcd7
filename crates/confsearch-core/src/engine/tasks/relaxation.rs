use super::acceptance::{accept, check, resolve_clash};
use crate::core::conformer::structure::Structure;
use crate::core::dof::DofKind;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::state::{Phase, RunState, Step, Termination};
use rand::Rng;
use tracing::{instrument, warn};

/// Mutates `child` until it is valid, clash-free and evaluated.
///
/// A child that already duplicates a blacklisted structure is hard-mutated;
/// any other child gets a regular mutation. Every rejected try starts over
/// from the unmutated child and costs one trial. Running out of trials is
/// fatal for the whole search.
#[instrument(skip_all, name = "relaxation_task")]
pub fn run(
    context: &SearchContext,
    state: &mut RunState,
    child: Structure,
    rng: &mut impl Rng,
) -> Result<Step<()>, EngineError> {
    let ga = &context.config.ga;
    let molecule = context.molecule;
    let template = &molecule.template;
    let mutation = &context.config.mutation;
    let validator = context.validator();
    let centroid_evolves = child.has_dof(DofKind::Centroid);

    let duplicate = state
        .blacklist
        .contains(&child, &context.config.similarity, context.config.chiral);
    if duplicate {
        state.statistics.duplicates += 1;
    }

    let mut trials = 0;
    while trials < ga.cnt_max {
        trials += 1;
        let mut candidate = child.clone();

        if duplicate {
            state.statistics.hard_mutations += 1;
            let result = candidate.hard_mutate(template, mutation, rng);
            if !check(result.map(|()| candidate.is_geometry_valid(validator)))? {
                state.statistics.invalid_geometries += 1;
                continue;
            }
            if !resolve_clash(context, &mut candidate) {
                state.statistics.clashes += 1;
                continue;
            }
        } else {
            state.statistics.mutations += 1;
            let result = candidate.mutate(template, mutation, rng);
            if !check(result.map(|()| candidate.is_geometry_valid(validator)))? {
                state.statistics.invalid_geometries += 1;
                continue;
            }
            if candidate.has_clash(molecule, validator) {
                state.statistics.clashes += 1;
                if centroid_evolves {
                    state.statistics.hard_mutations += 1;
                    let result = candidate.hard_mutate(template, mutation, rng);
                    if !check(result.map(|()| candidate.is_geometry_valid(validator)))?
                        || candidate.has_clash(molecule, validator)
                    {
                        continue;
                    }
                } else {
                    candidate.adjust_position(molecule, validator);
                    if candidate.has_clash(molecule, validator) {
                        continue;
                    }
                }
            }
        }

        return accept(context, state, candidate);
    }

    warn!(trials, child = %child.name(), "No valid new structure found for child.");
    Ok(Step::Stop(Termination::TrialBudgetExceeded {
        phase: Phase::Mutation,
        trials,
    }))
}
