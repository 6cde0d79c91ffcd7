use super::acceptance::{accept, check, resolve_clash};
use crate::core::dof::DofKind;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::{Phase, RunState, Step, Termination};
use rand::Rng;
use tracing::{info, instrument, warn};

/// Fills the population up to `popsize` with random, valid, new structures.
///
/// Every rejected candidate costs one trial; running out of trials stops the
/// search. On success the population is sorted and its best energy becomes
/// the first entry of the energy history.
#[instrument(skip_all, name = "initialization_task")]
pub fn run(
    context: &SearchContext,
    state: &mut RunState,
    rng: &mut impl Rng,
) -> Result<Step<()>, EngineError> {
    let ga = &context.config.ga;
    let molecule = context.molecule;
    let validator = context.validator();

    context.reporter.report(Progress::PhaseStart {
        name: "Initialization",
    });
    context.reporter.report(Progress::TaskStart {
        total_steps: ga.popsize.saturating_sub(state.population.len()) as u64,
    });
    info!(popsize = ga.popsize, "Filling the initial population.");

    let finish = |step: Step<()>| -> Result<Step<()>, EngineError> {
        context.reporter.report(Progress::TaskFinish);
        context.reporter.report(Progress::PhaseFinish);
        Ok(step)
    };

    let mut trials = 0;
    while state.population.len() < ga.popsize {
        if trials >= ga.cnt_max {
            warn!(trials, filled = state.population.len(), "Could not fill the initial population.");
            return finish(Step::Stop(Termination::TrialBudgetExceeded {
                phase: Phase::Initialization,
                trials,
            }));
        }

        let mut candidate = molecule.new_structure();
        let valid = check(candidate.generate_structure(
            molecule,
            &context.config.mutation,
            validator,
            rng,
        ))?;
        if !valid {
            trials += 1;
            state.statistics.invalid_geometries += 1;
            continue;
        }
        if state
            .blacklist
            .contains(&candidate, &context.config.similarity, context.config.chiral)
        {
            trials += 1;
            state.statistics.duplicates += 1;
            continue;
        }
        if !resolve_clash(context, &mut candidate) {
            trials += 1;
            state.statistics.clashes += 1;
            continue;
        }
        if let Some(volume) = &molecule.volume {
            if !candidate.has_dof(DofKind::Centroid) && !candidate.check_position(volume) {
                candidate.adjust_position(molecule, validator);
            }
        }

        match accept(context, state, candidate)? {
            Step::Continue(()) => context.reporter.report(Progress::TaskIncrement),
            stop @ Step::Stop(_) => return finish(stop),
        }
    }

    state.sort_population();
    if state.min_energy.is_empty() {
        if let Some(best) = state.best_energy() {
            state.min_energy.push(best);
        }
    }
    info!(
        best_energy = ?state.best_energy(),
        trials,
        "Initial population complete."
    );
    finish(Step::Continue(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::testing::{Fixture, RejectAll};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fills_and_sorts_the_population() {
        let fixture = Fixture::new(6, 1);
        let mut state = RunState::new();
        let mut rng = StdRng::seed_from_u64(51);

        let step = run(&fixture.context(), &mut state, &mut rng).unwrap();
        assert_eq!(step, Step::Continue(()));
        assert_eq!(state.population.len(), 6);
        assert_eq!(state.blacklist.len(), 6);
        assert_eq!(fixture.evaluator.calls(), 6);
        assert_eq!(state.min_energy, vec![state.population[0].energy.unwrap()]);
        assert!(
            state
                .population
                .windows(2)
                .all(|w| w[0].energy <= w[1].energy)
        );
        let mut indices: Vec<usize> = state.population.iter().filter_map(|s| s.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn exhausted_budget_stops_before_any_evaluation() {
        let mut fixture = Fixture::new(6, 1);
        fixture.config.ga.cnt_max = 1;
        fixture.validator = Box::new(RejectAll);
        let mut state = RunState::new();
        let mut rng = StdRng::seed_from_u64(53);

        let step = run(&fixture.context(), &mut state, &mut rng).unwrap();
        assert_eq!(
            step,
            Step::Stop(Termination::TrialBudgetExceeded {
                phase: Phase::Initialization,
                trials: 1,
            })
        );
        assert_eq!(fixture.evaluator.calls(), 0);
        assert!(state.population.is_empty());
        assert_eq!(state.statistics.invalid_geometries, 1);
    }

    #[test]
    fn a_full_population_is_left_alone() {
        let fixture = Fixture::new(2, 1);
        let mut state = RunState::new();
        let mut rng = StdRng::seed_from_u64(55);
        run(&fixture.context(), &mut state, &mut rng).unwrap();
        let before = state.clone();

        run(&fixture.context(), &mut state, &mut rng).unwrap();
        assert_eq!(state, before);
        assert_eq!(fixture.evaluator.calls(), 2);
    }
}
