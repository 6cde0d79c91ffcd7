use crate::core::conformer::molecule::Molecule;
use crate::core::conformer::structure::Structure;
use crate::engine::collaborators::Collaborators;
use crate::engine::config::SearchConfig;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{RunState, Step, Termination};
use crate::engine::tasks::{initialization, relaxation, reproduction};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub state: RunState,
    pub termination: Termination,
}

impl SearchOutcome {
    /// The lowest-energy structure found.
    pub fn best(&self) -> Option<&Structure> {
        self.state.best()
    }
}

/// Runs a conformer search to completion.
///
/// With `resume`, the search continues from a saved state at its next
/// generation instead of building a new population.
#[instrument(skip_all, name = "search_workflow")]
pub fn run(
    molecule: &Molecule,
    config: &SearchConfig,
    collaborators: Collaborators,
    reporter: &ProgressReporter,
    resume: Option<RunState>,
) -> Result<SearchOutcome, EngineError> {
    let context = SearchContext::new(molecule, config, collaborators, reporter);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut state = match resume {
        Some(state) => {
            check_compatible(molecule, &state)?;
            info!(
                iteration = state.iteration,
                population = state.population.len(),
                "Resuming search from saved state."
            );
            reporter.report(Progress::Message(format!(
                "Resuming at generation {} with {} structures",
                state.iteration + 1,
                state.population.len()
            )));
            state
        }
        None => RunState::new(),
    };

    // === Phase 1: Initial population ===
    if state.population.len() < config.ga.popsize || state.min_energy.is_empty() {
        if let Step::Stop(termination) = initialization::run(&context, &mut state, &mut rng)? {
            return Ok(finish(state, termination));
        }
        save_checkpoint(config, &state)?;
    }

    // === Phase 2: Generational loop ===
    let termination = evolve(&context, &mut state, &mut rng)?;
    Ok(finish(state, termination))
}

fn evolve(
    context: &SearchContext,
    state: &mut RunState,
    rng: &mut StdRng,
) -> Result<Termination, EngineError> {
    let ga = &context.config.ga;
    let reporter = context.reporter;

    reporter.report(Progress::PhaseStart { name: "Evolution" });
    reporter.report(Progress::TaskStart {
        total_steps: ga.max_iter.saturating_sub(state.iteration) as u64,
    });
    info!(
        from = state.iteration,
        max_iter = ga.max_iter,
        "Starting generational loop."
    );

    let termination = loop {
        if state.iteration >= ga.max_iter {
            break Termination::MaxIterations;
        }
        let iteration = state.iteration;

        let (child1, child2) = reproduction::run(context, state, rng)?;
        if let Step::Stop(t) = relaxation::run(context, state, child1, rng)? {
            break t;
        }
        if let Step::Stop(t) = relaxation::run(context, state, child2, rng)? {
            break t;
        }

        state.truncate_population(ga.popsize);
        let best = state.best_energy().ok_or_else(|| {
            EngineError::Internal("population has no evaluated structure".to_string())
        })?;
        state.min_energy.push(best);
        state.iteration = iteration + 1;

        debug!(iteration, best_energy = best, "Generation complete.");
        reporter.report(Progress::Generation {
            iteration,
            best_energy: best,
        });
        reporter.report(Progress::TaskIncrement);
        save_checkpoint(context.config, state)?;

        if context
            .collaborators
            .convergence
            .has_converged(iteration, &state.min_energy)
        {
            break Termination::Converged;
        }
        if context.kill_requested() {
            break Termination::Cancelled;
        }
    };

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(termination)
}

fn finish(state: RunState, termination: Termination) -> SearchOutcome {
    info!(
        %termination,
        generations = state.iteration,
        evaluations = state.statistics.evaluations,
        best_energy = ?state.best_energy(),
        "Search finished."
    );
    SearchOutcome { state, termination }
}

fn save_checkpoint(config: &SearchConfig, state: &RunState) -> Result<(), EngineError> {
    if let Some(path) = &config.checkpoint_path {
        state.save(path)?;
        debug!(path = %path.display(), iteration = state.iteration, "Checkpoint written.");
    }
    Ok(())
}

fn check_compatible(molecule: &Molecule, state: &RunState) -> Result<(), EngineError> {
    let expected: Vec<_> = molecule.dofs.iter().map(|d| d.kind()).collect();
    for structure in state.population.iter().chain(state.blacklist.iter()) {
        let kinds: Vec<_> = structure.dofs.iter().map(|d| d.kind()).collect();
        if kinds != expected {
            return Err(EngineError::IncompatibleState(format!(
                "{} has degrees of freedom {:?}, the molecule has {:?}",
                structure.name(),
                kinds,
                expected
            )));
        }
        if structure.geometry.len() != molecule.template.len() {
            return Err(EngineError::IncompatibleState(format!(
                "{} has {} atoms, the template has {}",
                structure.name(),
                structure.geometry.len(),
                molecule.template.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conformer::molecule::tests::pentane_molecule;
    use crate::core::dof::DofKind;
    use crate::engine::collaborators::EnergyPlateau;
    use crate::engine::state::Phase;
    use crate::engine::tasks::testing::{Fixture, RejectAll};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn search(fixture: &Fixture, resume: Option<RunState>) -> SearchOutcome {
        run(
            &fixture.molecule,
            &fixture.config,
            fixture.collaborators(),
            &fixture.reporter,
            resume,
        )
        .unwrap()
    }

    #[test]
    fn single_generation_truncates_two() {
        let fixture = Fixture::new(10, 1);
        let outcome = search(&fixture, None);

        assert_eq!(outcome.termination, Termination::MaxIterations);
        assert_eq!(outcome.state.iteration, 1);
        assert_eq!(outcome.state.statistics.truncated, 2);
        assert_eq!(outcome.state.population.len(), 10);
        assert_eq!(outcome.state.min_energy.len(), 2);
        assert!(outcome.state.min_energy[1] <= outcome.state.min_energy[0]);
        assert_eq!(fixture.evaluator.calls(), 12);
        assert_eq!(outcome.state.blacklist.len(), 12);
        assert_eq!(outcome.state.next_index, 12);
    }

    #[test]
    fn invalid_geometries_exhaust_initialization_without_evaluating() {
        let mut fixture = Fixture::new(10, 1);
        fixture.config.ga.cnt_max = 1;
        fixture.validator = Box::new(RejectAll);
        let outcome = search(&fixture, None);

        assert_eq!(
            outcome.termination,
            Termination::TrialBudgetExceeded {
                phase: Phase::Initialization,
                trials: 1,
            }
        );
        assert_eq!(fixture.evaluator.calls(), 0);
        assert!(outcome.best().is_none());
    }

    #[test]
    fn energy_history_never_increases() {
        let fixture = Fixture::new(6, 8);
        let outcome = search(&fixture, None);
        let history = &outcome.state.min_energy;
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(history.len(), outcome.state.iteration + 1);
        assert!(
            outcome
                .state
                .population
                .windows(2)
                .all(|w| Structure::energy_ordering(&w[0], &w[1]).is_le())
        );
    }

    #[test]
    fn same_seed_gives_same_run() {
        let a = search(&Fixture::new(5, 3), None);
        let b = search(&Fixture::new(5, 3), None);
        assert_eq!(a.state, b.state);
    }

    #[test]
    fn flat_energies_converge() {
        let mut fixture = Fixture::new(4, 50);
        fixture.convergence = EnergyPlateau::new(2, f64::INFINITY);
        let outcome = search(&fixture, None);
        assert_eq!(outcome.termination, Termination::Converged);
        assert_eq!(outcome.state.iteration, 2);
    }

    #[test]
    fn kill_request_cancels_at_the_next_poll() {
        let mut fixture = Fixture::new(4, 10);
        fixture.kill.after = Some(5);
        let outcome = search(&fixture, None);
        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(fixture.evaluator.calls(), 6);
    }

    #[test]
    fn evaluation_failure_is_reported() {
        let mut fixture = Fixture::new(4, 10);
        fixture.evaluator.fail_after = Some(5);
        let outcome = search(&fixture, None);
        assert!(matches!(
            outcome.termination,
            Termination::EvaluationFailed { ref name, .. } if name == "structure_5"
        ));
    }

    #[test]
    fn checkpoint_allows_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut first = Fixture::new(5, 2);
        first.config.checkpoint_path = Some(path.clone());
        let interrupted = search(&first, None);
        assert_eq!(interrupted.state.iteration, 2);

        let saved = RunState::load(&path).unwrap();
        assert_eq!(saved, interrupted.state);

        let mut second = Fixture::new(5, 4);
        second.config.checkpoint_path = Some(path.clone());
        let resumed = search(&second, Some(saved));

        assert_eq!(resumed.termination, Termination::MaxIterations);
        assert_eq!(resumed.state.iteration, 4);
        assert_eq!(resumed.state.min_energy.len(), 5);
        assert_eq!(second.evaluator.calls(), 4);
        assert_eq!(resumed.state.next_index, interrupted.state.next_index + 4);
        assert_eq!(RunState::load(&path).unwrap(), resumed.state);
    }

    #[test]
    fn restart_rejects_foreign_state() {
        let fixture = Fixture::new(4, 1);
        let outcome = search(&fixture, None);

        let other = pentane_molecule(&[DofKind::Torsion, DofKind::Centroid]);
        let result = run(
            &other,
            &fixture.config,
            fixture.collaborators(),
            &fixture.reporter,
            Some(outcome.state),
        );
        assert!(matches!(result, Err(EngineError::IncompatibleState(_))));
    }

    #[test]
    fn progress_reports_each_generation() {
        let events = Mutex::new(Vec::new());
        let fixture = Fixture::new(4, 3);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::Generation { iteration, .. } = event {
                events.lock().unwrap().push(iteration);
            }
        }));
        run(
            &fixture.molecule,
            &fixture.config,
            fixture.collaborators(),
            &reporter,
            None,
        )
        .unwrap();
        drop(reporter);
        assert_eq!(events.into_inner().unwrap(), vec![0, 1, 2]);
    }
}
