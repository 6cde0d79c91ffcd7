use crate::core::conformer::structure::Structure;
use crate::core::dof::{DofError, DofKind};
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::{RunState, Step, Termination};
use tracing::{debug, info, trace, warn};

/// Folds recoverable DOF failures into an invalid outcome.
pub fn check(result: Result<bool, DofError>) -> Result<bool, EngineError> {
    match result {
        Ok(valid) => Ok(valid),
        Err(e) if e.is_recoverable() => {
            trace!(error = %e, "Degrees of freedom could not be applied.");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Clears a clash with the surroundings by repositioning, when allowed.
///
/// Returns false when the clash persists or cannot be resolved because the
/// centroid is itself evolving.
pub fn resolve_clash(context: &SearchContext, structure: &mut Structure) -> bool {
    let validator = context.validator();
    if !structure.has_clash(context.molecule, validator) {
        return true;
    }
    if structure.has_dof(DofKind::Centroid) {
        return false;
    }
    structure.adjust_position(context.molecule, validator);
    !structure.has_clash(context.molecule, validator)
}

/// Evaluates `candidate` and commits it to the population and the blacklist.
///
/// Stops the search when the evaluation fails or a kill is requested after it.
pub fn accept(
    context: &SearchContext,
    state: &mut RunState,
    mut candidate: Structure,
) -> Result<Step<()>, EngineError> {
    candidate.index = Some(state.allocate_index());
    let name = candidate.name();

    let evaluation = match context
        .collaborators
        .evaluator
        .evaluate(&candidate.geometry, &name)
    {
        Ok(evaluation) => evaluation,
        Err(e) => {
            warn!(%name, error = %e, "Energy evaluation failed.");
            return Ok(Step::Stop(Termination::EvaluationFailed {
                name,
                reason: e.reason(),
            }));
        }
    };
    state.statistics.evaluations += 1;

    if evaluation.geometry.len() != candidate.geometry.len() {
        let reason = format!(
            "relaxed geometry has {} atoms, expected {}",
            evaluation.geometry.len(),
            candidate.geometry.len()
        );
        warn!(%name, %reason, "Energy evaluation returned a foreign geometry.");
        return Ok(Step::Stop(Termination::EvaluationFailed { name, reason }));
    }

    candidate.record_evaluation(evaluation.energy, evaluation.geometry)?;
    debug!(%name, energy = evaluation.energy, "Structure accepted.");
    candidate.send_to_blacklist(&mut state.blacklist);
    state.population.push(candidate);
    if context.reporter.is_enabled() {
        context.reporter.report(Progress::Accepted {
            name: name.clone(),
            energy: evaluation.energy,
        });
    }

    if context.kill_requested() {
        info!(%name, "Kill requested; stopping after this evaluation.");
        return Ok(Step::Stop(Termination::Cancelled));
    }
    Ok(Step::Continue(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tasks::testing::{Fixture, CountingEvaluator};

    #[test]
    fn accepted_structures_are_indexed_and_blacklisted() {
        let fixture = Fixture::new(4, 1);
        let context = fixture.context();
        let mut state = RunState::new();
        let candidate = fixture.random_structure(3);

        let step = accept(&context, &mut state, candidate).unwrap();
        assert_eq!(step, Step::Continue(()));
        assert_eq!(state.population.len(), 1);
        assert_eq!(state.blacklist.len(), 1);
        assert_eq!(state.population[0].index, Some(0));
        assert!(state.population[0].energy.is_some());
        assert_eq!(fixture.evaluator.calls(), 1);
        assert_eq!(state.next_index, 1);
    }

    #[test]
    fn failed_evaluation_stops_the_search() {
        let mut fixture = Fixture::new(4, 1);
        fixture.evaluator.fail_after = Some(0);
        let context = fixture.context();
        let mut state = RunState::new();

        let step = accept(&context, &mut state, fixture.random_structure(5)).unwrap();
        assert_eq!(
            step,
            Step::Stop(Termination::EvaluationFailed {
                name: "structure_0".to_string(),
                reason: CountingEvaluator::REASON.to_string(),
            })
        );
        assert!(state.population.is_empty());
        assert!(state.blacklist.is_empty());
    }

    #[test]
    fn kill_request_stops_after_commit() {
        let mut fixture = Fixture::new(4, 1);
        fixture.kill.after = Some(0);
        let context = fixture.context();
        let mut state = RunState::new();

        let step = accept(&context, &mut state, fixture.random_structure(7)).unwrap();
        assert_eq!(step, Step::Stop(Termination::Cancelled));
        assert_eq!(state.population.len(), 1);
    }
}
