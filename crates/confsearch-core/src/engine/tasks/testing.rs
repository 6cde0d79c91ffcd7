//! Shared fixtures for task and workflow tests.

use crate::core::conformer::molecule::Molecule;
use crate::core::conformer::molecule::tests::pentane_molecule;
use crate::core::conformer::settings::MutationConfig;
use crate::core::conformer::structure::Structure;
use crate::core::conformer::structure::tests::AcceptAll;
use crate::core::dof::DofKind;
use crate::core::models::geometry::Geometry;
use crate::engine::collaborators::{
    Collaborators, EnergyEvaluator, EnergyPlateau, Evaluation, EvaluationError, GeometryValidator,
    KillSwitch, LinearFitness,
};
use crate::engine::config::{SearchConfig, SearchConfigBuilder};
use crate::engine::context::SearchContext;
use crate::engine::progress::ProgressReporter;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::Cell;

/// Scores a geometry by the distance between its first and fifth atom and
/// returns it unchanged.
#[derive(Default)]
pub(crate) struct CountingEvaluator {
    calls: Cell<usize>,
    /// Fails every call once this many calls have succeeded.
    pub fail_after: Option<usize>,
}

impl CountingEvaluator {
    pub const REASON: &'static str = "scripted failure";

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl EnergyEvaluator for CountingEvaluator {
    fn evaluate(&self, geometry: &Geometry, name: &str) -> Result<Evaluation, EvaluationError> {
        let done = self.calls.get();
        self.calls.set(done + 1);
        if self.fail_after.is_some_and(|limit| done >= limit) {
            return Err(EvaluationError::Failed {
                name: name.to_string(),
                reason: Self::REASON.to_string(),
            });
        }
        let energy = (geometry.position(0) - geometry.position(4)).norm();
        Ok(Evaluation {
            energy,
            geometry: geometry.clone(),
        })
    }
}

/// Requests a kill from the given poll on.
#[derive(Default)]
pub(crate) struct CountingKill {
    polls: Cell<usize>,
    pub after: Option<usize>,
}

impl KillSwitch for CountingKill {
    fn kill_requested(&self) -> bool {
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        self.after.is_some_and(|after| polls >= after)
    }
}

/// Rejects every geometry.
pub(crate) struct RejectAll;

impl GeometryValidator for RejectAll {
    fn is_valid(&self, _geometry: &Geometry) -> bool {
        false
    }

    fn has_clash(&self, _geometry: &Geometry, _surroundings: &Geometry) -> bool {
        false
    }
}

pub(crate) struct Fixture {
    pub molecule: Molecule,
    pub config: SearchConfig,
    pub evaluator: CountingEvaluator,
    pub validator: Box<dyn GeometryValidator>,
    pub kill: CountingKill,
    pub convergence: EnergyPlateau,
    pub fitness: LinearFitness,
    pub reporter: ProgressReporter<'static>,
}

impl Fixture {
    /// Pentane with its torsions as the only degree of freedom.
    pub fn new(popsize: usize, max_iter: usize) -> Self {
        let config = SearchConfigBuilder::new()
            .popsize(popsize)
            .max_iter(max_iter)
            .cnt_max(50)
            .seed(Some(2024))
            .build()
            .unwrap();
        Self {
            molecule: pentane_molecule(&[DofKind::Torsion]),
            convergence: EnergyPlateau::from_config(&config.ga),
            fitness: LinearFitness::new(config.ga.energy_var),
            config,
            evaluator: CountingEvaluator::default(),
            validator: Box::new(AcceptAll),
            kill: CountingKill::default(),
            reporter: ProgressReporter::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            evaluator: &self.evaluator,
            validator: self.validator.as_ref(),
            kill_switch: &self.kill,
            convergence: &self.convergence,
            fitness: &self.fitness,
        }
    }

    pub fn context(&self) -> SearchContext<'_> {
        SearchContext::new(&self.molecule, &self.config, self.collaborators(), &self.reporter)
    }

    pub fn random_structure(&self, seed: u64) -> Structure {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut structure = self.molecule.new_structure();
        structure
            .generate_structure(&self.molecule, &MutationConfig::default(), &AcceptAll, &mut rng)
            .unwrap();
        structure
    }
}
