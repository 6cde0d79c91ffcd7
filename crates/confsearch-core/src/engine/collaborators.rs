//! Contracts for everything the search delegates to its caller, with the
//! built-in implementations.

use super::config::GaConfig;
use crate::core::models::geometry::Geometry;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub use crate::core::conformer::validation::{DistanceValidator, GeometryValidator};

/// The caller-supplied implementations a search delegates to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub evaluator: &'a dyn EnergyEvaluator,
    pub validator: &'a dyn GeometryValidator,
    pub kill_switch: &'a dyn KillSwitch,
    pub convergence: &'a dyn ConvergencePolicy,
    pub fitness: &'a dyn FitnessTransform,
}

/// Result of an external relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub energy: f64,
    /// Relaxed geometry with the same atoms, in the same order, as the input.
    pub geometry: Geometry,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Relaxation of '{name}' did not converge")]
    NotConverged { name: String },
    #[error("Evaluation of '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

impl EvaluationError {
    /// The cause without the structure name, which the caller already knows.
    pub fn reason(&self) -> String {
        match self {
            Self::NotConverged { .. } => "relaxation did not converge".to_string(),
            Self::Failed { reason, .. } => reason.clone(),
        }
    }
}

/// Relaxes a geometry and reports its energy. Calls may block for a long time.
pub trait EnergyEvaluator {
    fn evaluate(&self, geometry: &Geometry, name: &str) -> Result<Evaluation, EvaluationError>;
}

/// Cooperative cancellation signal.
pub trait KillSwitch {
    fn kill_requested(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverKill;

impl KillSwitch for NeverKill {
    fn kill_requested(&self) -> bool {
        false
    }
}

pub const DEFAULT_KILL_FILE: &str = "kill.dat";

/// Requests cancellation when a file appears on disk.
#[derive(Debug, Clone)]
pub struct FileKillSwitch {
    path: PathBuf,
}

impl FileKillSwitch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileKillSwitch {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_FILE)
    }
}

impl KillSwitch for FileKillSwitch {
    fn kill_requested(&self) -> bool {
        let requested = self.path.exists();
        if requested {
            info!(path = %self.path.display(), "Kill file found.");
        }
        requested
    }
}

/// Decides when the best energy has stopped improving.
pub trait ConvergencePolicy {
    /// `iteration` is the zero-based generation just completed; `min_energy`
    /// holds the initial best followed by one entry per completed generation.
    fn has_converged(&self, iteration: usize, min_energy: &[f64]) -> bool;
}

/// Converged once the best energy changed by less than `energy_diff` over
/// the last `generations` generations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPlateau {
    pub generations: usize,
    pub energy_diff: f64,
}

impl EnergyPlateau {
    pub fn new(generations: usize, energy_diff: f64) -> Self {
        Self {
            generations,
            energy_diff,
        }
    }

    pub fn from_config(ga: &GaConfig) -> Self {
        Self::new(ga.iter_limit_conv, ga.energy_diff_conv)
    }
}

impl ConvergencePolicy for EnergyPlateau {
    fn has_converged(&self, iteration: usize, min_energy: &[f64]) -> bool {
        if iteration == 0 || self.generations == 0 || iteration + 1 < self.generations {
            return false;
        }
        let latest = iteration + 1;
        match (min_energy.get(latest - self.generations), min_energy.get(latest)) {
            (Some(earlier), Some(now)) => (earlier - now).abs() < self.energy_diff,
            _ => false,
        }
    }
}

/// Maps energies to selection weights; lower energy must never get a lower weight.
pub trait FitnessTransform {
    fn fitness(&self, energies: &[f64]) -> Vec<f64>;
}

/// Linear map of the energy range onto `[0, 1]`, best = 1, worst = 0.
///
/// When the spread is not above `energy_var` every individual gets fitness 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFitness {
    pub energy_var: f64,
}

impl LinearFitness {
    pub fn new(energy_var: f64) -> Self {
        Self { energy_var }
    }
}

impl FitnessTransform for LinearFitness {
    fn fitness(&self, energies: &[f64]) -> Vec<f64> {
        let min = energies.iter().copied().fold(f64::INFINITY, f64::min);
        let max = energies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;
        if !spread.is_finite() || spread <= self.energy_var {
            return vec![1.0; energies.len()];
        }
        energies.iter().map(|e| (max - e) / spread).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn kill_file_is_polled() {
        let dir = tempdir().unwrap();
        let switch = FileKillSwitch::new(dir.path().join("kill.dat"));
        assert!(!switch.kill_requested());
        std::fs::write(switch.path(), "").unwrap();
        assert!(switch.kill_requested());
        assert!(!NeverKill.kill_requested());
    }

    #[test]
    fn evaluation_reason_omits_the_structure_name() {
        let failed = EvaluationError::Failed {
            name: "structure_1".to_string(),
            reason: "exit status 2".to_string(),
        };
        assert_eq!(failed.reason(), "exit status 2");
        assert_eq!(failed.to_string(), "Evaluation of 'structure_1' failed: exit status 2");
        let stalled = EvaluationError::NotConverged {
            name: "structure_1".to_string(),
        };
        assert_eq!(stalled.reason(), "relaxation did not converge");
    }

    #[test]
    fn plateau_needs_enough_history() {
        let policy = EnergyPlateau::new(2, 0.01);
        assert!(!policy.has_converged(0, &[-1.0, -1.0]));
        assert!(policy.has_converged(1, &[-1.0, -1.0, -1.0]));
        assert!(!policy.has_converged(1, &[-1.0, -1.0, -2.0]));
    }

    #[test]
    fn plateau_compares_across_the_window() {
        let policy = EnergyPlateau::new(3, 0.01);
        let history = [-1.0, -2.0, -3.0, -3.0, -3.0];
        assert!(!policy.has_converged(2, &history[..4]));
        assert!(!policy.has_converged(3, &history));
        let flat = [-1.0, -3.0, -3.0, -3.0, -3.0];
        assert!(policy.has_converged(3, &flat));
    }

    #[test]
    fn linear_fitness_is_monotonic() {
        let fitness = LinearFitness::new(0.001).fitness(&[-3.0, -1.0, 1.0]);
        assert_eq!(fitness, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn flat_energies_get_uniform_fitness() {
        let fitness = LinearFitness::new(0.001).fitness(&[-2.0, -2.0005]);
        assert_eq!(fitness, vec![1.0, 1.0]);
    }
}
