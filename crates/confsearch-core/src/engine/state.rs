use crate::core::conformer::blacklist::Blacklist;
use crate::core::conformer::structure::Structure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on checkpoint '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed checkpoint: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Counters of what happened inside the retry loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub evaluations: usize,
    pub invalid_geometries: usize,
    pub duplicates: usize,
    pub clashes: usize,
    pub mutations: usize,
    pub hard_mutations: usize,
    pub crossovers: usize,
    pub copies: usize,
    pub truncated: usize,
}

/// Everything needed to continue a search after an interruption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Sorted by energy once initialization has finished.
    pub population: Vec<Structure>,
    pub blacklist: Blacklist,
    /// Best energy after initialization, then one entry per generation.
    pub min_energy: Vec<f64>,
    /// Number of completed generations.
    pub iteration: usize,
    /// Index handed to the next accepted structure.
    pub next_index: usize,
    pub statistics: RunStatistics,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next structure index; each index is used exactly once.
    pub fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub fn sort_population(&mut self) {
        self.population.sort_by(Structure::energy_ordering);
    }

    /// Sorts the population and drops the worst structures beyond `size`.
    pub fn truncate_population(&mut self, size: usize) -> usize {
        self.sort_population();
        let dropped = self.population.len().saturating_sub(size);
        self.population.truncate(size);
        self.statistics.truncated += dropped;
        dropped
    }

    pub fn best(&self) -> Option<&Structure> {
        self.population
            .iter()
            .filter(|s| s.energy.is_some())
            .min_by(|a, b| Structure::energy_ordering(a, b))
    }

    pub fn best_energy(&self) -> Option<f64> {
        self.best().and_then(|s| s.energy)
    }

    /// Writes the state as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush().map_err(io_err)?;
        }
        fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let file = File::open(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// The retry loop that ran out of trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialization,
    Mutation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization => f.write_str("initialization"),
            Self::Mutation => f.write_str("mutation"),
        }
    }
}

/// Why a search stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Converged,
    MaxIterations,
    Cancelled,
    TrialBudgetExceeded { phase: Phase, trials: usize },
    EvaluationFailed { name: String, reason: String },
}

impl Termination {
    /// Whether the search ended on its own terms rather than by a failure.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterations | Self::Cancelled)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::MaxIterations => f.write_str("maximum number of generations reached"),
            Self::Cancelled => f.write_str("cancelled by kill request"),
            Self::TrialBudgetExceeded { phase, trials } => {
                write!(f, "{phase} gave up after {trials} trials")
            }
            Self::EvaluationFailed { name, reason } => {
                write!(f, "evaluation of {name} failed: {reason}")
            }
        }
    }
}

/// Outcome of one step of the search: go on, or stop for good.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Continue(T),
    Stop(Termination),
}
