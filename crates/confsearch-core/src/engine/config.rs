use crate::core::conformer::settings::{MutationConfig, SimilarityThresholds};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    RouletteWheel,
    Random,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouletteWheel => f.write_str("roulette_wheel"),
            Self::Random => f.write_str("random"),
        }
    }
}

impl FromStr for SelectionMethod {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "roulette_wheel" | "roulette" => Ok(Self::RouletteWheel),
            "random" => Ok(Self::Random),
            other => Err(ConfigError::InvalidParameter {
                name: "selection",
                reason: format!("unknown selection method '{other}'"),
            }),
        }
    }
}

/// Parameters of the generational loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaConfig {
    /// Energy spread below which every individual gets the same fitness.
    pub energy_var: f64,
    pub selection: SelectionMethod,
    /// Total fitness at or below which roulette sampling degrades to a uniform draw.
    pub fitness_sum_limit: f64,
    pub popsize: usize,
    pub prob_for_crossing: f64,
    pub max_iter: usize,
    /// Number of generations the best energy must stay flat to converge.
    pub iter_limit_conv: usize,
    pub energy_diff_conv: f64,
    /// Trial budget of every retry loop.
    pub cnt_max: usize,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            energy_var: 0.001,
            selection: SelectionMethod::RouletteWheel,
            fitness_sum_limit: 1.2,
            popsize: 10,
            prob_for_crossing: 1.0,
            max_iter: 30,
            iter_limit_conv: 20,
            energy_diff_conv: 0.001,
            cnt_max: 2500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub ga: GaConfig,
    pub mutation: MutationConfig,
    pub similarity: SimilarityThresholds,
    /// When false, mirror images count as duplicates.
    pub chiral: bool,
    pub seed: Option<u64>,
    pub checkpoint_path: Option<PathBuf>,
}

#[derive(Default)]
pub struct SearchConfigBuilder {
    popsize: Option<usize>,
    max_iter: Option<usize>,
    cnt_max: Option<usize>,
    energy_var: Option<f64>,
    selection: Option<SelectionMethod>,
    fitness_sum_limit: Option<f64>,
    prob_for_crossing: Option<f64>,
    iter_limit_conv: Option<usize>,
    energy_diff_conv: Option<f64>,
    mutation: Option<MutationConfig>,
    similarity: Option<SimilarityThresholds>,
    chiral: Option<bool>,
    seed: Option<u64>,
    checkpoint_path: Option<PathBuf>,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn popsize(mut self, popsize: usize) -> Self {
        self.popsize = Some(popsize);
        self
    }
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }
    pub fn cnt_max(mut self, cnt_max: usize) -> Self {
        self.cnt_max = Some(cnt_max);
        self
    }
    pub fn energy_var(mut self, energy_var: f64) -> Self {
        self.energy_var = Some(energy_var);
        self
    }
    pub fn selection(mut self, method: SelectionMethod) -> Self {
        self.selection = Some(method);
        self
    }
    pub fn fitness_sum_limit(mut self, limit: f64) -> Self {
        self.fitness_sum_limit = Some(limit);
        self
    }
    pub fn prob_for_crossing(mut self, probability: f64) -> Self {
        self.prob_for_crossing = Some(probability);
        self
    }
    pub fn iter_limit_conv(mut self, generations: usize) -> Self {
        self.iter_limit_conv = Some(generations);
        self
    }
    pub fn energy_diff_conv(mut self, difference: f64) -> Self {
        self.energy_diff_conv = Some(difference);
        self
    }
    pub fn mutation(mut self, mutation: MutationConfig) -> Self {
        self.mutation = Some(mutation);
        self
    }
    pub fn similarity(mut self, similarity: SimilarityThresholds) -> Self {
        self.similarity = Some(similarity);
        self
    }
    pub fn chiral(mut self, chiral: bool) -> Self {
        self.chiral = Some(chiral);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn checkpoint_path(mut self, path: Option<PathBuf>) -> Self {
        self.checkpoint_path = path;
        self
    }

    /// Builds the configuration. Population size and generation count are
    /// required; everything else falls back to the GA defaults.
    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let defaults = GaConfig::default();
        let ga = GaConfig {
            popsize: self
                .popsize
                .ok_or(ConfigError::MissingParameter("popsize"))?,
            max_iter: self
                .max_iter
                .ok_or(ConfigError::MissingParameter("max_iter"))?,
            cnt_max: self.cnt_max.unwrap_or(defaults.cnt_max),
            energy_var: self.energy_var.unwrap_or(defaults.energy_var),
            selection: self.selection.unwrap_or(defaults.selection),
            fitness_sum_limit: self.fitness_sum_limit.unwrap_or(defaults.fitness_sum_limit),
            prob_for_crossing: self.prob_for_crossing.unwrap_or(defaults.prob_for_crossing),
            iter_limit_conv: self.iter_limit_conv.unwrap_or(defaults.iter_limit_conv),
            energy_diff_conv: self.energy_diff_conv.unwrap_or(defaults.energy_diff_conv),
        };
        validate(&ga)?;

        Ok(SearchConfig {
            ga,
            mutation: self.mutation.unwrap_or_default(),
            similarity: self.similarity.unwrap_or_default(),
            chiral: self.chiral.unwrap_or(true),
            seed: self.seed,
            checkpoint_path: self.checkpoint_path,
        })
    }
}

fn validate(ga: &GaConfig) -> Result<(), ConfigError> {
    if ga.popsize < 2 {
        return Err(ConfigError::InvalidParameter {
            name: "popsize",
            reason: "at least two individuals are needed to select parents".to_string(),
        });
    }
    if ga.cnt_max == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "cnt_max",
            reason: "the trial budget must be positive".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&ga.prob_for_crossing) {
        return Err(ConfigError::InvalidParameter {
            name: "prob_for_crossing",
            reason: format!("{} is not a probability", ga.prob_for_crossing),
        });
    }
    if ga.iter_limit_conv == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "iter_limit_conv",
            reason: "must be at least one generation".to_string(),
        });
    }
    Ok(())
}
