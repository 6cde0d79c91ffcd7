use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGaConfig {
    pub popsize: Option<usize>,
    pub max_iter: Option<usize>,
    pub cnt_max: Option<usize>,
    pub energy_var: Option<f64>,
    pub selection: Option<String>,
    pub fitness_sum_limit: Option<f64>,
    pub prob_for_crossing: Option<f64>,
    pub iter_limit_conv: Option<usize>,
    pub energy_diff_conv: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSearchConfig {
    pub seed: Option<u64>,
    pub chiral: Option<bool>,
    pub checkpoint: Option<PathBuf>,
    pub kill_file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEvaluatorConfig {
    pub command: Option<String>,
    pub work_dir: Option<PathBuf>,
    /// Relaxed structure written by the command, relative to its directory.
    pub output_file: Option<String>,
    /// File whose last number is the energy, relative to the command directory.
    pub energy_file: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileValidationConfig {
    pub min_nonbonded_distance: Option<f64>,
    pub max_bond_length: Option<f64>,
    pub crossover_factor: Option<f64>,
    pub clash_distance: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileVolumeConfig {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// One `[[dof]]` table. Atom numbers are 1-based, as in the SDF atom block.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDofConfig {
    pub kind: String,
    pub positions: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub exclude_bonds: Vec<[usize; 2]>,
    /// Centroid grid per axis as `[min, max]`.
    pub ranges: Option<[[i32; 2]; 3]>,
    /// Orientation rotation angles in degrees.
    pub angles: Option<Vec<f64>>,
    pub probability: Option<f64>,
    pub max_mutations: Option<usize>,
    pub weights: Option<Vec<f64>>,
    pub similarity: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub ga: Option<FileGaConfig>,
    pub search: Option<FileSearchConfig>,
    pub evaluator: Option<FileEvaluatorConfig>,
    pub validation: Option<FileValidationConfig>,
    pub volume: Option<FileVolumeConfig>,
    #[serde(default, rename = "dof")]
    pub dofs: Vec<FileDofConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
