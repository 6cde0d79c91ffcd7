use confsearch::core::conformer::molecule::DofRequest;
use confsearch::core::conformer::validation::DistanceValidator;
use confsearch::core::models::geometry::BoundingBox;
use confsearch::engine::config::SearchConfig;
use std::path::PathBuf;

/// How the external energy program is invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorSettings {
    pub command: String,
    pub work_dir: PathBuf,
    pub output_file: String,
    pub energy_file: String,
}

pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub population_path: Option<PathBuf>,
    pub surroundings_path: Option<PathBuf>,
    pub restart_path: Option<PathBuf>,
    pub kill_file: PathBuf,
    pub dof_requests: Vec<DofRequest>,
    pub volume: Option<BoundingBox>,
    pub validator: DistanceValidator,
    pub evaluator: EvaluatorSettings,
    pub search: SearchConfig,
}
