use confsearch::core::conformer::validation::DistanceValidator;
use confsearch::core::dof::DofKind;
use confsearch::engine::collaborators::DEFAULT_KILL_FILE;
use confsearch::engine::config::GaConfig;

pub struct DefaultsConfig {
    pub ga: GaConfig,
    pub validator: DistanceValidator,
    pub dofs: Vec<DofKind>,
    pub work_dir: String,
    pub output_file: String,
    pub energy_file: String,
    pub kill_file: String,
    pub chiral: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ga: GaConfig::default(),
            validator: DistanceValidator::default(),
            dofs: vec![DofKind::Torsion],
            work_dir: "confsearch_work".to_string(),
            output_file: "optimized.sdf".to_string(),
            energy_file: "energy.dat".to_string(),
            kill_file: DEFAULT_KILL_FILE.to_string(),
            chiral: true,
        }
    }
}
