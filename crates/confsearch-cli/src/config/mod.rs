mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_config, load_dof_requests};
pub use models::{AppConfig, EvaluatorSettings};
