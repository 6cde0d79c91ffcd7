use super::config::ConfigError;
use super::state::CheckpointError;
use super::utils::selection::SelectionError;
use crate::core::dof::DofError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to apply a degree of freedom: {source}")]
    Dof {
        #[from]
        source: DofError,
    },

    #[error("Parent selection failed: {source}")]
    Selection {
        #[from]
        source: SelectionError,
    },

    #[error("Checkpoint error: {source}")]
    Checkpoint {
        #[from]
        source: CheckpointError,
    },

    #[error("Saved run state does not match the molecule: {0}")]
    IncompatibleState(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
