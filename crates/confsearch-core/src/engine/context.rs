use super::collaborators::{Collaborators, GeometryValidator};
use super::config::SearchConfig;
use super::progress::ProgressReporter;
use crate::core::conformer::molecule::Molecule;

#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub molecule: &'a Molecule,
    pub config: &'a SearchConfig,
    pub collaborators: Collaborators<'a>,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        molecule: &'a Molecule,
        config: &'a SearchConfig,
        collaborators: Collaborators<'a>,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            molecule,
            config,
            collaborators,
            reporter,
        }
    }

    pub fn validator(&self) -> &'a dyn GeometryValidator {
        self.collaborators.validator
    }

    pub fn kill_requested(&self) -> bool {
        self.collaborators.kill_switch.kill_requested()
    }
}
