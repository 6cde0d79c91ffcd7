use crate::config::EvaluatorSettings;
use confsearch::core::io::sdf::{SdfFile, SdfMetadata};
use confsearch::core::io::traits::MolecularFile;
use confsearch::core::models::geometry::Geometry;
use confsearch::engine::collaborators::{EnergyEvaluator, Evaluation, EvaluationError};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, instrument, warn};

/// Name of the structure written for the energy command to relax.
pub const INPUT_FILE: &str = "input.sdf";

/// Relaxes structures with an external program run through `sh -c`.
///
/// Each structure gets its own directory `work_dir/<name>` containing
/// [`INPUT_FILE`]. The command must leave the relaxed structure in
/// `output_file` and the energy as the last number of `energy_file`; when the
/// energy file is missing, an `energy` data item of the relaxed SDF is used.
pub struct CommandEvaluator {
    settings: EvaluatorSettings,
}

impl CommandEvaluator {
    pub fn new(settings: EvaluatorSettings) -> Self {
        Self { settings }
    }

    fn read_energy(&self, dir: &Path, metadata: &SdfMetadata) -> Option<f64> {
        match fs::read_to_string(dir.join(&self.settings.energy_file)) {
            Ok(content) => last_number(&content),
            Err(_) => metadata
                .property("energy")
                .and_then(|value| value.trim().parse().ok()),
        }
    }
}

impl EnergyEvaluator for CommandEvaluator {
    #[instrument(skip_all, fields(structure = name))]
    fn evaluate(&self, geometry: &Geometry, name: &str) -> Result<Evaluation, EvaluationError> {
        let failed = |reason: String| EvaluationError::Failed {
            name: name.to_string(),
            reason,
        };

        let dir = self.settings.work_dir.join(name);
        fs::create_dir_all(&dir)
            .map_err(|e| failed(format!("cannot create {}: {}", dir.display(), e)))?;
        SdfFile::write_to_path(geometry, &SdfMetadata::new(name), dir.join(INPUT_FILE))
            .map_err(|e| failed(format!("cannot write {}: {}", INPUT_FILE, e)))?;

        debug!(command = %self.settings.command, dir = %dir.display(), "Running energy command.");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.settings.command)
            .current_dir(&dir)
            .output()
            .map_err(|e| failed(format!("cannot start the shell: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let relaxed_path = dir.join(&self.settings.output_file);
        if !relaxed_path.exists() {
            warn!(path = %relaxed_path.display(), "Energy command left no relaxed structure.");
            return Err(EvaluationError::NotConverged {
                name: name.to_string(),
            });
        }
        let (compact, metadata) = SdfFile::read_from_path(&relaxed_path)
            .map_err(|e| failed(format!("cannot read {}: {}", relaxed_path.display(), e)))?;

        let mut relaxed = geometry.clone();
        if !relaxed.adopt_active_positions(&compact) {
            return Err(failed(format!(
                "{} has {} atoms, expected {}",
                self.settings.output_file,
                compact.len(),
                geometry.active_atoms().count()
            )));
        }

        let energy = self
            .read_energy(&dir, &metadata)
            .ok_or_else(|| failed(format!("no energy in {}", self.settings.energy_file)))?;
        debug!(energy, "Structure relaxed.");

        Ok(Evaluation {
            energy,
            geometry: relaxed,
        })
    }
}

/// The last finite number among the whitespace-separated tokens of `text`.
pub fn last_number(text: &str) -> Option<f64> {
    text.split_whitespace()
        .rev()
        .filter_map(|token| {
            token
                .trim_matches(|c: char| c == ',' || c == ';')
                .parse::<f64>()
                .ok()
        })
        .find(|value| value.is_finite())
}
