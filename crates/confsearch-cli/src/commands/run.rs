use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::evaluator::CommandEvaluator;
use crate::utils::progress::CliProgressHandler;
use confsearch::core::conformer::molecule::Molecule;
use confsearch::core::conformer::structure::Structure;
use confsearch::core::io::sdf::{SdfFile, SdfMetadata};
use confsearch::core::io::traits::MolecularFile;
use confsearch::core::models::geometry::Geometry;
use confsearch::core::topology::locator::TopologyLocator;
use confsearch::engine::collaborators::{
    Collaborators, EnergyPlateau, FileKillSwitch, LinearFitness,
};
use confsearch::engine::progress::ProgressReporter;
use confsearch::engine::state::RunState;
use confsearch::workflows::{self, search::SearchOutcome};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;

    info!("Loading template molecule from {:?}", &app.input_path);
    let (template, metadata) = read_sdf(&app.input_path)?;
    let molecule = prepare_molecule(&app, template)?;

    let resume = match &app.restart_path {
        Some(path) => {
            info!("Loading checkpoint from {:?}", path);
            Some(RunState::load(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?)
        }
        None => None,
    };

    let evaluator = CommandEvaluator::new(app.evaluator.clone());
    let kill_switch = FileKillSwitch::new(&app.kill_file);
    let convergence = EnergyPlateau::from_config(&app.search.ga);
    let fitness = LinearFitness::new(app.search.ga.energy_var);
    let collaborators = Collaborators {
        evaluator: &evaluator,
        validator: &app.validator,
        kill_switch: &kill_switch,
        convergence: &convergence,
        fitness: &fitness,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting conformer search over {} degree(s) of freedom...",
        molecule.dofs.len()
    );
    info!("Invoking the core search workflow...");
    let outcome = workflows::search::run(&molecule, &app.search, collaborators, &reporter, resume)?;

    write_results(&app, &metadata, &outcome)?;

    if outcome.termination.is_success() {
        println!("Search finished: {}.", outcome.termination);
        Ok(())
    } else {
        Err(CliError::SearchFailed(outcome.termination.to_string()))
    }
}

fn read_sdf(path: &Path) -> Result<(Geometry, SdfMetadata)> {
    SdfFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn prepare_molecule(app: &AppConfig, template: Geometry) -> Result<Molecule> {
    let mut molecule = Molecule::new(template, &app.dof_requests, &TopologyLocator)?;
    if let Some(path) = &app.surroundings_path {
        info!("Loading surroundings from {:?}", path);
        let (surroundings, _) = read_sdf(path)?;
        molecule = molecule.with_surroundings(surroundings);
    }
    if let Some(volume) = app.volume {
        molecule = molecule.with_volume(volume);
    }
    Ok(molecule)
}

fn structure_metadata(template: &SdfMetadata, structure: &Structure) -> SdfMetadata {
    let title = if template.title.is_empty() {
        structure.name()
    } else {
        format!("{} {}", template.title, structure.name())
    };
    let mut metadata = SdfMetadata::new(title);
    if let Some(energy) = structure.energy {
        metadata = metadata.with_property("energy", energy);
    }
    metadata
}

fn write_results(app: &AppConfig, template: &SdfMetadata, outcome: &SearchOutcome) -> Result<()> {
    let Some(best) = outcome.best() else {
        warn!("Search stopped before any structure was evaluated.");
        println!("Warning: no structure was evaluated; nothing written.");
        return Ok(());
    };

    info!(
        "Writing best structure {} (Energy: {:?}) to {:?}",
        best.name(),
        best.energy,
        &app.output_path
    );
    write_structures(&app.output_path, template, std::slice::from_ref(best))?;
    if let Some(energy) = best.energy {
        println!(
            "✓ Best structure {} (Energy: {:.4}) written to: {}",
            best.name(),
            energy,
            app.output_path.display()
        );
    }

    if let Some(path) = &app.population_path {
        write_structures(path, template, &outcome.state.population)?;
        println!(
            "  Final population ({} structures) written to: {}",
            outcome.state.population.len(),
            path.display()
        );
    }
    Ok(())
}

/// Writes `structures` as consecutive records of one SDF file.
fn write_structures(path: &Path, template: &SdfMetadata, structures: &[Structure]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for structure in structures {
        SdfFile::write_to(
            &structure.geometry,
            &structure_metadata(template, structure),
            &mut writer,
        )
        .map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use confsearch::core::conformer::molecule::DofRequest;
    use confsearch::core::dof::DofKind;
    use std::fs;
    use tempfile::tempdir;

    const BUTANE: &str = "\
butane
  test

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    1.4000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4000   -1.4000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  2  3  1  0  0  0  0
  3  4  1  0  0  0  0
M  END
$$$$
";

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["confsearch", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn search_writes_best_structure_and_population() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("butane.sdf");
        fs::write(&input, BUTANE).unwrap();
        let output = dir.path().join("best.sdf");
        let population = dir.path().join("population.sdf");
        let checkpoint = dir.path().join("state.json");
        let work = dir.path().join("work");

        let args = run_args(&[
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--population",
            population.to_str().unwrap(),
            "--checkpoint",
            checkpoint.to_str().unwrap(),
            "-w",
            work.to_str().unwrap(),
            "--kill-file",
            dir.path().join("kill.dat").to_str().unwrap(),
            "--command",
            "cp input.sdf optimized.sdf && echo 1.0 > energy.dat",
            "--seed",
            "5",
            "-p",
            "2",
            "-n",
            "1",
            "-S",
            "ga.cnt-max=200",
        ]);
        run(args).unwrap();

        let best = fs::read_to_string(&output).unwrap();
        assert!(best.starts_with("butane structure_"));
        assert!(best.contains("> <energy>\n1\n"));
        let records = fs::read_to_string(&population).unwrap();
        assert_eq!(records.matches("$$$$").count(), 2);
        assert!(checkpoint.exists());
        assert!(work.join("structure_0").join("input.sdf").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_evaluation_is_reported_as_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("butane.sdf");
        fs::write(&input, BUTANE).unwrap();

        let args = run_args(&[
            "-i",
            input.to_str().unwrap(),
            "-o",
            dir.path().join("best.sdf").to_str().unwrap(),
            "-w",
            dir.path().join("work").to_str().unwrap(),
            "--command",
            "exit 1",
            "-p",
            "2",
            "-n",
            "1",
        ]);
        let err = run(args).unwrap_err();
        assert!(matches!(err, CliError::SearchFailed(msg) if msg.contains("structure_0")));
    }

    #[test]
    fn molecule_without_sites_is_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("butane.sdf");
        fs::write(&input, BUTANE).unwrap();

        let args = run_args(&[
            "-i",
            input.to_str().unwrap(),
            "-o",
            dir.path().join("best.sdf").to_str().unwrap(),
            "--command",
            "true",
            "-S",
            "evaluator.work-dir=unused",
        ]);
        let mut app = build_config(&args).unwrap();
        app.dof_requests = vec![DofRequest::new(DofKind::PyranoseRing)];
        let (template, _) = read_sdf(&input).unwrap();
        let err = prepare_molecule(&app, template).unwrap_err();
        assert!(matches!(err, CliError::Molecule(_)));
    }
}
