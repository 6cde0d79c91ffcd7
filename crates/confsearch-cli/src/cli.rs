use clap::{Args, Parser, Subcommand};
use confsearch::core::dof::DofKind;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "confsearch CLI - genetic-algorithm conformer search driven by an external energy program.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the conformer space of a molecule with a genetic algorithm.
    Run(RunArgs),
    /// List the degrees of freedom discovered on a molecule, without searching.
    Dofs(DofsArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Template molecule in MDL SDF (V2000) format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// SDF file receiving the lowest-energy structure.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write the final population, best first, as a multi-record SDF.
    #[arg(long, value_name = "PATH")]
    pub population: Option<PathBuf>,

    /// Fixed atoms (e.g. a binding pocket) the molecule must not clash with.
    #[arg(long, value_name = "PATH")]
    pub surroundings: Option<PathBuf>,

    // --- Evaluator Overrides ---
    /// Shell command relaxing `input.sdf` in each structure directory.
    #[arg(long = "command", value_name = "CMD")]
    pub command: Option<String>,

    /// Directory holding one sub-directory per evaluated structure.
    #[arg(short, long, value_name = "PATH")]
    pub work_dir: Option<PathBuf>,

    // --- Run Control ---
    /// Resume from a checkpoint written by a previous run.
    #[arg(short, long, value_name = "PATH")]
    pub restart: Option<PathBuf>,

    /// Write a checkpoint after every generation.
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// The search stops after the current evaluation once this file exists.
    #[arg(long, value_name = "PATH")]
    pub kill_file: Option<PathBuf>,

    /// Seed for a reproducible search.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- GA Overrides ---
    /// Override the population size.
    #[arg(short, long, value_name = "INT")]
    pub popsize: Option<usize>,

    /// Override the maximum number of generations.
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_iter: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S ga.cnt-max=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `dofs` subcommand.
#[derive(Args, Debug)]
pub struct DofsArgs {
    /// Molecule in MDL SDF (V2000) format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Configuration file whose `[[dof]]` tables select kinds and positions.
    #[arg(short, long, value_name = "PATH", conflicts_with = "kind")]
    pub config: Option<PathBuf>,

    /// Only look for these kinds. Defaults to every kind.
    #[arg(short, long, value_name = "KIND", num_args(1..))]
    pub kind: Vec<DofKind>,
}
