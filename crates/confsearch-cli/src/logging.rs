use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Target prefix shared by the library and the binary.
const SEARCH_TARGET: &str = "confsearch";

/// The level requested with `-v` flags, or errors only under `--quiet`.
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Search events at `level`; dependencies never go below warnings.
fn console_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_target(SEARCH_TARGET, level)
}

/// The log file always keeps per-structure detail, whatever the console shows.
fn file_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target(SEARCH_TARGET, level.max(LevelFilter::DEBUG))
}

/// A plain-text layer writing to `path`, closing each evaluation span with its timing.
fn file_layer(path: &Path, level: LevelFilter) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let file = File::create(path)?;
    Ok(fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_filter(level))
        .boxed())
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = level_filter(verbosity, quiet);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter(level));
    let file = log_file.map(|path| file_layer(path, level)).transpose()?;

    tracing_subscriber::registry()
        .with(file)
        .with(console)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use tracing::{Level, debug, info_span};

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::ERROR);
    }

    #[test]
    fn console_follows_verbosity_for_search_events_only() {
        let verbose = console_filter(LevelFilter::DEBUG);
        assert!(verbose.would_enable("confsearch::engine::tasks", &Level::DEBUG));
        assert!(!verbose.would_enable("indicatif", &Level::INFO));
        assert!(verbose.would_enable("indicatif", &Level::WARN));

        let quiet = console_filter(level_filter(0, true));
        assert!(!quiet.would_enable("confsearch::workflows::search", &Level::WARN));
        assert!(!quiet.would_enable("indicatif", &Level::WARN));
        assert!(quiet.would_enable("confsearch", &Level::ERROR));
    }

    #[test]
    fn file_keeps_debug_detail_at_default_verbosity() {
        let filter = file_filter(LevelFilter::WARN);
        assert!(filter.would_enable("confsearch::evaluator", &Level::DEBUG));
        assert!(!filter.would_enable("confsearch::evaluator", &Level::TRACE));
        assert!(!filter.would_enable("rand", &Level::DEBUG));
    }

    #[test]
    #[serial]
    fn file_layer_records_generations_and_evaluation_spans() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("search.log");

        let subscriber =
            tracing_subscriber::registry().with(file_layer(&log_path, LevelFilter::WARN).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "confsearch::workflows::search", generation = 3, "Generation finished.");
            debug!(target: "rand", "unrelated noise");
            info_span!(target: "confsearch::evaluator", "evaluate", structure = "structure_2")
                .in_scope(|| {});
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Generation finished."));
        assert!(content.contains("generation=3"));
        assert!(!content.contains("unrelated noise"));
        assert!(content.contains("structure_2"));
        assert!(content.contains("close"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(&invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
