use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileDofConfig, FileEvaluatorConfig, FileGaConfig, FileSearchConfig,
    FileValidationConfig,
};
use super::models::{AppConfig, EvaluatorSettings};
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use confsearch::core::conformer::molecule::DofRequest;
use confsearch::core::conformer::settings::{
    MutationConfig, MutationSettings, SimilarityThresholds,
};
use confsearch::core::conformer::validation::DistanceValidator;
use confsearch::core::dof::DofKind;
use confsearch::core::models::geometry::BoundingBox;
use confsearch::engine::config::{SearchConfigBuilder, SelectionMethod};
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

struct DofSetup {
    requests: Vec<DofRequest>,
    mutation: MutationConfig,
    similarity: SimilarityThresholds,
}

/// Merges command-line arguments, `--set` values, the TOML file and the
/// defaults, in that order of precedence.
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let ga_file = file_config.ga.take().unwrap_or_default();
    let search_file = file_config.search.take().unwrap_or_default();
    let evaluator_file = file_config.evaluator.take().unwrap_or_default();
    let validation_file = file_config.validation.take().unwrap_or_default();

    let selection = match ga_file.selection.as_deref() {
        Some(name) => {
            SelectionMethod::from_str(name).map_err(|e| CliError::Config(e.to_string()))?
        }
        None => defaults.ga.selection,
    };
    let dofs = build_dofs(&file_config.dofs, &defaults)?;

    let search = SearchConfigBuilder::new()
        .popsize(
            args.popsize
                .or(ga_file.popsize)
                .unwrap_or(defaults.ga.popsize),
        )
        .max_iter(
            args.max_iter
                .or(ga_file.max_iter)
                .unwrap_or(defaults.ga.max_iter),
        )
        .cnt_max(ga_file.cnt_max.unwrap_or(defaults.ga.cnt_max))
        .energy_var(ga_file.energy_var.unwrap_or(defaults.ga.energy_var))
        .selection(selection)
        .fitness_sum_limit(
            ga_file
                .fitness_sum_limit
                .unwrap_or(defaults.ga.fitness_sum_limit),
        )
        .prob_for_crossing(
            ga_file
                .prob_for_crossing
                .unwrap_or(defaults.ga.prob_for_crossing),
        )
        .iter_limit_conv(ga_file.iter_limit_conv.unwrap_or(defaults.ga.iter_limit_conv))
        .energy_diff_conv(
            ga_file
                .energy_diff_conv
                .unwrap_or(defaults.ga.energy_diff_conv),
        )
        .mutation(dofs.mutation)
        .similarity(dofs.similarity)
        .chiral(search_file.chiral.unwrap_or(defaults.chiral))
        .seed(args.seed.or(search_file.seed))
        .checkpoint_path(args.checkpoint.clone().or(search_file.checkpoint))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let command = args.command.clone().or(evaluator_file.command).ok_or_else(|| {
        CliError::Config(
            "No energy command given; pass --command or set `evaluator.command`".to_string(),
        )
    })?;
    let evaluator = EvaluatorSettings {
        command,
        work_dir: args
            .work_dir
            .clone()
            .or(evaluator_file.work_dir)
            .unwrap_or_else(|| PathBuf::from(&defaults.work_dir)),
        output_file: evaluator_file
            .output_file
            .unwrap_or_else(|| defaults.output_file.clone()),
        energy_file: evaluator_file
            .energy_file
            .unwrap_or_else(|| defaults.energy_file.clone()),
    };

    let validator = DistanceValidator {
        min_nonbonded: validation_file
            .min_nonbonded_distance
            .unwrap_or(defaults.validator.min_nonbonded),
        max_bond: validation_file
            .max_bond_length
            .unwrap_or(defaults.validator.max_bond),
        crossover_factor: validation_file
            .crossover_factor
            .unwrap_or(defaults.validator.crossover_factor),
        clash_distance: validation_file
            .clash_distance
            .unwrap_or(defaults.validator.clash_distance),
    };

    let volume = match file_config.volume {
        Some(v) => {
            if (0..3).any(|k| v.min[k] > v.max[k]) {
                return Err(CliError::Config(
                    "`volume.min` must not exceed `volume.max` on any axis".to_string(),
                ));
            }
            Some(BoundingBox::new(Point3::from(v.min), Point3::from(v.max)))
        }
        None => None,
    };

    let kill_file = args
        .kill_file
        .clone()
        .or(search_file.kill_file)
        .unwrap_or_else(|| PathBuf::from(&defaults.kill_file));

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        population_path: args.population.clone(),
        surroundings_path: args.surroundings.clone(),
        restart_path: args.restart.clone(),
        kill_file,
        dof_requests: dofs.requests,
        volume,
        validator,
        evaluator,
        search,
    })
}

/// The degrees of freedom to look for: explicit kinds win, then the
/// `[[dof]]` tables of a configuration file, then every kind.
pub fn load_dof_requests(config: Option<&Path>, kinds: &[DofKind]) -> Result<Vec<DofRequest>> {
    if !kinds.is_empty() {
        return Ok(kinds.iter().map(|&kind| DofRequest::new(kind)).collect());
    }
    match config {
        Some(path) => {
            let file_config = FileConfig::from_file(path)?;
            Ok(build_dofs(&file_config.dofs, &DefaultsConfig::default())?.requests)
        }
        None => Ok(DofKind::ALL.iter().map(|&kind| DofRequest::new(kind)).collect()),
    }
}

fn build_dofs(entries: &[FileDofConfig], defaults: &DefaultsConfig) -> Result<DofSetup> {
    let mut setup = DofSetup {
        requests: Vec::new(),
        mutation: MutationConfig::default(),
        similarity: SimilarityThresholds::default(),
    };
    if entries.is_empty() {
        setup.requests = defaults.dofs.iter().map(|&k| DofRequest::new(k)).collect();
        return Ok(setup);
    }

    for entry in entries {
        let kind = DofKind::from_str(&entry.kind).map_err(|e| CliError::Config(e.to_string()))?;
        let mut request = DofRequest::new(kind);

        if let Some(positions) = &entry.positions {
            let converted = positions
                .iter()
                .map(|tuple| tuple.iter().map(|&atom| zero_based(atom)).collect::<Result<Vec<usize>>>())
                .collect::<Result<Vec<Vec<usize>>>>()?;
            request.positions = Some(converted);
        }
        request.excluded_bonds = entry
            .exclude_bonds
            .iter()
            .map(|&[b, c]| -> Result<(usize, usize)> { Ok((zero_based(b)?, zero_based(c)?)) })
            .collect::<Result<Vec<_>>>()?;
        request.centroid_ranges = entry
            .ranges
            .map(|r| [(r[0][0], r[0][1]), (r[1][0], r[1][1]), (r[2][0], r[2][1])]);
        request.orientation_angles = entry.angles.clone();

        if entry.probability.is_some() || entry.max_mutations.is_some() || entry.weights.is_some()
        {
            let probability = entry
                .probability
                .unwrap_or(MutationSettings::default().probability);
            if !(0.0..=1.0).contains(&probability) {
                return Err(CliError::Config(format!(
                    "Mutation probability of '{}' must be within [0, 1], got {}",
                    kind, probability
                )));
            }
            setup.mutation.set(
                kind,
                MutationSettings {
                    probability,
                    max_mutations: entry.max_mutations,
                    weights: entry.weights.clone(),
                },
            );
        }
        if let Some(threshold) = entry.similarity {
            setup.similarity.set(kind, threshold);
        }

        debug!(kind = %kind, "Degree of freedom configured from file.");
        setup.requests.push(request);
    }
    Ok(setup)
}

fn zero_based(atom: usize) -> Result<usize> {
    atom.checked_sub(1)
        .ok_or_else(|| CliError::Config("Atom numbers start at 1".to_string()))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn ga(config: &mut FileConfig) -> &mut FileGaConfig {
    config.ga.get_or_insert_with(Default::default)
}

fn search(config: &mut FileConfig) -> &mut FileSearchConfig {
    config.search.get_or_insert_with(Default::default)
}

fn evaluator(config: &mut FileConfig) -> &mut FileEvaluatorConfig {
    config.evaluator.get_or_insert_with(Default::default)
}

fn validation(config: &mut FileConfig) -> &mut FileValidationConfig {
    config.validation.get_or_insert_with(Default::default)
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "ga.popsize" => ga(&mut config).popsize = Some(parse_value(key, value)?),
            "ga.max-iter" => ga(&mut config).max_iter = Some(parse_value(key, value)?),
            "ga.cnt-max" => ga(&mut config).cnt_max = Some(parse_value(key, value)?),
            "ga.energy-var" => ga(&mut config).energy_var = Some(parse_value(key, value)?),
            "ga.selection" => ga(&mut config).selection = Some(value.to_string()),
            "ga.fitness-sum-limit" => {
                ga(&mut config).fitness_sum_limit = Some(parse_value(key, value)?)
            }
            "ga.prob-for-crossing" => {
                ga(&mut config).prob_for_crossing = Some(parse_value(key, value)?)
            }
            "ga.iter-limit-conv" => {
                ga(&mut config).iter_limit_conv = Some(parse_value(key, value)?)
            }
            "ga.energy-diff-conv" => {
                ga(&mut config).energy_diff_conv = Some(parse_value(key, value)?)
            }
            "search.seed" => search(&mut config).seed = Some(parse_value(key, value)?),
            "search.chiral" => search(&mut config).chiral = Some(parse_value(key, value)?),
            "search.checkpoint" => search(&mut config).checkpoint = Some(PathBuf::from(value)),
            "search.kill-file" => search(&mut config).kill_file = Some(PathBuf::from(value)),
            "evaluator.command" => evaluator(&mut config).command = Some(value.to_string()),
            "evaluator.work-dir" => evaluator(&mut config).work_dir = Some(PathBuf::from(value)),
            "evaluator.output-file" => {
                evaluator(&mut config).output_file = Some(value.to_string())
            }
            "evaluator.energy-file" => {
                evaluator(&mut config).energy_file = Some(value.to_string())
            }
            "validation.min-nonbonded-distance" => {
                validation(&mut config).min_nonbonded_distance = Some(parse_value(key, value)?)
            }
            "validation.max-bond-length" => {
                validation(&mut config).max_bond_length = Some(parse_value(key, value)?)
            }
            "validation.crossover-factor" => {
                validation(&mut config).crossover_factor = Some(parse_value(key, value)?)
            }
            "validation.clash-distance" => {
                validation(&mut config).clash_distance = Some(parse_value(key, value)?)
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
