use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use msmpipe::core::decomposition::Scaling;
use msmpipe::engine::config::{PipelineConfig, PipelineConfigBuilder, RunFlags};
use std::path::PathBuf;
use std::str::FromStr;

/// Merges defaults, the optional config file, `-S` overrides and explicit flags
/// (in increasing precedence) into a validated pipeline configuration.
pub fn build_config(args: &BuildArgs) -> Result<PipelineConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let input = file_config.input.take().unwrap_or_default();
    let run = file_config.run.take().unwrap_or_default();
    let features = file_config.features.take().unwrap_or_default();
    let tica = file_config.tica.take().unwrap_or_default();
    let clustering = file_config.clustering.take().unwrap_or_default();
    let msm = file_config.msm.take().unwrap_or_default();
    let feature_scoring = file_config.feature_scoring.take().unwrap_or_default();
    let model_scoring = file_config.model_scoring.take().unwrap_or_default();

    let data_dir = args
        .data_dir
        .clone()
        .or(input.data_dir)
        .unwrap_or_else(|| PathBuf::from(&defaults.data_dir));
    let output_dir = args
        .output_dir
        .clone()
        .or(input.output_dir)
        .unwrap_or_else(|| PathBuf::from(&defaults.output_dir));
    let structure = args
        .structure
        .clone()
        .or(input.structure)
        .ok_or_else(|| {
            CliError::Config(
                "No structure given. Use --structure or set `input.structure` in the config file."
                    .to_string(),
            )
        })?;
    let trajectories = if args.trajectories.is_empty() {
        input.trajectories.unwrap_or_default()
    } else {
        args.trajectories.clone()
    };

    let flags = RunFlags {
        save: !args.no_save && run.save.unwrap_or(true),
        bootstrap: args.bootstrap || run.bootstrap.unwrap_or(false),
        quick: args.quick || run.quick.unwrap_or(false),
        score_features: args.score_features || run.score_features.unwrap_or(false),
        score_model: !args.no_score_model && run.score_model.unwrap_or(true),
    };

    PipelineConfigBuilder::new()
        .data_dir(data_dir)
        .output_dir(output_dir)
        .structure(structure)
        .trajectories(trajectories)
        .flags(flags)
        .excluded_neighbors(
            features
                .excluded_neighbors
                .unwrap_or(defaults.excluded_neighbors),
        )
        .periodic(features.periodic.unwrap_or(defaults.periodic))
        .tica_lag(tica.lag.unwrap_or(defaults.tica_lag))
        .tica_dim(tica.dim.unwrap_or(defaults.tica_dim))
        .tica_scaling(tica.scaling.unwrap_or(defaults.tica_scaling))
        .n_clusters(clustering.n_clusters.unwrap_or(defaults.n_clusters))
        .max_iter(clustering.max_iter.unwrap_or(defaults.max_iter))
        .kmeans_tolerance(clustering.tolerance.unwrap_or(defaults.kmeans_tolerance))
        .msm_lag(msm.lag.unwrap_or(defaults.msm_lag))
        .reversible(msm.reversible.unwrap_or(defaults.reversible))
        .feature_score_splits(
            feature_scoring
                .n_splits
                .unwrap_or(defaults.feature_score_splits),
        )
        .validation_fraction(
            feature_scoring
                .validation_fraction
                .unwrap_or(defaults.validation_fraction),
        )
        .model_score_splits(model_scoring.n_splits.unwrap_or(defaults.model_score_splits))
        .score_k(model_scoring.score_k.unwrap_or(defaults.score_k))
        .bootstrap_fraction(run.bootstrap_fraction.unwrap_or(defaults.bootstrap_fraction))
        .seed(args.seed.or(run.seed))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_scaling(key: &str, value: &str) -> Result<Scaling> {
    match value {
        "kinetic-map" | "km" => Ok(Scaling::KineticMap),
        "none" => Ok(Scaling::None),
        _ => Err(CliError::Config(format!(
            "Invalid scaling for {}: {} (expected 'kinetic-map', 'km' or 'none')",
            key, value
        ))),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "input.data-dir" => {
                config.input.get_or_insert_with(Default::default).data_dir =
                    Some(PathBuf::from(value_str));
            }
            "input.output-dir" => {
                config.input.get_or_insert_with(Default::default).output_dir =
                    Some(PathBuf::from(value_str));
            }
            "input.structure" => {
                config.input.get_or_insert_with(Default::default).structure =
                    Some(PathBuf::from(value_str));
            }
            "run.save" => {
                config.run.get_or_insert_with(Default::default).save =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "run.bootstrap" => {
                config.run.get_or_insert_with(Default::default).bootstrap =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "run.quick" => {
                config.run.get_or_insert_with(Default::default).quick =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "run.score-features" => {
                config.run.get_or_insert_with(Default::default).score_features =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "run.score-model" => {
                config.run.get_or_insert_with(Default::default).score_model =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "run.bootstrap-fraction" => {
                config
                    .run
                    .get_or_insert_with(Default::default)
                    .bootstrap_fraction = Some(parse_value(key, value_str, "float")?);
            }
            "run.seed" => {
                config.run.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "features.excluded-neighbors" => {
                config
                    .features
                    .get_or_insert_with(Default::default)
                    .excluded_neighbors = Some(parse_value(key, value_str, "integer")?);
            }
            "features.periodic" => {
                config.features.get_or_insert_with(Default::default).periodic =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "tica.lag" => {
                config.tica.get_or_insert_with(Default::default).lag =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "tica.dim" => {
                config.tica.get_or_insert_with(Default::default).dim =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "tica.scaling" => {
                config.tica.get_or_insert_with(Default::default).scaling =
                    Some(parse_scaling(key, value_str)?);
            }
            "clustering.n-clusters" => {
                config
                    .clustering
                    .get_or_insert_with(Default::default)
                    .n_clusters = Some(parse_value(key, value_str, "integer")?);
            }
            "clustering.max-iter" => {
                config.clustering.get_or_insert_with(Default::default).max_iter =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "clustering.tolerance" => {
                config
                    .clustering
                    .get_or_insert_with(Default::default)
                    .tolerance = Some(parse_value(key, value_str, "float")?);
            }
            "msm.lag" => {
                config.msm.get_or_insert_with(Default::default).lag =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "msm.reversible" => {
                config.msm.get_or_insert_with(Default::default).reversible =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "feature-scoring.n-splits" => {
                config
                    .feature_scoring
                    .get_or_insert_with(Default::default)
                    .n_splits = Some(parse_value(key, value_str, "integer")?);
            }
            "feature-scoring.validation-fraction" => {
                config
                    .feature_scoring
                    .get_or_insert_with(Default::default)
                    .validation_fraction = Some(parse_value(key, value_str, "float")?);
            }
            "model-scoring.n-splits" => {
                config
                    .model_scoring
                    .get_or_insert_with(Default::default)
                    .n_splits = Some(parse_value(key, value_str, "integer")?);
            }
            "model-scoring.score-k" => {
                config
                    .model_scoring
                    .get_or_insert_with(Default::default)
                    .score_k = Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
