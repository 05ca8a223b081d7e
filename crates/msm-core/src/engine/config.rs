use crate::core::decomposition::Scaling;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Switches for the optional parts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFlags {
    /// Persist every intermediate artifact. When off, the run writes nothing.
    pub save: bool,
    /// Keep a random subset of the trajectories.
    pub bootstrap: bool,
    /// Keep only the first (remaining) trajectory.
    pub quick: bool,
    pub score_features: bool,
    pub score_model: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            save: true,
            bootstrap: false,
            quick: false,
            score_features: false,
            score_model: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub structure: PathBuf,
    pub trajectories: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub excluded_neighbors: usize,
    pub periodic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicaConfig {
    pub lag: usize,
    pub dim: usize,
    pub scaling: Scaling,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsmConfig {
    pub lag: usize,
    pub reversible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScoringConfig {
    pub n_splits: usize,
    pub validation_fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelScoringConfig {
    pub n_splits: usize,
    pub score_k: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub flags: RunFlags,
    pub features: FeatureConfig,
    pub tica: TicaConfig,
    pub clustering: ClusteringConfig,
    pub msm: MsmConfig,
    pub feature_scoring: FeatureScoringConfig,
    pub model_scoring: ModelScoringConfig,
    /// Fraction of trajectories kept by a bootstrap run.
    pub bootstrap_fraction: f64,
    /// Seed for every random choice of the run; `None` draws from system entropy.
    pub seed: Option<u64>,
}

impl PipelineConfig {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    structure: Option<PathBuf>,
    trajectories: Option<Vec<PathBuf>>,
    flags: Option<RunFlags>,
    excluded_neighbors: Option<usize>,
    periodic: Option<bool>,
    tica_lag: Option<usize>,
    tica_dim: Option<usize>,
    tica_scaling: Option<Scaling>,
    n_clusters: Option<usize>,
    max_iter: Option<usize>,
    kmeans_tolerance: Option<f64>,
    msm_lag: Option<usize>,
    reversible: Option<bool>,
    feature_score_splits: Option<usize>,
    validation_fraction: Option<f64>,
    model_score_splits: Option<usize>,
    score_k: Option<usize>,
    bootstrap_fraction: Option<f64>,
    seed: Option<u64>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.data_dir = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn structure(mut self, path: PathBuf) -> Self {
        self.structure = Some(path);
        self
    }
    pub fn trajectories(mut self, paths: Vec<PathBuf>) -> Self {
        self.trajectories = Some(paths);
        self
    }
    pub fn flags(mut self, flags: RunFlags) -> Self {
        self.flags = Some(flags);
        self
    }
    pub fn excluded_neighbors(mut self, n: usize) -> Self {
        self.excluded_neighbors = Some(n);
        self
    }
    pub fn periodic(mut self, periodic: bool) -> Self {
        self.periodic = Some(periodic);
        self
    }
    pub fn tica_lag(mut self, lag: usize) -> Self {
        self.tica_lag = Some(lag);
        self
    }
    pub fn tica_dim(mut self, dim: usize) -> Self {
        self.tica_dim = Some(dim);
        self
    }
    pub fn tica_scaling(mut self, scaling: Scaling) -> Self {
        self.tica_scaling = Some(scaling);
        self
    }
    pub fn n_clusters(mut self, k: usize) -> Self {
        self.n_clusters = Some(k);
        self
    }
    pub fn max_iter(mut self, iterations: usize) -> Self {
        self.max_iter = Some(iterations);
        self
    }
    pub fn kmeans_tolerance(mut self, tolerance: f64) -> Self {
        self.kmeans_tolerance = Some(tolerance);
        self
    }
    pub fn msm_lag(mut self, lag: usize) -> Self {
        self.msm_lag = Some(lag);
        self
    }
    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = Some(reversible);
        self
    }
    pub fn feature_score_splits(mut self, n: usize) -> Self {
        self.feature_score_splits = Some(n);
        self
    }
    pub fn validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = Some(fraction);
        self
    }
    pub fn model_score_splits(mut self, n: usize) -> Self {
        self.model_score_splits = Some(n);
        self
    }
    pub fn score_k(mut self, k: usize) -> Self {
        self.score_k = Some(k);
        self
    }
    pub fn bootstrap_fraction(mut self, fraction: f64) -> Self {
        self.bootstrap_fraction = Some(fraction);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the configuration. Stage parameters without a natural default
    /// (lags, dimension, cluster count, inputs) are required; the rest fall back
    /// to the usual analysis settings.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let trajectories = self
            .trajectories
            .ok_or(ConfigError::MissingParameter("trajectories"))?;
        if trajectories.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "trajectories",
                reason: "at least one trajectory is required".into(),
            });
        }
        let input = InputConfig {
            data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            structure: self
                .structure
                .ok_or(ConfigError::MissingParameter("structure"))?,
            trajectories,
        };
        let tica = TicaConfig {
            lag: positive("tica_lag", self.tica_lag)?,
            dim: positive("tica_dim", self.tica_dim)?,
            scaling: self.tica_scaling.unwrap_or_default(),
        };
        let clustering = ClusteringConfig {
            n_clusters: positive("n_clusters", self.n_clusters)?,
            max_iter: positive("max_iter", self.max_iter)?,
            tolerance: self.kmeans_tolerance.unwrap_or(1e-5),
        };
        let msm = MsmConfig {
            lag: positive("msm_lag", self.msm_lag)?,
            reversible: self.reversible.unwrap_or(true),
        };
        let feature_scoring = FeatureScoringConfig {
            n_splits: positive(
                "feature_score_splits",
                Some(self.feature_score_splits.unwrap_or(10)),
            )?,
            validation_fraction: fraction_in_unit_interval(
                "validation_fraction",
                self.validation_fraction.unwrap_or(0.5),
                false,
            )?,
        };
        let model_scoring = ModelScoringConfig {
            n_splits: positive(
                "model_score_splits",
                Some(self.model_score_splits.unwrap_or(2)),
            )?,
            score_k: self.score_k.unwrap_or(10),
        };
        if model_scoring.score_k == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "score_k",
                reason: "must be at least 1".into(),
            });
        }

        Ok(PipelineConfig {
            input,
            flags: self.flags.unwrap_or_default(),
            features: FeatureConfig {
                excluded_neighbors: self.excluded_neighbors.unwrap_or(2),
                periodic: self.periodic.unwrap_or(true),
            },
            tica,
            clustering,
            msm,
            feature_scoring,
            model_scoring,
            bootstrap_fraction: fraction_in_unit_interval(
                "bootstrap_fraction",
                self.bootstrap_fraction.unwrap_or(0.5),
                true,
            )?,
            seed: self.seed,
        })
    }
}

fn positive(name: &'static str, value: Option<usize>) -> Result<usize, ConfigError> {
    match value {
        None => Err(ConfigError::MissingParameter(name)),
        Some(0) => Err(ConfigError::InvalidParameter {
            name,
            reason: "must be at least 1".into(),
        }),
        Some(v) => Ok(v),
    }
}

fn fraction_in_unit_interval(
    name: &'static str,
    value: f64,
    allow_one: bool,
) -> Result<f64, ConfigError> {
    let in_range = value > 0.0 && (value < 1.0 || (allow_one && value == 1.0));
    if in_range {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} is outside the allowed range"),
        })
    }
}
