use thiserror::Error;

use super::config::ConfigError;
use crate::core::clustering::kmeans::KMeansError;
use crate::core::decomposition::TransformError;
use crate::core::decomposition::tica::TicaError;
use crate::core::decomposition::vamp::VampError;
use crate::core::features::FeatureError;
use crate::core::io::TrajectoryIoError;
use crate::core::io::arrays::ArrayIoError;
use crate::core::msm::MsmError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load input: {0}")]
    Input(#[from] TrajectoryIoError),

    #[error("Featurization failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Feature scoring failed: {0}")]
    FeatureScoring(#[from] VampError),

    #[error("TICA failed: {0}")]
    Tica(#[from] TicaError),

    #[error("Projection failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Clustering failed: {0}")]
    Clustering(#[from] KMeansError),

    #[error("MSM estimation failed: {0}")]
    Msm(#[from] MsmError),

    #[error("Failed to write artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: ArrayIoError,
    },

    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
