//! Markov state models over discrete trajectories.
//!
//! ## Overview
//!
//! [`estimation::MsmEstimator`] counts transitions at a fixed lag, restricts the
//! counts to the largest strongly connected set of states and estimates a
//! transition matrix on it. The resulting [`model::MarkovStateModel`] is plain
//! data that persists as TOML. [`scoring`] cross-validates models with the VAMP-2
//! score.

pub mod counts;
pub mod estimation;
pub mod model;
pub mod scoring;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MsmError {
    #[error("Lag time must be at least 1 step")]
    ZeroLag,
    #[error("No discrete trajectories to estimate from")]
    NoData,
    #[error("No transitions are observed at lag {lag} within the active set")]
    NoTransitions { lag: usize },
    #[error("Cross-validation needs at least 2 trajectory blocks, found {found}")]
    TooFewBlocks { found: usize },
    #[error("Cross-validation needs at least one split")]
    NoSplits,
    #[error("Inconsistent model: {0}")]
    InvalidModel(String),
    #[error("Failed to access model file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize model: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to parse model file: {0}")]
    Deserialize(#[from] toml::de::Error),
}
