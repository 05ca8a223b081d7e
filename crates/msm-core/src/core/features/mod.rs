//! Per-frame feature extraction from coordinate trajectories.
//!
//! A [`Featurizer`] turns a [`Trajectory`] into a dense `frames x features` matrix.
//! Trajectories are independent of each other, so [`Featurizer::featurize_all`]
//! processes them in parallel.

pub mod distances;

use crate::core::models::trajectory::Trajectory;
use ndarray::Array2;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    #[error("Frame {frame} has {found} atoms but the featurizer expects {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Structure yields {found} C-alpha pairs; at least 2 are required")]
    TooFewPairs { found: usize },
    #[error("Trajectory {index} contains no frames")]
    EmptyTrajectory { index: usize },
}

pub trait Featurizer: Sync {
    /// Number of features produced per frame.
    fn dimension(&self) -> usize;

    /// Human-readable label of each feature column.
    fn describe(&self) -> Vec<String>;

    fn featurize(&self, trajectory: &Trajectory) -> Result<Array2<f64>, FeatureError>;

    fn featurize_all(&self, trajectories: &[Trajectory]) -> Result<Vec<Array2<f64>>, FeatureError> {
        if let Some(index) = trajectories.iter().position(Trajectory::is_empty) {
            return Err(FeatureError::EmptyTrajectory { index });
        }
        trajectories
            .par_iter()
            .map(|trajectory| self.featurize(trajectory))
            .collect()
    }
}
