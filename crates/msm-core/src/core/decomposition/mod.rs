//! Linear dimensionality reduction of time series.
//!
//! ## Overview
//!
//! Both estimators work on the instantaneous and time-lagged covariance matrices
//! accumulated by [`covariance::LaggedMoments`]:
//!
//! - [`tica::Tica`] assumes a reversible process and diagonalizes the symmetrized,
//!   whitened lagged covariance.
//! - [`vamp::Vamp`] drops that assumption and takes the singular value
//!   decomposition of the whitened Koopman matrix. Its VAMP-2 score measures how
//!   much kinetic variance a feature set captures.
//!
//! Fitted models project data through the [`Transform`] trait.

pub mod covariance;
pub mod tica;
pub mod vamp;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rescaling applied to projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scaling {
    /// Each component is multiplied by its eigenvalue (or singular value), so that
    /// Euclidean distances approximate kinetic distances.
    #[default]
    #[serde(alias = "km")]
    KineticMap,
    None,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Input has {found} columns but the model was fitted on {expected}")]
pub struct TransformError {
    pub expected: usize,
    pub found: usize,
}

pub trait Transform {
    /// Number of input columns the model was fitted on.
    fn input_dimension(&self) -> usize;

    /// Number of columns produced by [`Transform::transform`].
    fn output_dimension(&self) -> usize;

    fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, TransformError>;

    fn transform_all(&self, data: &[Array2<f64>]) -> Result<Vec<Array2<f64>>, TransformError> {
        data.iter().map(|d| self.transform(d.view())).collect()
    }
}
