use super::covariance::{LaggedMoments, MomentsError};
use super::{Scaling, Transform, TransformError};
use crate::core::utils::linalg::{
    canonical_signs, sorted_symmetric_eigen, spd_inv_split, to_array2, to_dmatrix,
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Eigenvalues of the instantaneous covariance below this value are discarded.
pub const DEFAULT_TICA_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicaError {
    #[error("Output dimension must be at least 1")]
    ZeroDimension,
    #[error("Data spans {rank} independent directions, fewer than the requested dimension {dim}")]
    InsufficientRank { rank: usize, dim: usize },
    #[error(transparent)]
    Moments(#[from] MomentsError),
}

/// Time-lagged independent component analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Tica {
    pub lag: usize,
    pub dim: usize,
    pub scaling: Scaling,
    pub epsilon: f64,
}

impl Tica {
    pub fn new(lag: usize, dim: usize) -> Self {
        Self {
            lag,
            dim,
            scaling: Scaling::KineticMap,
            epsilon: DEFAULT_TICA_EPSILON,
        }
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Estimates the independent components of `data`.
    ///
    /// # Arguments
    ///
    /// * `data` - One `frames x features` matrix per trajectory. Lagged pairs never
    ///   cross trajectory boundaries.
    ///
    /// # Return
    ///
    /// A model whose components are sorted by descending eigenvalue.
    ///
    /// # Errors
    ///
    /// Returns [`TicaError::InsufficientRank`] if fewer than `dim` directions survive
    /// whitening, and [`TicaError::Moments`] if no lagged pairs exist.
    #[instrument(skip_all, name = "tica", fields(lag = self.lag, dim = self.dim))]
    pub fn estimate(&self, data: &[Array2<f64>]) -> Result<TicaModel, TicaError> {
        if self.dim == 0 {
            return Err(TicaError::ZeroDimension);
        }
        let covariances = LaggedMoments::accumulate(data, self.lag)?.reversible();

        let whitening = spd_inv_split(&covariances.c00, self.epsilon);
        let rank = whitening.ncols();
        if rank < self.dim {
            return Err(TicaError::InsufficientRank {
                rank,
                dim: self.dim,
            });
        }
        debug!("Whitened {} features into {} directions", covariances.c00.nrows(), rank);

        let whitened_c0t = whitening.transpose() * &covariances.c0t * &whitening;
        let (values, vectors) = sorted_symmetric_eigen(&whitened_c0t);

        let mut eigenvectors = &whitening * vectors.columns(0, self.dim);
        canonical_signs(&mut eigenvectors);
        let eigenvalues = values.rows(0, self.dim).into_owned();

        info!(
            "TICA leading eigenvalue {:.4} ({} components kept)",
            eigenvalues[0], self.dim
        );

        Ok(TicaModel {
            mean: covariances.mean_0,
            eigenvectors,
            eigenvalues,
            lag: self.lag,
            scaling: self.scaling,
        })
    }
}

/// A fitted TICA projection.
#[derive(Debug, Clone)]
pub struct TicaModel {
    mean: DVector<f64>,
    eigenvectors: DMatrix<f64>,
    eigenvalues: DVector<f64>,
    lag: usize,
    scaling: Scaling,
}

impl TicaModel {
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Component vectors in feature space, one column per component.
    pub fn eigenvectors(&self) -> &DMatrix<f64> {
        &self.eigenvectors
    }

    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Implied timescales `-lag / ln|lambda|` in frames.
    pub fn timescales(&self) -> Vec<f64> {
        self.eigenvalues
            .iter()
            .map(|&value| implied_timescale(self.lag, value))
            .collect()
    }
}

pub(crate) fn implied_timescale(lag: usize, eigenvalue: f64) -> f64 {
    let magnitude = eigenvalue.abs();
    if magnitude >= 1.0 {
        f64::INFINITY
    } else {
        -(lag as f64) / magnitude.ln()
    }
}

impl Transform for TicaModel {
    fn input_dimension(&self) -> usize {
        self.mean.len()
    }

    fn output_dimension(&self) -> usize {
        self.eigenvalues.len()
    }

    fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        project(data, &self.mean, &self.eigenvectors, &self.eigenvalues, self.scaling)
    }
}

/// `(x - mean) * vectors`, optionally scaled column-wise by `weights`.
pub(crate) fn project(
    data: ArrayView2<f64>,
    mean: &DVector<f64>,
    vectors: &DMatrix<f64>,
    weights: &DVector<f64>,
    scaling: Scaling,
) -> Result<Array2<f64>, TransformError> {
    if data.ncols() != mean.len() {
        return Err(TransformError {
            expected: mean.len(),
            found: data.ncols(),
        });
    }
    let mut centred = to_dmatrix(data);
    for mut row in centred.row_iter_mut() {
        row -= mean.transpose();
    }
    let mut projected = centred * vectors;
    if scaling == Scaling::KineticMap {
        for (mut column, &weight) in projected.column_iter_mut().zip(weights.iter()) {
            column *= weight;
        }
    }
    Ok(to_array2(&projected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// A slow two-state switch in the first column and white noise in the others.
    fn slow_and_fast(n_frames: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = 1.0;
        Array2::from_shape_fn((n_frames, 3), |(_, col)| {
            if col == 0 {
                if rng.gen_bool(0.02) {
                    state = -state;
                }
                state + 0.1 * rng.gen_range(-1.0..1.0)
            } else {
                rng.gen_range(-1.0..1.0)
            }
        })
    }

    #[test]
    fn output_has_requested_dimension() {
        let data = vec![slow_and_fast(500, 1), slow_and_fast(400, 2)];
        let model = Tica::new(5, 2).estimate(&data).unwrap();
        assert_eq!(model.output_dimension(), 2);
        assert_eq!(model.input_dimension(), 3);
        for projected in model.transform_all(&data).unwrap() {
            assert_eq!(projected.ncols(), 2);
        }
    }

    #[test]
    fn slow_coordinate_is_the_leading_component() {
        let data = vec![slow_and_fast(3000, 7)];
        let model = Tica::new(5, 1).estimate(&data).unwrap();
        assert!(model.eigenvalues()[0] > 0.5);
        let leading = model.eigenvectors().column(0);
        assert!(leading[0].abs() > 5.0 * leading[1].abs());
        assert!(leading[0].abs() > 5.0 * leading[2].abs());
        assert!(leading[0] > 0.0);
        assert!(model.timescales()[0] > 5.0);
    }

    #[test]
    fn unscaled_output_is_whitened() {
        let data = vec![slow_and_fast(2000, 3)];
        let model = Tica::new(1, 3)
            .with_scaling(Scaling::None)
            .estimate(&data)
            .unwrap();
        let projected = model.transform(data[0].view()).unwrap();
        let n = projected.nrows() as f64;
        for j in 0..3 {
            let column = projected.column(j);
            let variance = column.iter().map(|v| v * v).sum::<f64>() / n;
            assert!((variance - 1.0).abs() < 0.05, "variance {variance}");
        }
    }

    #[test]
    fn kinetic_map_scales_by_eigenvalue() {
        let data = vec![slow_and_fast(800, 5)];
        let scaled = Tica::new(2, 2).estimate(&data).unwrap();
        let plain = Tica::new(2, 2)
            .with_scaling(Scaling::None)
            .estimate(&data)
            .unwrap();
        let a = scaled.transform(data[0].view()).unwrap();
        let b = plain.transform(data[0].view()).unwrap();
        let lambda = scaled.eigenvalues()[1];
        assert!((a[[10, 1]] - lambda * b[[10, 1]]).abs() < 1e-9);
    }

    #[test]
    fn rank_deficient_data_is_rejected() {
        let data = vec![Array2::from_shape_fn((100, 3), |(i, _)| (i % 7) as f64)];
        assert_eq!(
            Tica::new(1, 2).estimate(&data).unwrap_err(),
            TicaError::InsufficientRank { rank: 1, dim: 2 }
        );
    }

    #[test]
    fn lag_longer_than_data_is_rejected() {
        let data = vec![slow_and_fast(10, 1)];
        assert!(matches!(
            Tica::new(10, 1).estimate(&data),
            Err(TicaError::Moments(MomentsError::NoLaggedPairs { lag: 10 }))
        ));
    }

    #[test]
    fn timescales_of_unit_eigenvalue_are_infinite() {
        assert!(implied_timescale(10, 1.0).is_infinite());
        assert!((implied_timescale(10, (-1.0f64).exp()) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let data = vec![slow_and_fast(200, 1)];
        let model = Tica::new(1, 1).estimate(&data).unwrap();
        let result = model.transform(Array2::<f64>::zeros((4, 2)).view());
        assert_eq!(result.unwrap_err(), TransformError { expected: 3, found: 2 });
    }
}
