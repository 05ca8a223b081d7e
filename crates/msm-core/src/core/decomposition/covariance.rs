use crate::core::utils::linalg::to_dmatrix;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, Axis, s};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MomentsError {
    #[error("No input trajectories")]
    NoData,
    #[error("Lag time must be at least 1 frame")]
    ZeroLag,
    #[error("No trajectory is longer than the lag time of {lag} frames")]
    NoLaggedPairs { lag: usize },
    #[error("Trajectory {index} has {found} columns, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Instantaneous and time-lagged covariance matrices together with the means they
/// were centred on.
#[derive(Debug, Clone)]
pub struct Covariances {
    pub mean_0: DVector<f64>,
    pub mean_t: DVector<f64>,
    pub c00: DMatrix<f64>,
    pub c0t: DMatrix<f64>,
    pub ctt: DMatrix<f64>,
}

/// Running sums over all `(x_t, x_{t+lag})` pairs of a set of trajectories.
///
/// The data are shifted by their global mean before accumulation so that the
/// second moments stay well conditioned.
#[derive(Debug, Clone)]
pub struct LaggedMoments {
    n_pairs: usize,
    shift: DVector<f64>,
    sum_0: DVector<f64>,
    sum_t: DVector<f64>,
    m00: DMatrix<f64>,
    mtt: DMatrix<f64>,
    m0t: DMatrix<f64>,
}

impl LaggedMoments {
    pub fn accumulate(data: &[Array2<f64>], lag: usize) -> Result<Self, MomentsError> {
        if lag == 0 {
            return Err(MomentsError::ZeroLag);
        }
        let dimension = data.first().ok_or(MomentsError::NoData)?.ncols();
        for (index, trajectory) in data.iter().enumerate() {
            if trajectory.ncols() != dimension {
                return Err(MomentsError::DimensionMismatch {
                    index,
                    expected: dimension,
                    found: trajectory.ncols(),
                });
            }
        }

        let shift = Self::global_mean(data, dimension);
        let mut moments = Self {
            n_pairs: 0,
            shift,
            sum_0: DVector::zeros(dimension),
            sum_t: DVector::zeros(dimension),
            m00: DMatrix::zeros(dimension, dimension),
            mtt: DMatrix::zeros(dimension, dimension),
            m0t: DMatrix::zeros(dimension, dimension),
        };

        for trajectory in data.iter().filter(|t| t.nrows() > lag) {
            let n = trajectory.nrows() - lag;
            let mut x0 = to_dmatrix(trajectory.slice(s![..n, ..]));
            let mut xt = to_dmatrix(trajectory.slice(s![lag.., ..]));
            for mut row in x0.row_iter_mut().chain(xt.row_iter_mut()) {
                row -= moments.shift.transpose();
            }

            moments.n_pairs += n;
            moments.sum_0 += x0.row_sum().transpose();
            moments.sum_t += xt.row_sum().transpose();
            moments.m00 += x0.transpose() * &x0;
            moments.mtt += xt.transpose() * &xt;
            moments.m0t += x0.transpose() * &xt;
        }

        if moments.n_pairs == 0 {
            return Err(MomentsError::NoLaggedPairs { lag });
        }
        debug!(
            "Accumulated {} lagged pairs of dimension {} at lag {}",
            moments.n_pairs, dimension, lag
        );
        Ok(moments)
    }

    fn global_mean(data: &[Array2<f64>], dimension: usize) -> DVector<f64> {
        let n_frames: usize = data.iter().map(|t| t.nrows()).sum();
        let mut total = DVector::zeros(dimension);
        for trajectory in data {
            for (j, column_sum) in trajectory.sum_axis(Axis(0)).iter().enumerate() {
                total[j] += column_sum;
            }
        }
        if n_frames > 0 {
            total /= n_frames as f64;
        }
        total
    }

    pub fn n_pairs(&self) -> usize {
        self.n_pairs
    }

    pub fn dimension(&self) -> usize {
        self.shift.len()
    }

    /// Covariances of a time-reversible process: both time-lag sides share one
    /// mean, `C00 = Ctt` pools both sides and `C0t` is symmetrized.
    pub fn reversible(&self) -> Covariances {
        let n = 2.0 * self.n_pairs as f64;
        let mean = (&self.sum_0 + &self.sum_t) / n;
        let outer = &mean * mean.transpose();
        let c00 = (&self.m00 + &self.mtt) / n - &outer;
        let c0t = (&self.m0t + self.m0t.transpose()) / n - &outer;
        let mean = mean + &self.shift;
        Covariances {
            mean_0: mean.clone(),
            mean_t: mean,
            ctt: c00.clone(),
            c00,
            c0t,
        }
    }

    /// Covariances with separate means for the instantaneous and lagged sides.
    pub fn nonreversible(&self) -> Covariances {
        let n = self.n_pairs as f64;
        let mean_0 = &self.sum_0 / n;
        let mean_t = &self.sum_t / n;
        let c00 = &self.m00 / n - &mean_0 * mean_0.transpose();
        let ctt = &self.mtt / n - &mean_t * mean_t.transpose();
        let c0t = &self.m0t / n - &mean_0 * mean_t.transpose();
        Covariances {
            mean_0: mean_0 + &self.shift,
            mean_t: mean_t + &self.shift,
            c00,
            c0t,
            ctt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pairs_are_counted_per_trajectory() {
        let data = vec![
            Array2::<f64>::zeros((10, 2)),
            Array2::<f64>::zeros((3, 2)),
            Array2::<f64>::zeros((5, 2)),
        ];
        let moments = LaggedMoments::accumulate(&data, 3).unwrap();
        assert_eq!(moments.n_pairs(), 7 + 2);
        assert_eq!(moments.dimension(), 2);
    }

    #[test]
    fn reversible_covariances_of_alternating_signal() {
        let data = vec![array![[1.0], [-1.0], [1.0], [-1.0], [1.0]]];
        let cov = LaggedMoments::accumulate(&data, 1).unwrap().reversible();
        assert!(cov.mean_0[0].abs() < 1e-12);
        assert!((cov.c00[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((cov.c0t[(0, 0)] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn nonreversible_means_are_separate() {
        let data = vec![array![[0.0], [1.0], [2.0], [3.0]]];
        let cov = LaggedMoments::accumulate(&data, 1).unwrap().nonreversible();
        assert!((cov.mean_0[0] - 1.0).abs() < 1e-12);
        assert!((cov.mean_t[0] - 2.0).abs() < 1e-12);
        assert!((cov.c00[(0, 0)] - 2.0 / 3.0).abs() < 1e-12);
        assert!((cov.c0t[(0, 0)] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reversible_c0t_is_symmetric() {
        let data = vec![array![
            [0.0, 1.0],
            [1.0, 0.5],
            [0.3, 2.0],
            [2.0, 0.1],
            [1.1, 1.7]
        ]];
        let cov = LaggedMoments::accumulate(&data, 1).unwrap().reversible();
        assert!((cov.c0t[(0, 1)] - cov.c0t[(1, 0)]).abs() < 1e-12);
    }

    #[test]
    fn short_trajectories_have_no_pairs() {
        let data = vec![Array2::<f64>::zeros((4, 2))];
        assert_eq!(
            LaggedMoments::accumulate(&data, 4).unwrap_err(),
            MomentsError::NoLaggedPairs { lag: 4 }
        );
    }

    #[test]
    fn column_counts_must_agree() {
        let data = vec![Array2::<f64>::zeros((4, 2)), Array2::<f64>::zeros((4, 3))];
        assert_eq!(
            LaggedMoments::accumulate(&data, 1).unwrap_err(),
            MomentsError::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 3
            }
        );
    }
}
