use super::covariance::{Covariances, LaggedMoments, MomentsError};
use super::tica::project;
use super::{Scaling, Transform, TransformError};
use crate::core::utils::linalg::{DEFAULT_EPSILON, sorted_svd, spd_inv_split, spd_inv_sqrt};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand::seq::index::sample;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_VAMP_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum VampError {
    #[error("Output dimension must be at least 1")]
    ZeroDimension,
    #[error("Whitened Koopman matrix has no non-zero singular values")]
    Degenerate,
    #[error("Singular value decomposition did not converge")]
    Decomposition,
    #[error("Splitting {n_trajectories} trajectories with fraction {fraction} leaves one side empty")]
    EmptySplit { n_trajectories: usize, fraction: f64 },
    #[error(transparent)]
    Moments(#[from] MomentsError),
}

/// Variational approach for Markov processes.
///
/// Unlike [`super::tica::Tica`], no reversibility is assumed: the instantaneous and
/// lagged sides keep separate means and covariances.
#[derive(Debug, Clone, PartialEq)]
pub struct Vamp {
    pub lag: usize,
    pub dim: usize,
    pub scaling: Scaling,
    pub epsilon: f64,
}

impl Vamp {
    pub fn new(lag: usize, dim: usize) -> Self {
        Self {
            lag,
            dim,
            scaling: Scaling::KineticMap,
            epsilon: DEFAULT_VAMP_EPSILON,
        }
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Fits the leading singular functions of the Koopman operator.
    ///
    /// The model keeps `min(dim, rank)` components, where `rank` counts the
    /// directions that survive whitening on both sides.
    #[instrument(skip_all, name = "vamp", fields(lag = self.lag, dim = self.dim))]
    pub fn estimate(&self, data: &[Array2<f64>]) -> Result<VampModel, VampError> {
        if self.dim == 0 {
            return Err(VampError::ZeroDimension);
        }
        let covariances = LaggedMoments::accumulate(data, self.lag)?.nonreversible();

        let l0 = spd_inv_split(&covariances.c00, self.epsilon);
        let lt = spd_inv_split(&covariances.ctt, self.epsilon);
        let koopman = l0.transpose() * &covariances.c0t * &lt;
        let (u, singular_values, v) = sorted_svd(&koopman).ok_or(VampError::Decomposition)?;

        let rank = singular_values.iter().filter(|&&s| s > self.epsilon).count();
        if rank == 0 {
            return Err(VampError::Degenerate);
        }
        let k = self.dim.min(rank);
        debug!("Koopman matrix rank {rank}, keeping {k} singular functions");

        Ok(VampModel {
            left: &l0 * u.columns(0, k),
            right: &lt * v.columns(0, k),
            singular_values: singular_values.rows(0, k).into_owned(),
            covariances,
            lag: self.lag,
            scaling: self.scaling,
        })
    }
}

/// A fitted VAMP model.
#[derive(Debug, Clone)]
pub struct VampModel {
    covariances: Covariances,
    left: DMatrix<f64>,
    right: DMatrix<f64>,
    singular_values: DVector<f64>,
    lag: usize,
    scaling: Scaling,
}

impl VampModel {
    pub fn singular_values(&self) -> &DVector<f64> {
        &self.singular_values
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    /// VAMP-2 score on the training data, `1 + sum(s_i^2)`.
    pub fn training_score(&self) -> f64 {
        1.0 + self.singular_values.iter().map(|s| s * s).sum::<f64>()
    }

    /// VAMP-2 score of the fitted singular functions on independent test data.
    ///
    /// The singular functions are evaluated against the test covariances, so a model
    /// that overfits its training set scores lower here than on its own data. The
    /// constant function contributes the leading `1`.
    #[instrument(skip_all, name = "vamp_score")]
    pub fn score(&self, test: &[Array2<f64>]) -> Result<f64, VampError> {
        let cov = LaggedMoments::accumulate(test, self.lag)?.nonreversible();
        if cov.c00.nrows() != self.covariances.c00.nrows() {
            return Err(VampError::Moments(MomentsError::DimensionMismatch {
                index: 0,
                expected: self.covariances.c00.nrows(),
                found: cov.c00.nrows(),
            }));
        }

        let a = spd_inv_sqrt(
            &(self.left.transpose() * &cov.c00 * &self.left),
            DEFAULT_EPSILON,
        );
        let b = self.left.transpose() * &cov.c0t * &self.right;
        let c = spd_inv_sqrt(
            &(self.right.transpose() * &cov.ctt * &self.right),
            DEFAULT_EPSILON,
        );
        let abc = a * b * c;
        Ok(1.0 + abc.norm_squared())
    }
}

/// Repeated VAMP-2 scoring of a feature set on random trajectory splits.
///
/// Each split samples `floor(n * fraction)` trajectories without replacement,
/// fits `estimator` on the remaining ones and scores the fit on the sampled ones.
///
/// # Errors
///
/// Returns [`VampError::EmptySplit`] if either side of a split would be empty, and
/// any error from estimating or scoring a split.
#[instrument(skip_all, name = "feature_scoring", fields(n_splits = n_splits))]
pub fn score_feature_splits<R: Rng>(
    estimator: &Vamp,
    data: &[Array2<f64>],
    n_splits: usize,
    fraction: f64,
    rng: &mut R,
    mut on_split: impl FnMut(usize, f64),
) -> Result<Vec<f64>, VampError> {
    let n = data.len();
    let n_sampled = (n as f64 * fraction).floor() as usize;
    if n_sampled == 0 || n_sampled >= n {
        return Err(VampError::EmptySplit {
            n_trajectories: n,
            fraction,
        });
    }

    let mut scores = Vec::with_capacity(n_splits);
    for split in 0..n_splits {
        let mut sampled = vec![false; n];
        for index in sample(rng, n, n_sampled) {
            sampled[index] = true;
        }
        let (scored, fitted): (Vec<_>, Vec<_>) = data
            .iter()
            .zip(&sampled)
            .partition(|(_, is_sampled)| **is_sampled);
        let fitted: Vec<Array2<f64>> = fitted.into_iter().map(|(d, _)| d.clone()).collect();
        let scored: Vec<Array2<f64>> = scored.into_iter().map(|(d, _)| d.clone()).collect();

        let score = estimator.estimate(&fitted)?.score(&scored)?;
        info!("Feature split {}: VAMP-2 {:.4}", split + 1, score);
        on_split(split, score);
        scores.push(score);
    }
    Ok(scores)
}

impl Transform for VampModel {
    fn input_dimension(&self) -> usize {
        self.covariances.mean_0.len()
    }

    fn output_dimension(&self) -> usize {
        self.singular_values.len()
    }

    fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        project(
            data,
            &self.covariances.mean_0,
            &self.left,
            &self.singular_values,
            self.scaling,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn switching(n_frames: usize, n_noise: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = 1.0;
        Array2::from_shape_fn((n_frames, 1 + n_noise), |(_, col)| {
            if col == 0 {
                if rng.gen_bool(0.05) {
                    state = -state;
                }
                state + 0.2 * rng.gen_range(-1.0..1.0)
            } else {
                rng.gen_range(-1.0..1.0)
            }
        })
    }

    #[test]
    fn training_score_is_bounded_by_rank() {
        let data = vec![switching(1000, 2, 1)];
        let model = Vamp::new(1, 3).estimate(&data).unwrap();
        let score = model.training_score();
        assert!(score >= 1.0);
        assert!(score <= 1.0 + 3.0 + 1e-9);
        assert!(model.singular_values().iter().all(|&s| s <= 1.0 + 1e-9));
    }

    #[test]
    fn score_on_training_data_matches_training_score() {
        let data = vec![switching(600, 2, 3)];
        let model = Vamp::new(2, 3).estimate(&data).unwrap();
        let score = model.score(&data).unwrap();
        assert!((score - model.training_score()).abs() < 1e-6);
    }

    #[test]
    fn slow_signal_scores_above_noise() {
        let train = vec![switching(2000, 0, 5)];
        let test = vec![switching(2000, 0, 6)];
        let model = Vamp::new(1, 1).estimate(&train).unwrap();
        let score = model.score(&test).unwrap();
        assert!(score > 1.5, "score {score}");

        let noise: Vec<Array2<f64>> = (0..2)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(100 + seed);
                Array2::from_shape_fn((2000, 1), |_| rng.gen_range(-1.0..1.0))
            })
            .collect();
        let noise_model = Vamp::new(1, 1).estimate(&noise[..1]).unwrap();
        let noise_score = noise_model.score(&noise[1..]).unwrap();
        assert!(noise_score < 1.1, "noise score {noise_score}");
    }

    #[test]
    fn dimension_is_capped_by_rank() {
        let data = vec![switching(300, 1, 2)];
        let model = Vamp::new(1, 5).estimate(&data).unwrap();
        assert_eq!(model.output_dimension(), 2);
        assert_eq!(model.transform(data[0].view()).unwrap().ncols(), 2);
    }

    #[test]
    fn feature_splits_score_every_split() {
        let data: Vec<Array2<f64>> = (0..4).map(|seed| switching(400, 1, seed)).collect();
        let mut rng = StdRng::seed_from_u64(8);
        let mut seen = Vec::new();
        let scores = score_feature_splits(&Vamp::new(1, 2), &data, 3, 0.5, &mut rng, |i, _| {
            seen.push(i)
        })
        .unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(scores.iter().all(|&s| s > 1.0 && s <= 3.0 + 1e-9));
    }

    #[test]
    fn feature_splits_fit_on_the_complement_and_score_the_sample() {
        let data: Vec<Array2<f64>> = (0..4).map(|seed| switching(400, 2, 20 + seed)).collect();
        let estimator = Vamp::new(1, 2);
        let mut rng = StdRng::seed_from_u64(9);
        let scores =
            score_feature_splits(&estimator, &data, 3, 0.25, &mut rng, |_, _| {}).unwrap();

        let take = |indices: &[usize]| -> Vec<Array2<f64>> {
            indices.iter().map(|&i| data[i].clone()).collect()
        };
        let mut replay = StdRng::seed_from_u64(9);
        for score in scores {
            let picked = sample(&mut replay, data.len(), 1).into_vec();
            let (held_out, complement): (Vec<usize>, Vec<usize>) =
                (0..data.len()).partition(|i| picked.contains(i));

            let expected = estimator
                .estimate(&take(&complement))
                .unwrap()
                .score(&take(&held_out))
                .unwrap();
            let reversed = estimator
                .estimate(&take(&held_out))
                .unwrap()
                .score(&take(&complement))
                .unwrap();
            assert!((score - expected).abs() < 1e-12, "{score} vs {expected}");
            assert!((score - reversed).abs() > 1e-6, "{score} vs {reversed}");
        }
    }

    #[test]
    fn feature_splits_need_two_trajectories() {
        let data = vec![switching(100, 1, 1)];
        let mut rng = StdRng::seed_from_u64(8);
        assert!(matches!(
            score_feature_splits(&Vamp::new(1, 1), &data, 2, 0.5, &mut rng, |_, _| {}),
            Err(VampError::EmptySplit { n_trajectories: 1, .. })
        ));
    }

    #[test]
    fn test_data_must_match_feature_count() {
        let model = Vamp::new(1, 1).estimate(&[switching(100, 1, 1)]).unwrap();
        assert!(matches!(
            model.score(&[switching(100, 2, 1)]),
            Err(VampError::Moments(MomentsError::DimensionMismatch { .. }))
        ));
    }
}
