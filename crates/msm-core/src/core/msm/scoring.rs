//! Cross-validated VAMP-2 scoring of Markov state models.
//!
//! Trajectories are cut into short, lag-overlapping blocks so that training and
//! test sets can be drawn from the same simulations. A model estimated on half of
//! the blocks is scored on the transition counts of the other half.

use super::MsmError;
use super::counts::{count_matrix, n_states, restrict};
use super::estimation::MsmEstimator;
use super::model::MarkovStateModel;
use crate::core::utils::linalg::{DEFAULT_EPSILON, sorted_svd, spd_inv_sqrt};
use nalgebra::DMatrix;
use ndarray::Array2;
use rand::Rng;
use rand::seq::index::sample;
use tracing::{debug, instrument};

/// Number of singular functions used when scoring a model.
pub const DEFAULT_SCORE_K: usize = 10;

/// VAMP-2 score of `model` on the transitions in `test_dtrajs`.
///
/// The singular functions come from the model's own count statistics and are
/// truncated to `score_k`. Test counts are restricted to the model's active set.
/// The stationary process is part of the model spectrum, so no constant is added.
pub fn vamp2_score(
    model: &MarkovStateModel,
    test_dtrajs: &[Vec<usize>],
    score_k: usize,
) -> Result<f64, MsmError> {
    let koopman = model.transition_matrix();
    let c0t_train = model.count_matrix();
    let c00_train = DMatrix::from_diagonal(&row_sums(&c0t_train));
    let ctt_train = DMatrix::from_diagonal(&column_sums(&c0t_train));

    let c00_inv_sqrt = spd_inv_sqrt(&c00_train, DEFAULT_EPSILON);
    let ctt_inv_sqrt = spd_inv_sqrt(&ctt_train, DEFAULT_EPSILON);
    let symmetric = &c00_inv_sqrt * (&c00_train * &koopman) * &ctt_inv_sqrt;
    let (u, _, v) = sorted_svd(&symmetric)
        .ok_or_else(|| MsmError::InvalidModel("SVD of the Koopman matrix failed".into()))?;
    let k = score_k.min(u.ncols());
    let u = &c00_inv_sqrt * u.columns(0, k);
    let v = &ctt_inv_sqrt * v.columns(0, k);

    let nstates = model.nstates_full().max(n_states(test_dtrajs));
    let c0t_test = restrict(
        &count_matrix(test_dtrajs, model.lag(), nstates),
        model.active_set(),
    );
    let c00_test = DMatrix::from_diagonal(&row_sums(&c0t_test));
    let ctt_test = DMatrix::from_diagonal(&column_sums(&c0t_test));

    let a = spd_inv_sqrt(&(u.transpose() * &c00_test * &u), DEFAULT_EPSILON);
    let b = u.transpose() * &c0t_test * &v;
    let c = spd_inv_sqrt(&(v.transpose() * &ctt_test * &v), DEFAULT_EPSILON);
    Ok((a * b * c).norm_squared())
}

fn row_sums(matrix: &DMatrix<f64>) -> nalgebra::DVector<f64> {
    matrix.column_sum()
}

fn column_sums(matrix: &DMatrix<f64>) -> nalgebra::DVector<f64> {
    matrix.row_sum().transpose()
}

/// Cuts each trajectory into blocks of `2 * lag` steps that overlap by `lag`.
///
/// Every trajectory gets a random shift `s` in `[0, min(lag, len - lag))`. The
/// first block covers `[0, lag + s)` when `s > 0`; subsequent blocks start at
/// `s, s + lag, ...`. Trajectories no longer than the lag are dropped.
pub fn blocksplit_dtrajs<R: Rng>(dtrajs: &[Vec<usize>], lag: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut blocks = Vec::new();
    for dtraj in dtrajs.iter().filter(|d| d.len() > lag) {
        let len = dtraj.len();
        let shift = rng.gen_range(0..lag.min(len - lag).max(1));
        if shift > 0 {
            blocks.push(dtraj[..lag + shift].to_vec());
        }
        for start in (shift..len - lag).step_by(lag.max(1)) {
            blocks.push(dtraj[start..(start + 2 * lag).min(len)].to_vec());
        }
    }
    blocks
}

/// Randomly assigns `floor(n / 2)` blocks to training and the rest to testing.
pub fn cvsplit_dtrajs<R: Rng>(
    blocks: &[Vec<usize>],
    rng: &mut R,
) -> Result<(Vec<Vec<usize>>, Vec<Vec<usize>>), MsmError> {
    if blocks.len() < 2 {
        return Err(MsmError::TooFewBlocks {
            found: blocks.len(),
        });
    }
    let mut is_train = vec![false; blocks.len()];
    for index in sample(rng, blocks.len(), blocks.len() / 2) {
        is_train[index] = true;
    }
    let (train, test): (Vec<_>, Vec<_>) = blocks
        .iter()
        .zip(is_train)
        .partition(|(_, train)| *train);
    Ok((
        train.into_iter().map(|(block, _)| block.clone()).collect(),
        test.into_iter().map(|(block, _)| block.clone()).collect(),
    ))
}

/// Scores `n_folds` independent train/test splits of `dtrajs`.
#[instrument(skip_all, name = "score_cv", fields(n_folds = n_folds))]
pub fn score_cv<R: Rng>(
    estimator: &MsmEstimator,
    dtrajs: &[Vec<usize>],
    n_folds: usize,
    score_k: usize,
    rng: &mut R,
) -> Result<Vec<f64>, MsmError> {
    let mut scores = Vec::with_capacity(n_folds);
    for fold in 0..n_folds {
        let blocks = blocksplit_dtrajs(dtrajs, estimator.lag, rng);
        let (train, test) = cvsplit_dtrajs(&blocks, rng)?;
        let model = estimator.estimate(&train)?;
        let score = vamp2_score(&model, &test, score_k)?;
        debug!(
            "Fold {fold}: {} training and {} test blocks, VAMP-2 {score:.4}",
            train.len(),
            test.len()
        );
        scores.push(score);
    }
    Ok(scores)
}

/// Mean and population standard deviation of repeated scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std: f64,
}

impl ScoreSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
            };
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }

    /// `[[mean], [std]]`, one row per statistic.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((2, 1), |(row, _)| if row == 0 { self.mean } else { self.std })
    }
}

/// Repeats single-fold cross-validation `n_splits` times and summarizes the scores.
pub fn cross_validate<R: Rng>(
    estimator: &MsmEstimator,
    dtrajs: &[Vec<usize>],
    n_splits: usize,
    score_k: usize,
    rng: &mut R,
) -> Result<(Vec<f64>, ScoreSummary), MsmError> {
    if n_splits == 0 {
        return Err(MsmError::NoSplits);
    }
    let mut scores = Vec::with_capacity(n_splits);
    for _ in 0..n_splits {
        scores.extend(score_cv(estimator, dtrajs, 1, score_k, rng)?);
    }
    let summary = ScoreSummary::from_scores(&scores);
    Ok((scores, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn metastable_dtraj(n: usize, seed: u64) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = 0;
        (0..n)
            .map(|_| {
                let roll: f64 = rng.r#gen();
                state = match state {
                    0 if roll < 0.05 => 1,
                    1 if roll < 0.1 => 0,
                    1 if roll < 0.2 => 2,
                    2 if roll < 0.05 => 1,
                    s => s,
                };
                state
            })
            .collect()
    }

    #[test]
    fn blocks_overlap_by_lag() {
        let mut rng = StdRng::seed_from_u64(1);
        let dtraj: Vec<usize> = (0..20).collect();
        let blocks = blocksplit_dtrajs(&[dtraj], 4, &mut rng);
        assert!(!blocks.is_empty());
        for block in &blocks {
            assert!(block.len() <= 8);
            assert!(block.len() > 4);
            assert!(block.windows(2).all(|w| w[1] == w[0] + 1));
        }
        // Every lagged pair of the original trajectory appears in some block.
        for t in 0..16 {
            assert!(blocks.iter().any(|b| b.contains(&t) && b.contains(&(t + 4))));
        }
    }

    #[test]
    fn short_trajectories_are_not_split() {
        let mut rng = StdRng::seed_from_u64(1);
        let blocks = blocksplit_dtrajs(&[vec![0, 1, 2]], 3, &mut rng);
        assert!(blocks.is_empty());
    }

    #[test]
    fn cvsplit_partitions_all_blocks() {
        let mut rng = StdRng::seed_from_u64(2);
        let blocks: Vec<Vec<usize>> = (0..7).map(|i| vec![i]).collect();
        let (train, test) = cvsplit_dtrajs(&blocks, &mut rng).unwrap();
        assert_eq!(train.len(), 3);
        assert_eq!(test.len(), 4);
        let mut all: Vec<usize> = train.iter().chain(&test).map(|b| b[0]).collect();
        all.sort_unstable();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn cvsplit_needs_two_blocks() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(matches!(
            cvsplit_dtrajs(&[vec![0, 1]], &mut rng),
            Err(MsmError::TooFewBlocks { found: 1 })
        ));
    }

    #[test]
    fn score_on_training_data_is_bounded_by_state_count() {
        let dtrajs = vec![metastable_dtraj(5000, 4)];
        let model = MsmEstimator::new(1).estimate(&dtrajs).unwrap();
        let score = vamp2_score(&model, &dtrajs, DEFAULT_SCORE_K).unwrap();
        assert!(score > 1.0);
        assert!(score <= model.nstates() as f64 + 1e-9);
    }

    #[test]
    fn score_k_truncates_the_spectrum() {
        let dtrajs = vec![metastable_dtraj(5000, 4)];
        let model = MsmEstimator::new(1).estimate(&dtrajs).unwrap();
        let full = vamp2_score(&model, &dtrajs, DEFAULT_SCORE_K).unwrap();
        let one = vamp2_score(&model, &dtrajs, 1).unwrap();
        assert!(one > 0.9 && one <= 1.0 + 1e-9);
        assert!(full > one);
    }

    #[test]
    fn cross_validation_summarizes_each_split() {
        let mut rng = StdRng::seed_from_u64(9);
        let dtrajs = vec![metastable_dtraj(4000, 5), metastable_dtraj(4000, 6)];
        let estimator = MsmEstimator::new(2);
        let (scores, summary) = cross_validate(&estimator, &dtrajs, 2, 10, &mut rng).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|&s| s > 1.0 && s <= 3.0 + 1e-9));
        assert!((summary.mean - (scores[0] + scores[1]) / 2.0).abs() < 1e-12);
        assert!((summary.std - (scores[0] - scores[1]).abs() / 2.0).abs() < 1e-12);
        assert_eq!(summary.to_array().dim(), (2, 1));
    }

    #[test]
    fn cross_validation_without_splits_is_rejected() {
        let mut rng = StdRng::seed_from_u64(9);
        let dtrajs = vec![metastable_dtraj(500, 5)];
        let result = cross_validate(&MsmEstimator::new(1), &dtrajs, 0, 10, &mut rng);
        assert!(matches!(result, Err(MsmError::NoSplits)));
    }

    #[test]
    fn summary_uses_population_deviation() {
        let summary = ScoreSummary::from_scores(&[1.0, 3.0]);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.std, 1.0);
        let array = summary.to_array();
        assert_eq!(array[[0, 0]], 2.0);
        assert_eq!(array[[1, 0]], 1.0);
    }
}
