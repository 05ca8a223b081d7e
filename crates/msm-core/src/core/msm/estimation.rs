use super::MsmError;
use super::counts::{count_matrix, largest_connected_set, n_states, restrict};
use super::model::MarkovStateModel;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, instrument, warn};

/// Maximum-likelihood estimation of a Markov state model.
#[derive(Debug, Clone, PartialEq)]
pub struct MsmEstimator {
    pub lag: usize,
    /// Enforce detailed balance with respect to the stationary distribution.
    pub reversible: bool,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl MsmEstimator {
    pub fn new(lag: usize) -> Self {
        Self {
            lag,
            reversible: true,
            max_iter: 100_000,
            tolerance: 1e-8,
        }
    }

    pub fn with_reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    /// Estimates a model on the largest connected set of `dtrajs`.
    ///
    /// # Errors
    ///
    /// Returns [`MsmError::ZeroLag`] for a zero lag, [`MsmError::NoData`] if no
    /// states are present and [`MsmError::NoTransitions`] if the active set carries
    /// no counts at this lag.
    #[instrument(skip_all, name = "msm", fields(lag = self.lag, reversible = self.reversible))]
    pub fn estimate(&self, dtrajs: &[Vec<usize>]) -> Result<MarkovStateModel, MsmError> {
        if self.lag == 0 {
            return Err(MsmError::ZeroLag);
        }
        let nstates_full = n_states(dtrajs);
        if nstates_full == 0 {
            return Err(MsmError::NoData);
        }

        let counts = count_matrix(dtrajs, self.lag, nstates_full);
        let active_set = largest_connected_set(&counts);
        let active_counts = restrict(&counts, &active_set);
        if active_counts.sum() <= 0.0 {
            return Err(MsmError::NoTransitions { lag: self.lag });
        }
        debug!(
            "Active set holds {} of {} states and {:.0} of {:.0} counts",
            active_set.len(),
            nstates_full,
            active_counts.sum(),
            counts.sum()
        );

        let (transition_matrix, stationary) = if self.reversible {
            self.reversible_mle(&active_counts)
        } else {
            let transition_matrix = row_normalize(&active_counts);
            let stationary = stationary_distribution(&transition_matrix)?;
            (transition_matrix, stationary)
        };

        info!(
            "Estimated MSM on {} active states at lag {}",
            active_set.len(),
            self.lag
        );
        Ok(MarkovStateModel::new(
            self.lag,
            self.reversible,
            nstates_full,
            active_set,
            &active_counts,
            &transition_matrix,
            &stationary,
        ))
    }

    /// Fixed-point iteration for the reversible maximum-likelihood transition matrix.
    ///
    /// Iterates `x_ij = (c_ij + c_ji) / (c_i / x_i + c_j / x_j)` on the symmetric
    /// unnormalized flux `x`, where `c_i` and `x_i` are row sums. Then
    /// `T_ij = x_ij / x_i` and `pi_i = x_i / sum(x)`. If the stationary
    /// distribution has not settled after `max_iter` iterations, the current
    /// estimate is returned with a warning.
    fn reversible_mle(&self, counts: &DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
        let n = counts.nrows();
        let symmetric = counts + counts.transpose();
        let row_counts: Vec<f64> = counts.row_iter().map(|row| row.sum()).collect();

        let mut x = &symmetric / symmetric.sum();
        let mut pi = row_sums(&x);
        let mut converged = false;

        for iteration in 0..self.max_iter {
            let ratio: Vec<f64> = (0..n)
                .map(|i| if pi[i] > 0.0 { row_counts[i] / pi[i] } else { 0.0 })
                .collect();
            let mut next = DMatrix::from_fn(n, n, |i, j| {
                let numerator = symmetric[(i, j)];
                let denominator = ratio[i] + ratio[j];
                if numerator > 0.0 && denominator > 0.0 {
                    numerator / denominator
                } else {
                    0.0
                }
            });
            let total = next.sum();
            next /= total;

            let next_pi = row_sums(&next);
            let change = (&next_pi - &pi).norm();
            x = next;
            pi = next_pi;
            if change < self.tolerance {
                debug!("Reversible MLE converged after {} iterations", iteration + 1);
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(
                "Reversible MLE did not converge within {} iterations; using last estimate",
                self.max_iter
            );
        }

        let transition_matrix = DMatrix::from_fn(n, n, |i, j| {
            if pi[i] > 0.0 { x[(i, j)] / pi[i] } else { 0.0 }
        });
        let stationary = &pi / pi.sum();
        (transition_matrix, stationary)
    }
}

fn row_sums(matrix: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(matrix.nrows(), matrix.row_iter().map(|row| row.sum()))
}

/// Row-stochastic matrix from counts. Rows without counts become self-loops.
pub fn row_normalize(counts: &DMatrix<f64>) -> DMatrix<f64> {
    let mut matrix = counts.clone();
    for (i, mut row) in matrix.row_iter_mut().enumerate() {
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        } else {
            row.fill(0.0);
            row[i] = 1.0;
        }
    }
    matrix
}

/// Stationary distribution of an irreducible row-stochastic matrix.
///
/// Solves `pi (T - I) = 0` with one balance equation replaced by `sum(pi) = 1`.
pub fn stationary_distribution(transition_matrix: &DMatrix<f64>) -> Result<DVector<f64>, MsmError> {
    let n = transition_matrix.nrows();
    let mut system = transition_matrix.transpose() - DMatrix::identity(n, n);
    system.row_mut(n - 1).fill(1.0);
    let mut rhs = DVector::zeros(n);
    rhs[n - 1] = 1.0;

    let solution = system.lu().solve(&rhs).ok_or_else(|| {
        MsmError::InvalidModel("transition matrix has no unique stationary distribution".into())
    })?;
    let clipped = solution.map(|p| p.max(0.0));
    Ok(&clipped / clipped.sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_dtraj() -> Vec<usize> {
        // 0 stays 0 most of the time, 1 leaves more often.
        let mut dtraj = Vec::new();
        for _ in 0..50 {
            dtraj.extend_from_slice(&[0, 0, 0, 0, 1, 1, 0]);
        }
        dtraj
    }

    #[test]
    fn reversible_estimate_is_stochastic_and_balanced() {
        let dtrajs = vec![two_state_dtraj(), vec![0, 1, 2, 1, 2, 0, 2, 2, 1, 0]];
        let model = MsmEstimator::new(1).estimate(&dtrajs).unwrap();
        let t = model.transition_matrix();
        let pi = model.stationary_distribution();

        for row in t.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-10);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
        assert!((pi.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        for i in 0..t.nrows() {
            for j in 0..t.nrows() {
                assert!((pi[i] * t[(i, j)] - pi[j] * t[(j, i)]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn reversible_estimate_of_symmetric_counts_matches_row_normalization() {
        let dtrajs = vec![vec![0, 1, 0, 1, 1, 0, 0, 1, 0]];
        let counts = count_matrix(&dtrajs, 1, 2);
        assert_eq!(counts, counts.transpose());
        let model = MsmEstimator::new(1).estimate(&dtrajs).unwrap();
        let expected = row_normalize(&counts);
        assert!((model.transition_matrix() - expected).abs().max() < 1e-6);
    }

    #[test]
    fn nonreversible_estimate_is_row_normalized_counts() {
        let dtrajs = vec![vec![0, 0, 1, 2, 0, 1, 1, 2, 2, 0]];
        let model = MsmEstimator::new(1)
            .with_reversible(false)
            .estimate(&dtrajs)
            .unwrap();
        let t = model.transition_matrix();
        assert!((t[(0, 0)] - 1.0 / 3.0).abs() < 1e-12);
        assert!((t[(0, 1)] - 2.0 / 3.0).abs() < 1e-12);

        let pi = DVector::from_vec(model.stationary_distribution().to_vec());
        let propagated = (pi.transpose() * &t).transpose();
        assert!((propagated - pi).norm() < 1e-10);
    }

    #[test]
    fn transient_states_are_excluded_from_the_model() {
        let dtrajs = vec![vec![3, 0, 1, 0, 1, 0]];
        let model = MsmEstimator::new(1).estimate(&dtrajs).unwrap();
        assert_eq!(model.active_set(), &[0, 1]);
        assert_eq!(model.nstates(), 2);
        assert_eq!(model.nstates_full(), 4);
    }

    #[test]
    fn lag_longer_than_every_trajectory_has_no_transitions() {
        let dtrajs = vec![vec![0, 1, 0]];
        assert!(matches!(
            MsmEstimator::new(5).estimate(&dtrajs),
            Err(MsmError::NoTransitions { lag: 5 })
        ));
    }

    #[test]
    fn zero_lag_is_rejected() {
        assert!(matches!(
            MsmEstimator::new(0).estimate(&[vec![0, 1]]),
            Err(MsmError::ZeroLag)
        ));
    }

    #[test]
    fn stationary_distribution_of_two_state_chain() {
        let t = DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.2, 0.8]);
        let pi = stationary_distribution(&t).unwrap();
        assert!((pi[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((pi[1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
