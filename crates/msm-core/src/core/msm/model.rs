use super::MsmError;
use crate::core::decomposition::tica::implied_timescale;
use crate::core::utils::linalg::sorted_symmetric_eigen;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// An estimated Markov state model, restricted to its active set.
///
/// Matrices are stored as nested rows so that the model round-trips through TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MarkovStateModel {
    lag: usize,
    reversible: bool,
    nstates_full: usize,
    active_set: Vec<usize>,
    stationary_distribution: Vec<f64>,
    transition_matrix: Vec<Vec<f64>>,
    count_matrix_active: Vec<Vec<f64>>,
}

fn to_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

fn from_rows(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let n = rows.len();
    DMatrix::from_fn(n, n, |r, c| rows[r].get(c).copied().unwrap_or(0.0))
}

impl MarkovStateModel {
    pub fn new(
        lag: usize,
        reversible: bool,
        nstates_full: usize,
        active_set: Vec<usize>,
        count_matrix_active: &DMatrix<f64>,
        transition_matrix: &DMatrix<f64>,
        stationary_distribution: &DVector<f64>,
    ) -> Self {
        Self {
            lag,
            reversible,
            nstates_full,
            active_set,
            stationary_distribution: stationary_distribution.iter().copied().collect(),
            transition_matrix: to_rows(transition_matrix),
            count_matrix_active: to_rows(count_matrix_active),
        }
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    /// Number of states in the active set.
    pub fn nstates(&self) -> usize {
        self.active_set.len()
    }

    /// Number of states in the discrete trajectories the model was estimated from.
    pub fn nstates_full(&self) -> usize {
        self.nstates_full
    }

    /// Original state labels of the active states, in model order.
    pub fn active_set(&self) -> &[usize] {
        &self.active_set
    }

    /// Fraction of all states that belong to the active set.
    pub fn active_state_fraction(&self) -> f64 {
        if self.nstates_full == 0 {
            0.0
        } else {
            self.active_set.len() as f64 / self.nstates_full as f64
        }
    }

    pub fn stationary_distribution(&self) -> &[f64] {
        &self.stationary_distribution
    }

    pub fn transition_matrix(&self) -> DMatrix<f64> {
        from_rows(&self.transition_matrix)
    }

    pub fn count_matrix(&self) -> DMatrix<f64> {
        from_rows(&self.count_matrix_active)
    }

    /// Eigenvalues of the transition matrix sorted by descending magnitude.
    ///
    /// Reversible models have a real spectrum, obtained from the symmetric matrix
    /// `D^1/2 T D^-1/2` with `D = diag(pi)`. For non-reversible models only the
    /// moduli of the complex eigenvalues are reported.
    pub fn eigenvalues(&self) -> Vec<f64> {
        let t = self.transition_matrix();
        let mut values: Vec<f64> = if self.reversible {
            let sqrt_pi: Vec<f64> = self.stationary_distribution.iter().map(|p| p.sqrt()).collect();
            let symmetric = DMatrix::from_fn(t.nrows(), t.ncols(), |i, j| {
                if sqrt_pi[j] > 0.0 {
                    sqrt_pi[i] * t[(i, j)] / sqrt_pi[j]
                } else {
                    0.0
                }
            });
            sorted_symmetric_eigen(&symmetric).0.iter().copied().collect()
        } else {
            t.complex_eigenvalues().iter().map(|value| value.norm()).collect()
        };
        values.sort_by(|a, b| b.abs().partial_cmp(&a.abs()).unwrap_or(Ordering::Equal));
        values
    }

    /// Implied timescales `-lag / ln|lambda|` of all but the stationary eigenvalue,
    /// in steps of the discrete trajectories.
    pub fn timescales(&self) -> Vec<f64> {
        self.eigenvalues()
            .into_iter()
            .skip(1)
            .map(|value| implied_timescale(self.lag, value))
            .collect()
    }

    /// Active states ordered by descending stationary probability, with their
    /// original labels.
    pub fn most_populated(&self, count: usize) -> Vec<(usize, f64)> {
        let mut states: Vec<(usize, f64)> = self
            .active_set
            .iter()
            .copied()
            .zip(self.stationary_distribution.iter().copied())
            .collect();
        states.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        states.truncate(count);
        states
    }

    fn validate(&self) -> Result<(), MsmError> {
        let n = self.active_set.len();
        let square = |rows: &[Vec<f64>]| rows.len() == n && rows.iter().all(|r| r.len() == n);
        if self.stationary_distribution.len() != n {
            return Err(MsmError::InvalidModel(format!(
                "stationary distribution has {} entries for {} active states",
                self.stationary_distribution.len(),
                n
            )));
        }
        if !square(&self.transition_matrix) || !square(&self.count_matrix_active) {
            return Err(MsmError::InvalidModel(format!(
                "matrices must be {n} x {n} to match the active set"
            )));
        }
        if self.active_set.iter().any(|&s| s >= self.nstates_full) {
            return Err(MsmError::InvalidModel(
                "active set refers to states outside nstates-full".into(),
            ));
        }
        Ok(())
    }

    /// Writes the model as TOML, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), MsmError> {
        let content = toml::to_string(self)?;
        fs::write(path, content).map_err(|source| MsmError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, MsmError> {
        let content = fs::read_to_string(path).map_err(|source| MsmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = toml::from_str(&content)?;
        model.validate()?;
        Ok(model)
    }
}
