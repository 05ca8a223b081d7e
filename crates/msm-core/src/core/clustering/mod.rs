//! Discretization of continuous trajectories into cluster states.

pub mod kmeans;

use ndarray::{Array1, Array2};

/// Cluster assignments of every frame, grouped per trajectory, together with the
/// cluster centers they refer to.
#[derive(Debug, Clone)]
pub struct Discretization {
    pub dtrajs: Vec<Vec<usize>>,
    pub centers: Array2<f64>,
}

impl Discretization {
    pub fn n_states(&self) -> usize {
        self.centers.nrows()
    }

    /// Assignments as `(frames, 1)` columns, the layout of a projection onto a
    /// single discrete coordinate.
    pub fn assignment_columns(&self) -> Vec<Array2<i32>> {
        self.dtrajs
            .iter()
            .map(|dtraj| Array2::from_shape_fn((dtraj.len(), 1), |(i, _)| dtraj[i] as i32))
            .collect()
    }

    /// Assignments as flat state sequences.
    pub fn state_sequences(&self) -> Vec<Array1<i32>> {
        self.dtrajs
            .iter()
            .map(|dtraj| dtraj.iter().map(|&s| s as i32).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_are_exported_in_both_layouts() {
        let discretization = Discretization {
            dtrajs: vec![vec![0, 2, 1], vec![1]],
            centers: Array2::zeros((3, 2)),
        };
        assert_eq!(discretization.n_states(), 3);

        let columns = discretization.assignment_columns();
        assert_eq!(columns[0].dim(), (3, 1));
        assert_eq!(columns[0][[1, 0]], 2);

        let sequences = discretization.state_sequences();
        assert_eq!(sequences[1].to_vec(), vec![1]);
    }
}
