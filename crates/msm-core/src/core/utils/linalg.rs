use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array2, ArrayView2};
use std::cmp::Ordering;

/// Eigenvalues below this threshold are treated as zero when inverting covariance matrices.
pub const DEFAULT_EPSILON: f64 = 1e-10;

pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}

fn descending_order(values: &DVector<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Eigen-decomposition of a symmetric matrix, sorted by descending eigenvalue.
///
/// The input is symmetrized first so that small round-off asymmetries do not matter.
pub fn sorted_symmetric_eigen(matrix: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eigen = SymmetricEigen::new(symmetrize(matrix));
    let order = descending_order(&eigen.eigenvalues);
    let n = order.len();
    let values = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
    let vectors = DMatrix::from_fn(matrix.nrows(), n, |r, c| eigen.eigenvectors[(r, order[c])]);
    (values, vectors)
}

/// Singular value decomposition sorted by descending singular value.
///
/// Returns `(U, s, V)` with `matrix = U diag(s) V^T`, or `None` if the decomposition
/// did not produce singular vectors.
pub fn sorted_svd(matrix: &DMatrix<f64>) -> Option<(DMatrix<f64>, DVector<f64>, DMatrix<f64>)> {
    let svd = matrix.clone().svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let order = descending_order(&svd.singular_values);
    let k = order.len();
    let values = DVector::from_iterator(k, order.iter().map(|&i| svd.singular_values[i]));
    let u_sorted = DMatrix::from_fn(u.nrows(), k, |r, c| u[(r, order[c])]);
    let v_sorted = DMatrix::from_fn(v_t.ncols(), k, |r, c| v_t[(order[c], r)]);
    Some((u_sorted, values, v_sorted))
}

/// Returns `L = V_m diag(s_m^-1/2)` over the eigenpairs of the symmetric positive
/// semi-definite `w` whose eigenvalues exceed `epsilon`.
///
/// `L^T w L` is the identity on the retained subspace, so `L` whitens data with
/// covariance `w` while dropping numerically singular directions.
pub fn spd_inv_split(w: &DMatrix<f64>, epsilon: f64) -> DMatrix<f64> {
    let (values, vectors) = sorted_symmetric_eigen(w);
    let kept: Vec<usize> = (0..values.len()).filter(|&i| values[i] > epsilon).collect();
    DMatrix::from_fn(w.nrows(), kept.len(), |r, c| {
        vectors[(r, kept[c])] / values[kept[c]].sqrt()
    })
}

/// Pseudo-inverse square root `V_m diag(s_m^-1/2) V_m^T` of a symmetric positive
/// semi-definite matrix.
pub fn spd_inv_sqrt(w: &DMatrix<f64>, epsilon: f64) -> DMatrix<f64> {
    let (values, vectors) = sorted_symmetric_eigen(w);
    let n = w.nrows();
    let mut result = DMatrix::zeros(n, n);
    for (i, &value) in values.iter().enumerate() {
        if value > epsilon {
            let column = vectors.column(i);
            result += (column * column.transpose()) / value.sqrt();
        }
    }
    result
}

/// Flips each column so that its entry of largest magnitude is positive.
pub fn canonical_signs(vectors: &mut DMatrix<f64>) {
    for mut column in vectors.column_iter_mut() {
        let pivot = column
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Equal))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            column.neg_mut();
        }
    }
}

pub fn to_dmatrix(array: ArrayView2<f64>) -> DMatrix<f64> {
    let (rows, cols) = array.dim();
    DMatrix::from_fn(rows, cols, |r, c| array[[r, c]])
}

pub fn to_array2(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(r, c)| matrix[(r, c)])
}
