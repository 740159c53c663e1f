//! Covariance and precision matrices over `n × d` feature data.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};

/// Column means; zeros when `data` has no rows.
pub fn column_means(data: &Array2<f64>) -> Array1<f64> {
    data.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()))
}

/// Population covariance of the rows of `data`, `d × d`.
pub fn covariance(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows();
    if n == 0 {
        return Array2::zeros((data.ncols(), data.ncols()));
    }
    let centered = data - &column_means(data);
    centered.t().dot(&centered) / n as f64
}

/// Inverse of `cov + ridge·I` through its Cholesky factor.
///
/// `None` when `cov` is not square or the regularised matrix is not
/// positive definite.
pub fn precision(cov: &Array2<f64>, ridge: f64) -> Option<Array2<f64>> {
    let d = cov.nrows();
    if cov.ncols() != d {
        return None;
    }
    let regularised = DMatrix::from_fn(d, d, |i, j| {
        cov[[i, j]] + if i == j { ridge } else { 0.0 }
    });
    let inverse = regularised.cholesky()?.inverse();
    Some(Array2::from_shape_fn((d, d), |(i, j)| inverse[(i, j)]))
}

/// Squared Mahalanobis distance `(x - μ)ᵀ P (x - μ)` of every row.
pub fn mahalanobis_sq(
    data: &Array2<f64>,
    centre: &Array1<f64>,
    precision: &Array2<f64>,
) -> Array1<f64> {
    let centered = data - centre;
    (&centered.dot(precision) * &centered).sum_axis(Axis(1))
}
