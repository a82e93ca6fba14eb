//! Eigen-decomposition helpers for covariance matrices
//!
//! Two-way clustered covariances are a difference of sandwiches and can come
//! out indefinite in small samples. These helpers decompose a symmetric
//! matrix by cyclic Jacobi rotations and rebuild it with its spectrum
//! floored:
//! ```text
//! V = Q Λ Q'   →   V⁺ = Q max(Λ, λ_min) Q'
//! ```
//!
//! # References
//! - Cameron, A. C., Gelbach, J. B. & Miller, D. L. (2011). "Robust Inference
//!   With Multiway Clustering." Journal of Business & Economic Statistics,
//!   29(2), 238-249.

use super::CovarianceError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Configuration for eigenvalue flooring
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PositiveDefiniteConfig {
    /// Eigenvalues below this are raised to it (default: 0.0)
    pub min_eigenvalue: f64,
    /// Rescale the floored spectrum to the original trace (default: false)
    pub preserve_trace: bool,
}

impl Default for PositiveDefiniteConfig {
    fn default() -> Self {
        Self {
            min_eigenvalue: 0.0,
            preserve_trace: false,
        }
    }
}

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Rebuild `Q Λ Q'` with the given eigenvalues.
    pub fn reconstruct(&self, eigenvalues: &Array1<f64>) -> Result<Array2<f64>, CovarianceError> {
        let n = self.eigenvectors.nrows();
        if eigenvalues.len() != n {
            return Err(CovarianceError::DimensionMismatch {
                expected: n,
                actual: eigenvalues.len(),
            });
        }
        let mut scaled = self.eigenvectors.clone();
        for (mut column, &lambda) in scaled.columns_mut().into_iter().zip(eigenvalues.iter()) {
            column.mapv_inplace(|v| v * lambda);
        }
        Ok(scaled.dot(&self.eigenvectors.t()))
    }

    /// Smallest eigenvalue.
    pub fn min_eigenvalue(&self) -> f64 {
        self.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest eigenvalue.
    pub fn max_eigenvalue(&self) -> f64 {
        self.eigenvalues
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Floor the spectrum of a symmetric matrix.
///
/// Returns the repaired matrix and the number of eigenvalues that were raised.
pub fn enforce_positive_definite(
    cov: &Array2<f64>,
    config: &PositiveDefiniteConfig,
) -> Result<(Array2<f64>, usize), CovarianceError> {
    let decomp = jacobi_eigendecomp(cov, 1e-14)?;
    let original_trace: f64 = decomp.eigenvalues.sum();

    let mut clipped = 0;
    let mut floored = decomp.eigenvalues.clone();
    for value in &mut floored {
        if *value < config.min_eigenvalue {
            *value = config.min_eigenvalue;
            clipped += 1;
        }
    }
    if clipped == 0 {
        return Ok((cov.clone(), 0));
    }

    let new_trace: f64 = floored.sum();
    if config.preserve_trace && original_trace > 0.0 && new_trace > 0.0 {
        floored.mapv_inplace(|v| v * original_trace / new_trace);
    }

    let rebuilt = decomp.reconstruct(&floored)?;
    Ok(((&rebuilt + &rebuilt.t()) / 2.0, clipped))
}

/// Whether every eigenvalue is at least `-tolerance · max(1, λ_max)`.
pub fn is_positive_semidefinite(cov: &Array2<f64>, tolerance: f64) -> bool {
    match jacobi_eigendecomp(cov, 1e-14) {
        Ok(decomp) => {
            let scale = decomp.max_eigenvalue().abs().max(1.0);
            decomp.min_eigenvalue() >= -tolerance * scale
        }
        Err(_) => false,
    }
}

/// Ratio of the largest to the smallest absolute eigenvalue
///
/// Infinite when the matrix is singular.
pub fn condition_number(cov: &Array2<f64>) -> f64 {
    match jacobi_eigendecomp(cov, 1e-14) {
        Ok(decomp) => {
            let max = decomp
                .eigenvalues
                .iter()
                .map(|v| v.abs())
                .fold(0.0, f64::max);
            let min = decomp
                .eigenvalues
                .iter()
                .map(|v| v.abs())
                .fold(f64::INFINITY, f64::min);
            if min <= f64::EPSILON * max { f64::INFINITY } else { max / min }
        }
        Err(_) => f64::INFINITY,
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix
///
/// Sweeps over every off-diagonal pair until the off-diagonal mass drops
/// below `tolerance` relative to the matrix norm.
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    tolerance: f64,
) -> Result<EigenDecomposition, CovarianceError> {
    const MAX_SWEEPS: usize = 100;

    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovarianceError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::InvalidParameter(
            "matrix has non-finite entries".to_string(),
        ));
    }

    let mut a = (matrix + &matrix.t()) / 2.0;
    let mut v = Array2::<f64>::eye(n);
    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum::<f64>()
            .sqrt();
        if off <= tolerance * norm {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() > f64::MIN_POSITIVE {
                    rotate(&mut a, &mut v, p, q);
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (to, &from) in order.iter().enumerate() {
        eigenvectors.column_mut(to).assign(&v.column(from));
    }

    Ok(EigenDecomposition {
        eigenvalues,
        eigenvectors,
    })
}

/// Annihilate `a[p, q]` with one Givens rotation, accumulating into `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let n = a.nrows();
    let (app, aqq, apq) = (a[[p, p]], a[[q, q]], a[[p, q]]);

    let theta = (aqq - app) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    a[[p, p]] = app - t * apq;
    a[[q, q]] = aqq + t * apq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for k in 0..n {
        if k != p && k != q {
            let akp = a[[k, p]];
            let akq = a[[k, q]];
            a[[k, p]] = c * akp - s * akq;
            a[[p, k]] = a[[k, p]];
            a[[k, q]] = s * akp + c * akq;
            a[[q, k]] = a[[k, q]];
        }
    }

    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_diagonal_spectrum_sorted() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 2.0]];
        let decomp = jacobi_eigendecomp(&m, 1e-14).unwrap();
        assert_abs_diff_eq!(decomp.eigenvalues[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(decomp.eigenvalues[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(decomp.eigenvalues[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reconstruction() {
        let m = array![[2.0, 1.0, 1.0], [1.0, 2.0, 1.0], [1.0, 1.0, 2.0]];
        let decomp = jacobi_eigendecomp(&m, 1e-14).unwrap();
        assert_abs_diff_eq!(decomp.eigenvalues[0], 4.0, epsilon = 1e-10);
        let back = decomp.reconstruct(&decomp.eigenvalues).unwrap();
        for (a, b) in back.iter().zip(m.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_flooring_indefinite_matrix() {
        // Eigenvalues 3 and -1.
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(!is_positive_semidefinite(&m, 1e-12));

        let (fixed, clipped) = enforce_positive_definite(&m, &PositiveDefiniteConfig::default()).unwrap();
        assert_eq!(clipped, 1);
        assert!(is_positive_semidefinite(&fixed, 1e-12));
        assert_abs_diff_eq!(fixed[[0, 1]], fixed[[1, 0]], epsilon = 1e-15);
        assert_abs_diff_eq!(fixed[[0, 0]], 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_psd_matrix_untouched() {
        let m = array![[2.0, 0.5], [0.5, 1.0]];
        let (fixed, clipped) = enforce_positive_definite(&m, &PositiveDefiniteConfig::default()).unwrap();
        assert_eq!(clipped, 0);
        assert_eq!(fixed, m);
    }

    #[test]
    fn test_trace_preserved() {
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let config = PositiveDefiniteConfig {
            min_eigenvalue: 0.1,
            preserve_trace: true,
        };
        let (fixed, _) = enforce_positive_definite(&m, &config).unwrap();
        assert_abs_diff_eq!(fixed[[0, 0]] + fixed[[1, 1]], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_condition_number() {
        let m = array![[10.0, 0.0], [0.0, 1.0]];
        assert_abs_diff_eq!(condition_number(&m), 10.0, epsilon = 1e-10);
        let singular = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(condition_number(&singular).is_infinite());
    }
}
