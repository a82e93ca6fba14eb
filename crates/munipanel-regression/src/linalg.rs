//! Dense solves for the normal equations.
//!
//! The cross-product matrix `X'X` is factored column by column. A column
//! whose Cholesky pivot collapses relative to its own diagonal lies (up to
//! tolerance) in the span of the columns before it:
//! ```text
//! d_j = a_jj - Σ_{k<j} l_jk²         (squared residual norm of column j)
//! d_j <= tol · s_j     =>  column j is collinear
//! ```
//! where `s_j` is a reference scale for the column: its own diagonal by
//! default, or the sum of squares of the column before fixed effects were
//! absorbed, so that a regressor wiped out by demeaning is caught even
//! though its demeaned diagonal is tiny. Every collapsing column is
//! reported, not only the first.

use ndarray::{Array1, Array2};

/// Relative pivot tolerance used for rank detection (default: 1e-9)
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-9;

/// Lower-triangular factor `L` with `A = L L'`.
#[derive(Debug, Clone)]
pub struct Cholesky {
    factor: Array2<f64>,
}

impl Cholesky {
    /// Factor a symmetric matrix.
    ///
    /// Returns the indices of the collinear columns when the matrix is not
    /// positive definite at the given relative tolerance.
    pub fn factor(a: &Array2<f64>, tolerance: f64) -> Result<Self, Vec<usize>> {
        let scales: Vec<f64> = a.diag().to_vec();
        Self::factor_scaled(a, &scales, tolerance)
    }

    /// Factor with an explicit reference scale per column.
    pub fn factor_scaled(a: &Array2<f64>, scales: &[f64], tolerance: f64) -> Result<Self, Vec<usize>> {
        let n = a.nrows();
        let mut l = Array2::<f64>::zeros((n, n));
        let mut dropped = Vec::new();

        for j in 0..n {
            let mut d = a[[j, j]];
            for k in 0..j {
                d -= l[[j, k]] * l[[j, k]];
            }
            let scale = scales.get(j).map_or(a[[j, j]], |s| *s).abs();
            if !d.is_finite() || d <= tolerance * scale {
                dropped.push(j);
                continue;
            }
            let pivot = d.sqrt();
            l[[j, j]] = pivot;
            for i in (j + 1)..n {
                let mut s = a[[i, j]];
                for k in 0..j {
                    s -= l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = s / pivot;
            }
        }

        if dropped.is_empty() {
            Ok(Self { factor: l })
        } else {
            Err(dropped)
        }
    }

    /// Dimension of the factored matrix.
    pub fn dim(&self) -> usize {
        self.factor.nrows()
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let n = self.dim();
        let l = &self.factor;

        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut s = b[i];
            for k in 0..i {
                s -= l[[i, k]] * z[k];
            }
            z[i] = s / l[[i, i]];
        }

        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut s = z[i];
            for k in (i + 1)..n {
                s -= l[[k, i]] * x[k];
            }
            x[i] = s / l[[i, i]];
        }
        x
    }

    /// `A^{-1}`, symmetrised.
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.dim();
        let mut inv = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut e = Array1::<f64>::zeros(n);
            e[j] = 1.0;
            inv.column_mut(j).assign(&self.solve(&e));
        }
        symmetrize(&inv)
    }
}

/// `(M + M') / 2`
pub fn symmetrize(m: &Array2<f64>) -> Array2<f64> {
    (m + &m.t()) / 2.0
}

/// `A B A` for symmetric `A`.
pub fn sandwich(bread: &Array2<f64>, meat: &Array2<f64>) -> Array2<f64> {
    bread.dot(meat).dot(bread)
}
