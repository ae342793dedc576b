use crate::{Real, MAX_JACOBI_SWEEPS};
use log::debug;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EigenanalysisError {
    /// The off-diagonal entries did not vanish within the given number of sweeps.
    NotConverged(usize),
    /// The matrix, or an intermediate result of the rotations, has an entry that is NaN or
    /// infinite.
    NonFinite,
}

impl Display for EigenanalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &EigenanalysisError::NotConverged(sweeps) => {
                write!(f, "Jacobi eigenanalysis failed to converge within {} sweeps.", sweeps)
            }
            EigenanalysisError::NonFinite => write!(f, "Jacobi eigenanalysis encountered a non-finite entry."),
        }
    }
}

impl Error for EigenanalysisError {}

/// Eigenvalues and eigenvectors of a real symmetric matrix.
///
/// Eigenvector `i` is stored in column `i` of `eigenvectors` and belongs to eigenvalue `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen<T: Real> {
    pub eigenvalues: DVector<T>,
    pub eigenvectors: DMatrix<T>,
    /// Number of Jacobi rotations that were applied.
    pub rotations: usize,
}

impl<T: Real> SymmetricEigen<T> {
    /// Reorders the eigenvalues from largest to smallest, permuting the eigenvector columns
    /// along with them.
    ///
    /// Equal eigenvalues keep their relative order.
    pub fn sort_descending(&mut self) {
        let n = self.eigenvalues.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| {
            self.eigenvalues[j]
                .partial_cmp(&self.eigenvalues[i])
                .unwrap_or(Ordering::Equal)
        });

        let eigenvalues = DVector::from_fn(n, |i, _| self.eigenvalues[order[i]]);
        let eigenvectors = DMatrix::from_fn(n, n, |i, j| self.eigenvectors[(i, order[j])]);
        self.eigenvalues = eigenvalues;
        self.eigenvectors = eigenvectors;
    }

    /// Same as [`sort_descending`](Self::sort_descending), but consumes and returns `self`.
    pub fn sorted_descending(mut self) -> Self {
        self.sort_descending();
        self
    }
}

/// Checks that `a_ij` and `a_ji` agree for all off-diagonal pairs.
///
/// Entries are compared relative to their magnitude, but never with a scale smaller than one,
/// so that entries near zero are compared absolutely.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn is_symmetric<T: Real>(matrix: &DMatrix<T>, tolerance: T) -> bool {
    if !matrix.is_square() {
        return false;
    }
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let a_ij = matrix[(i, j)];
            let a_ji = matrix[(j, i)];
            let scale = a_ij.abs().max(a_ji.abs()).max(1.0);
            if (a_ij - a_ji).abs() > tolerance * scale {
                return false;
            }
        }
    }
    true
}

#[inline]
fn rotate<T: Real>(a: &mut DMatrix<T>, s: T, tau: T, (i, j): (usize, usize), (k, l): (usize, usize)) {
    let g = a[(i, j)];
    let h = a[(k, l)];
    a[(i, j)] = g - s * (h + g * tau);
    a[(k, l)] = h + s * (g - h * tau);
}

/// Computes all eigenvalues and eigenvectors of a real symmetric matrix by cyclic Jacobi
/// rotations.
///
/// Only the diagonal and the upper triangle of the matrix are read, so a non-symmetric
/// matrix is treated as the symmetric matrix with the same upper triangle. The eigenvalues
/// are returned in no particular order, see [`SymmetricEigen::sort_descending`].
///
/// Terminates as soon as the off-diagonal entries have vanished, and fails if this does not
/// happen within [`MAX_JACOBI_SWEEPS`] sweeps. Entries that are NaN or infinite, whether in
/// the input or produced by the rotations, are reported as [`EigenanalysisError::NonFinite`].
///
/// # Panics
///
/// Panics if the matrix is not square.
#[allow(non_snake_case)]
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn jacobi_eigenanalysis<T: Real>(matrix: &DMatrix<T>) -> Result<SymmetricEigen<T>, EigenanalysisError> {
    assert!(matrix.is_square(), "Eigenanalysis requires a square matrix");
    let n = matrix.nrows();
    if (0..n).any(|p| (p..n).any(|q| !matrix[(p, q)].is_finite())) {
        return Err(EigenanalysisError::NonFinite);
    }
    let mut a = matrix.clone();
    let mut V = DMatrix::identity(n, n);
    let mut d = a.diagonal();
    let mut b = d.clone();
    let mut z = DVector::zeros(n);
    let mut rotations = 0;

    for sweep in 1..=MAX_JACOBI_SWEEPS {
        let mut off_diagonal_sum = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal_sum += a[(p, q)].abs();
            }
        }
        if !off_diagonal_sum.is_finite() || d.iter().any(|x| !x.is_finite()) {
            return Err(EigenanalysisError::NonFinite);
        }
        if off_diagonal_sum == 0.0 {
            debug!("Jacobi eigenanalysis converged after {} sweeps", sweep - 1);
            return Ok(SymmetricEigen {
                eigenvalues: d,
                eigenvectors: V,
                rotations,
            });
        }

        // Only rotate sizeable entries during the first few sweeps
        let threshold = if sweep < 4 {
            0.2 * off_diagonal_sum / T::from_usize(n * n).unwrap()
        } else {
            0.0
        };

        for p in 0..n {
            for q in (p + 1)..n {
                let a_pq = a[(p, q)];
                let g = 100.0 * a_pq.abs();
                if sweep > 4 && d[p].abs() + g == d[p].abs() && d[q].abs() + g == d[q].abs() {
                    // Negligible compared to the diagonal
                    a[(p, q)] = 0.0;
                } else if a_pq.abs() > threshold {
                    let h = d[q] - d[p];
                    let t = if h.abs() + g == h.abs() {
                        a_pq / h
                    } else {
                        let theta = 0.5 * h / a_pq;
                        let t = 1.0 / (theta.abs() + (1.0 + theta * theta).sqrt());
                        if theta < 0.0 {
                            -t
                        } else {
                            t
                        }
                    };
                    let c = 1.0 / (1.0 + t * t).sqrt();
                    let s = t * c;
                    let tau = s / (1.0 + c);
                    let h = t * a_pq;
                    z[p] -= h;
                    z[q] += h;
                    d[p] -= h;
                    d[q] += h;
                    a[(p, q)] = 0.0;

                    for j in 0..p {
                        rotate(&mut a, s, tau, (j, p), (j, q));
                    }
                    for j in (p + 1)..q {
                        rotate(&mut a, s, tau, (p, j), (j, q));
                    }
                    for j in (q + 1)..n {
                        rotate(&mut a, s, tau, (p, j), (q, j));
                    }
                    for j in 0..n {
                        rotate(&mut V, s, tau, (j, p), (j, q));
                    }
                    rotations += 1;
                }
            }
        }

        b += &z;
        d.copy_from(&b);
        z.fill(0.0);
    }

    Err(EigenanalysisError::NotConverged(MAX_JACOBI_SWEEPS))
}
