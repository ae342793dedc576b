use crate::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SingularMatrixError {
    /// Every entry in the given row is zero.
    ZeroRow(usize),
    /// The pivot selected for the given column is smaller in magnitude than the singular tolerance.
    SmallPivot(usize),
}

impl Display for SingularMatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &SingularMatrixError::ZeroRow(row) => write!(f, "Matrix is singular: row {} is zero.", row),
            &SingularMatrixError::SmallPivot(column) => {
                write!(f, "Matrix is singular: pivot in column {} is below tolerance.", column)
            }
        }
    }
}

impl Error for SingularMatrixError {}

/// LU decomposition of a square matrix with partial pivoting.
///
/// The decomposition follows Crout's method with implicit row scaling: the pivot in each
/// column is the entry that is largest relative to the largest entry of its original row.
/// The unit lower triangle `L` and upper triangle `U` are stored packed in a single matrix,
/// and the row interchanges are recorded in the order in which they were performed.
#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition<T: Real> {
    lu: DMatrix<T>,
    pivots: Vec<usize>,
    parity: T,
}

impl<T: Real> LuDecomposition<T> {
    /// Decomposes the given square matrix.
    ///
    /// Fails if a row of the matrix is zero, or if a pivot of magnitude smaller than
    /// `singular_tolerance` is encountered.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn decompose(matrix: DMatrix<T>, singular_tolerance: T) -> Result<Self, SingularMatrixError> {
        assert!(matrix.is_square(), "LU decomposition requires a square matrix");
        let n = matrix.nrows();
        let mut a = matrix;
        let mut pivots = vec![0; n];
        let mut parity = 1.0;

        // Implicit scaling of each row
        let mut scaling = Vec::with_capacity(n);
        for i in 0..n {
            let big = a.row(i).iter().fold(0.0, |max: T, a_ij| max.max(a_ij.abs()));
            if big == 0.0 {
                return Err(SingularMatrixError::ZeroRow(i));
            }
            scaling.push(1.0 / big);
        }

        for j in 0..n {
            for i in 0..j {
                let mut sum = a[(i, j)];
                for k in 0..i {
                    sum -= a[(i, k)] * a[(k, j)];
                }
                a[(i, j)] = sum;
            }

            let mut big = 0.0;
            let mut imax = j;
            for i in j..n {
                let mut sum = a[(i, j)];
                for k in 0..j {
                    sum -= a[(i, k)] * a[(k, j)];
                }
                a[(i, j)] = sum;
                let candidate = scaling[i] * sum.abs();
                if candidate >= big {
                    big = candidate;
                    imax = i;
                }
            }

            if imax != j {
                a.swap_rows(imax, j);
                parity = -parity;
                scaling[imax] = scaling[j];
            }
            pivots[j] = imax;

            let pivot = a[(j, j)];
            if pivot.abs() < singular_tolerance {
                return Err(SingularMatrixError::SmallPivot(j));
            }
            if j + 1 < n {
                let inv_pivot = 1.0 / pivot;
                for i in (j + 1)..n {
                    a[(i, j)] *= inv_pivot;
                }
            }
        }

        Ok(Self { lu: a, pivots, parity })
    }

    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    /// The packed `L` and `U` factors of the row-permuted matrix.
    pub fn lu(&self) -> &DMatrix<T> {
        &self.lu
    }

    /// The row interchanged with row `j` at step `j` of the decomposition.
    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    /// `+1` for an even number of row interchanges, `-1` for an odd number.
    pub fn parity(&self) -> T {
        self.parity
    }

    pub fn determinant(&self) -> T {
        self.lu
            .diagonal()
            .iter()
            .fold(self.parity, |det, &u_jj| det * u_jj)
    }

    /// Solves `A x = b`, overwriting `b` with the solution `x`.
    ///
    /// # Panics
    ///
    /// Panics if `b` does not have the same dimension as the decomposed matrix.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn solve_in_place(&self, b: &mut [T]) {
        let n = self.dimension();
        assert_eq!(b.len(), n, "Right-hand side must match matrix dimension");
        let a = &self.lu;

        // Forward substitution, unscrambling the permutation as we go. `first_nonzero` lets
        // us skip the leading zeros of b, which is the common case for basis vectors.
        let mut first_nonzero = None;
        for i in 0..n {
            let ip = self.pivots[i];
            let mut sum = b[ip];
            b[ip] = b[i];
            if let Some(start) = first_nonzero {
                for j in start..i {
                    sum -= a[(i, j)] * b[j];
                }
            } else if sum != 0.0 {
                first_nonzero = Some(i);
            }
            b[i] = sum;
        }

        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= a[(i, j)] * b[j];
            }
            b[i] = sum / a[(i, i)];
        }
    }

    pub fn solve(&self, b: &DVector<T>) -> DVector<T> {
        let mut x = b.clone();
        self.solve_in_place(x.as_mut_slice());
        x
    }

    /// Computes the inverse of the decomposed matrix column by column, by solving for each
    /// standard basis vector.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn inverse(&self) -> DMatrix<T> {
        let n = self.dimension();
        let mut inverse = DMatrix::zeros(n, n);
        let mut column = vec![0.0; n];
        for i in 0..n {
            column.iter_mut().for_each(|c| *c = 0.0);
            column[i] = 1.0;
            self.solve_in_place(&mut column);
            inverse.column_mut(i).copy_from_slice(&column);
        }
        inverse
    }
}
