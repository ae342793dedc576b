use crate::cache::{Scratch, ValueCache};
use crate::error::{AssignmentError, ConstructionError, EvaluationError};
use crate::field::{square_dimension, Field, MatrixOp, Operator, OperatorInput};
use femfield_linalg::{
    is_symmetric, jacobi_eigenanalysis, matrix_to_quaternion, quaternion_to_matrix, LuDecomposition,
    SINGULAR_TOLERANCE, SYMMETRY_TOLERANCE,
};
use log::warn;
use nalgebra::{DMatrix, DVector, Matrix4, Quaternion};

fn incompatible(operator: &'static str, detail: String) -> ConstructionError {
    ConstructionError::IncompatibleShape { operator, detail }
}

pub(super) fn component_count(
    op: &MatrixOp,
    keyword: &'static str,
    sources: &[&Field],
    counts: &[usize],
) -> Result<usize, ConstructionError> {
    let expected_sources = match op {
        MatrixOp::MatrixMultiply { .. } | MatrixOp::Projection => 2,
        _ => 1,
    };
    if counts.len() != expected_sources {
        return Err(ConstructionError::WrongSourceCount {
            operator: keyword,
            expected: expected_sources,
            actual: counts.len(),
        });
    }
    let square = |components: usize| {
        square_dimension(components).ok_or(ConstructionError::NotSquareMatrix {
            operator: keyword,
            components,
        })
    };
    let unsupported = |components: usize| ConstructionError::UnsupportedComponentCount {
        operator: keyword,
        components,
    };

    match *op {
        MatrixOp::Determinant => match counts[0] {
            1 | 4 | 9 => Ok(1),
            other => Err(unsupported(other)),
        },
        MatrixOp::Eigenvalues => square(counts[0]),
        MatrixOp::Eigenvectors => match sources[0].operator {
            Operator::Matrix(MatrixOp::Eigenvalues) => Ok(counts[0] * counts[0]),
            _ => Err(ConstructionError::NotEigenvaluesField),
        },
        MatrixOp::MatrixInvert => square(counts[0]).map(|n| n * n),
        MatrixOp::MatrixMultiply { number_of_rows } => {
            if number_of_rows == 0 {
                return Err(ConstructionError::InvalidParameter {
                    operator: keyword,
                    detail: "number of rows must be positive".to_string(),
                });
            }
            if counts[0] % number_of_rows != 0 {
                return Err(incompatible(
                    keyword,
                    format!(
                        "first source with {} components can not have {} rows",
                        counts[0], number_of_rows
                    ),
                ));
            }
            let inner = counts[0] / number_of_rows;
            if counts[1] % inner != 0 {
                return Err(incompatible(
                    keyword,
                    format!("second source with {} components can not have {} rows", counts[1], inner),
                ));
            }
            Ok(number_of_rows * (counts[1] / inner))
        }
        MatrixOp::Projection => {
            let columns = counts[0] + 1;
            if counts[1] % columns != 0 || counts[1] / columns < 2 {
                return Err(incompatible(
                    keyword,
                    format!(
                        "projection matrix with {} components does not have {} columns",
                        counts[1], columns
                    ),
                ));
            }
            Ok(counts[1] / columns - 1)
        }
        MatrixOp::Transpose { source_number_of_rows } => {
            if source_number_of_rows == 0 {
                return Err(ConstructionError::InvalidParameter {
                    operator: keyword,
                    detail: "number of rows must be positive".to_string(),
                });
            }
            if counts[0] % source_number_of_rows != 0 {
                return Err(incompatible(
                    keyword,
                    format!(
                        "source with {} components can not have {} rows",
                        counts[0], source_number_of_rows
                    ),
                ));
            }
            Ok(counts[0])
        }
        MatrixOp::QuaternionToMatrix => match counts[0] {
            4 => Ok(16),
            other => Err(unsupported(other)),
        },
        MatrixOp::MatrixToQuaternion => match counts[0] {
            16 => Ok(4),
            other => Err(unsupported(other)),
        },
    }
}

#[rustfmt::skip]
fn determinant(a: &[f64]) -> f64 {
    match a.len() {
        1 => a[0],
        4 => a[0] * a[3] - a[1] * a[2],
        _ => a[0] * (a[4] * a[8] - a[5] * a[7])
           - a[1] * (a[3] * a[8] - a[5] * a[6])
           + a[2] * (a[3] * a[7] - a[4] * a[6]),
    }
}

/// Source values of a transposed field, given the values of the transpose.
pub(crate) fn inverse_transpose(source_number_of_rows: usize, values: &[f64]) -> Vec<f64> {
    let m = source_number_of_rows;
    let n = values.len() / m;
    let mut source = vec![0.0; values.len()];
    for i in 0..n {
        for j in 0..m {
            source[j * n + i] = values[i * m + j];
        }
    }
    source
}

/// The 3 component point that a 4x4 projection maps to `values`.
pub(crate) fn inverse_projection(values: &[f64], matrix: &[f64]) -> Result<Vec<f64>, AssignmentError> {
    if values.len() != 3 || matrix.len() != 16 {
        return Err(AssignmentError::UnsupportedShape { operator: "projection" });
    }
    let lu = LuDecomposition::decompose(DMatrix::from_row_slice(4, 4, matrix), SINGULAR_TOLERANCE)
        .map_err(AssignmentError::SingularMatrix)?;
    let homogeneous = lu.solve(&DVector::from_column_slice(&[values[0], values[1], values[2], 1.0]));
    let w = homogeneous[3];
    if w == 0.0 {
        return Err(AssignmentError::ZeroHomogeneousCoordinate);
    }
    Ok((0..3).map(|i| homogeneous[i] / w).collect())
}

impl MatrixOp {
    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        let a = input.source(0);
        let nxi = input.number_of_xi;
        match *self {
            MatrixOp::Determinant => {
                cache.values_mut()[0] = determinant(a.values());
            }
            MatrixOp::Eigenvalues => {
                let n = cache.component_count();
                cache.set_scratch(Scratch::None);
                let matrix = DMatrix::from_row_slice(n, n, a.values());
                if !is_symmetric(&matrix, SYMMETRY_TOLERANCE) {
                    warn!(
                        "Eigenvalues of field {} requested for a non-symmetric matrix; using its upper triangle",
                        input.field
                    );
                }
                let eigen = jacobi_eigenanalysis(&matrix)?.sorted_descending();
                cache.values_mut().copy_from_slice(eigen.eigenvalues.as_slice());
                cache.set_scratch(Scratch::Eigen {
                    eigenvectors: eigen.eigenvectors,
                });
            }
            MatrixOp::Eigenvectors => {
                let eigenvectors = match a.scratch() {
                    Scratch::Eigen { eigenvectors } => eigenvectors,
                    _ => return Err(EvaluationError::MissingIntermediate(input.field)),
                };
                let n = eigenvectors.nrows();
                let values = cache.values_mut();
                for i in 0..n {
                    for j in 0..n {
                        values[i * n + j] = eigenvectors[(j, i)];
                    }
                }
            }
            MatrixOp::MatrixInvert => {
                let n = a.component_count();
                let n = square_dimension(n).unwrap_or(0);
                let lu = LuDecomposition::decompose(DMatrix::from_row_slice(n, n, a.values()), SINGULAR_TOLERANCE)?;
                let inverse = lu.inverse();
                let values = cache.values_mut();
                for i in 0..n {
                    for j in 0..n {
                        values[i * n + j] = inverse[(i, j)];
                    }
                }
            }
            MatrixOp::MatrixMultiply { number_of_rows } => {
                let b = input.source(1);
                let m = number_of_rows;
                let s = a.component_count() / m;
                let n = b.component_count() / s;
                let with_derivatives = input.derivatives_available();
                let (values, derivatives) = cache.values_and_derivatives_mut();
                let (x, y) = (a.values(), b.values());
                for i in 0..m {
                    for j in 0..n {
                        values[i * n + j] = (0..s).map(|k| x[i * s + k] * y[k * n + j]).sum();
                    }
                }
                if let (true, Some(dx), Some(dy)) = (with_derivatives, a.derivatives(), b.derivatives()) {
                    for i in 0..m {
                        for j in 0..n {
                            for d in 0..nxi {
                                derivatives[(i * n + j) * nxi + d] = (0..s)
                                    .map(|k| {
                                        dx[(i * s + k) * nxi + d] * y[k * n + j]
                                            + x[i * s + k] * dy[(k * n + j) * nxi + d]
                                    })
                                    .sum();
                            }
                        }
                    }
                }
                cache.set_derivatives_valid(with_derivatives);
            }
            MatrixOp::Projection => {
                let p = input.source(1);
                let s = a.component_count();
                let columns = s + 1;
                let rows = cache.component_count() + 1;
                let (x, matrix) = (a.values(), p.values());
                let homogeneous: Vec<f64> = (0..rows)
                    .map(|i| (0..s).map(|j| matrix[i * columns + j] * x[j]).sum::<f64>() + matrix[i * columns + s])
                    .collect();
                let w = homogeneous[rows - 1];
                let with_derivatives = input.derivatives_available();
                let (values, derivatives) = cache.values_and_derivatives_mut();
                for i in 0..rows - 1 {
                    values[i] = homogeneous[i] / w;
                }
                if let (true, Some(dx), Some(dp)) = (with_derivatives, a.derivatives(), p.derivatives()) {
                    for d in 0..nxi {
                        let dh: Vec<f64> = (0..rows)
                            .map(|i| {
                                (0..s)
                                    .map(|j| dp[(i * columns + j) * nxi + d] * x[j] + matrix[i * columns + j] * dx[j * nxi + d])
                                    .sum::<f64>()
                                    + dp[(i * columns + s) * nxi + d]
                            })
                            .collect();
                        // Quotient rule for the perspective divide
                        let dw = dh[rows - 1];
                        for i in 0..rows - 1 {
                            derivatives[i * nxi + d] = dh[i] / w - homogeneous[i] * dw / (w * w);
                        }
                    }
                }
                cache.set_derivatives_valid(with_derivatives);
            }
            MatrixOp::Transpose { source_number_of_rows } => {
                let m = source_number_of_rows;
                let n = a.component_count() / m;
                let with_derivatives = input.derivatives_available();
                let (values, derivatives) = cache.values_and_derivatives_mut();
                for i in 0..n {
                    for j in 0..m {
                        values[i * m + j] = a.values()[j * n + i];
                    }
                }
                if let (true, Some(da)) = (with_derivatives, a.derivatives()) {
                    for i in 0..n {
                        for j in 0..m {
                            let (target, source) = ((i * m + j) * nxi, (j * n + i) * nxi);
                            derivatives[target..target + nxi].copy_from_slice(&da[source..source + nxi]);
                        }
                    }
                }
                cache.set_derivatives_valid(with_derivatives);
            }
            MatrixOp::QuaternionToMatrix => {
                let q = a.values();
                let matrix = quaternion_to_matrix(&Quaternion::new(q[0], q[1], q[2], q[3]));
                let values = cache.values_mut();
                for i in 0..4 {
                    for j in 0..4 {
                        values[i * 4 + j] = matrix[(i, j)];
                    }
                }
            }
            MatrixOp::MatrixToQuaternion => {
                let q = matrix_to_quaternion(&Matrix4::from_row_slice(a.values()));
                cache.values_mut().copy_from_slice(&[q.w, q.i, q.j, q.k]);
            }
        }
        Ok(())
    }
}
