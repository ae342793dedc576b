//! Dense numeric kernels shared by the field operators.
//!
//! Routines are stateless. They take their inputs by reference and return freshly computed
//! results.
use nalgebra::RealField;

pub use nalgebra;

/// LU decomposition with partial pivoting
pub mod lu;
/// Jacobi eigenanalysis of symmetric matrices
pub mod eigen;
/// Conversion between quaternions and homogeneous rotation matrices
pub mod quaternion;

pub use eigen::{is_symmetric, jacobi_eigenanalysis, EigenanalysisError, SymmetricEigen};
pub use lu::{LuDecomposition, SingularMatrixError};
pub use quaternion::{matrix_to_quaternion, quaternion_to_matrix};

/// Pivots with magnitude below this value are treated as zero by LU decomposition.
pub const SINGULAR_TOLERANCE: f64 = 1.0e-12;

/// Relative tolerance used when checking whether a matrix is symmetric.
pub const SYMMETRY_TOLERANCE: f64 = 1.0e-6;

/// Upper bound on the number of sweeps performed by [`jacobi_eigenanalysis`].
pub const MAX_JACOBI_SWEEPS: usize = 50;

pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
