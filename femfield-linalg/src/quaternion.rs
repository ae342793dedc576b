use crate::Real;
use nalgebra::{Matrix4, Quaternion};
use numeric_literals::replace_float_literals;

/// Builds the homogeneous 4x4 rotation matrix of the quaternion `w + xi + yj + zk`.
///
/// The matrix acts on column vectors, so the rotation occupies the upper 3x3 block and the
/// last row and column are those of the identity. The quaternion is assumed to have unit
/// length; it is not normalised.
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn quaternion_to_matrix<T: Real>(q: &Quaternion<T>) -> Matrix4<T> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    Matrix4::new(
        1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z),       2.0 * (x * z + w * y),       0.0,
        2.0 * (x * y + w * z),       1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x),       0.0,
        2.0 * (x * z - w * y),       2.0 * (y * z + w * x),       1.0 - 2.0 * (x * x + y * y), 0.0,
        0.0,                         0.0,                         0.0,                         1.0,
    )
}

/// Extracts the unit quaternion closest to the rotation in the upper 3x3 block of `matrix`.
///
/// When the trace of the block is positive the scalar part is recovered first; otherwise the
/// component belonging to the largest diagonal entry is recovered first, which keeps the
/// square root argument away from zero. The result is normalised and has a non-negative
/// scalar part.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn matrix_to_quaternion<T: Real>(matrix: &Matrix4<T>) -> Quaternion<T> {
    let m = |i: usize, j: usize| matrix[(i, j)];
    let trace = m(0, 0) + m(1, 1) + m(2, 2);

    let q = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quaternion::new(
            0.25 / s,
            (m(2, 1) - m(1, 2)) * s,
            (m(0, 2) - m(2, 0)) * s,
            (m(1, 0) - m(0, 1)) * s,
        )
    } else if m(0, 0) > m(1, 1) && m(0, 0) > m(2, 2) {
        let s = 2.0 * (1.0 + m(0, 0) - m(1, 1) - m(2, 2)).sqrt();
        Quaternion::new(
            (m(2, 1) - m(1, 2)) / s,
            0.25 * s,
            (m(0, 1) + m(1, 0)) / s,
            (m(0, 2) + m(2, 0)) / s,
        )
    } else if m(1, 1) > m(2, 2) {
        let s = 2.0 * (1.0 + m(1, 1) - m(0, 0) - m(2, 2)).sqrt();
        Quaternion::new(
            (m(0, 2) - m(2, 0)) / s,
            (m(0, 1) + m(1, 0)) / s,
            0.25 * s,
            (m(1, 2) + m(2, 1)) / s,
        )
    } else {
        let s = 2.0 * (1.0 + m(2, 2) - m(0, 0) - m(1, 1)).sqrt();
        Quaternion::new(
            (m(1, 0) - m(0, 1)) / s,
            (m(0, 2) + m(2, 0)) / s,
            (m(1, 2) + m(2, 1)) / s,
            0.25 * s,
        )
    };

    let norm = q.norm();
    let q = if norm > 0.0 { q / norm } else { q };
    if q.w < 0.0 {
        -q
    } else {
        q
    }
}
