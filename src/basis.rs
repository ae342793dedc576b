//! Interpolation bases of the elements on which finite element fields are defined.
use serde::{Deserialize, Serialize};

/// Basis functions on a reference element.
///
/// Reference coordinates lie in `[0, 1]^d` where `d` is the dimension of the element.
pub trait ElementBasis {
    fn dimension(&self) -> usize;

    fn num_nodes(&self) -> usize;

    /// Evaluates each basis function at the given reference coordinates.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `basis_values` does not have exactly one entry per node, or
    /// if `xi` does not have exactly `dimension()` entries.
    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]);

    /// Evaluates the gradient of each basis function at the given reference coordinates.
    ///
    /// The derivative of basis function `i` with respect to `xi[k]` is stored at
    /// `i * dimension() + k`.
    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], xi: &[f64]);
}

/// Lagrange bases on lines, squares, cubes and simplices.
///
/// Tensor product nodes are ordered with the first reference coordinate varying fastest.
/// Simplex nodes are ordered as the origin followed by the unit point on each axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LagrangeBasis {
    LinearLine,
    QuadraticLine,
    BilinearSquare,
    BiquadraticSquare,
    TrilinearCube,
    LinearTriangle,
    LinearTetrahedron,
}

fn linear(x: f64) -> ([f64; 2], [f64; 2]) {
    ([1.0 - x, x], [-1.0, 1.0])
}

fn quadratic(x: f64) -> ([f64; 3], [f64; 3]) {
    (
        [
            2.0 * (x - 0.5) * (x - 1.0),
            4.0 * x * (1.0 - x),
            2.0 * x * (x - 0.5),
        ],
        [4.0 * x - 3.0, 4.0 - 8.0 * x, 4.0 * x - 1.0],
    )
}

/// Evaluates a tensor product of one-dimensional bases, each given by `(values, derivatives)`.
fn tensor_product(
    factors: &[(&[f64], &[f64])],
    mut values: Option<&mut [f64]>,
    mut gradients: Option<&mut [f64]>,
) {
    let d = factors.len();
    let num_nodes: usize = factors.iter().map(|(v, _)| v.len()).product();
    let mut index = vec![0; d];
    for node in 0..num_nodes {
        if let Some(values) = values.as_deref_mut() {
            values[node] = index
                .iter()
                .zip(factors)
                .map(|(&i, (v, _))| v[i])
                .product();
        }
        if let Some(gradients) = gradients.as_deref_mut() {
            for k in 0..d {
                gradients[node * d + k] = index
                    .iter()
                    .zip(factors)
                    .enumerate()
                    .map(|(m, (&i, (v, dv)))| if m == k { dv[i] } else { v[i] })
                    .product();
            }
        }
        // Advance the multi-index with the first coordinate varying fastest
        for m in 0..d {
            index[m] += 1;
            if index[m] < factors[m].0.len() {
                break;
            }
            index[m] = 0;
        }
    }
}

impl LagrangeBasis {
    pub fn keyword(&self) -> &'static str {
        match self {
            LagrangeBasis::LinearLine => "l.Lagrange",
            LagrangeBasis::QuadraticLine => "q.Lagrange",
            LagrangeBasis::BilinearSquare => "l.Lagrange*l.Lagrange",
            LagrangeBasis::BiquadraticSquare => "q.Lagrange*q.Lagrange",
            LagrangeBasis::TrilinearCube => "l.Lagrange*l.Lagrange*l.Lagrange",
            LagrangeBasis::LinearTriangle => "l.simplex(2)*l.simplex",
            LagrangeBasis::LinearTetrahedron => "l.simplex(2;3)*l.simplex*l.simplex",
        }
    }

    fn evaluate(&self, xi: &[f64], values: Option<&mut [f64]>, gradients: Option<&mut [f64]>) {
        assert_eq!(xi.len(), self.dimension(), "Reference coordinates must match basis dimension");
        use LagrangeBasis::*;
        match self {
            LinearLine | BilinearSquare | TrilinearCube => {
                let factors: Vec<_> = xi.iter().map(|&x| linear(x)).collect();
                let slices: Vec<_> = factors.iter().map(|(v, dv)| (&v[..], &dv[..])).collect();
                tensor_product(&slices, values, gradients);
            }
            QuadraticLine | BiquadraticSquare => {
                let factors: Vec<_> = xi.iter().map(|&x| quadratic(x)).collect();
                let slices: Vec<_> = factors.iter().map(|(v, dv)| (&v[..], &dv[..])).collect();
                tensor_product(&slices, values, gradients);
            }
            LinearTriangle | LinearTetrahedron => {
                let d = xi.len();
                if let Some(values) = values {
                    values[0] = 1.0 - xi.iter().sum::<f64>();
                    values[1..].copy_from_slice(xi);
                }
                if let Some(gradients) = gradients {
                    gradients.iter_mut().for_each(|g| *g = 0.0);
                    for k in 0..d {
                        gradients[k] = -1.0;
                        gradients[(k + 1) * d + k] = 1.0;
                    }
                }
            }
        }
    }
}

impl ElementBasis for LagrangeBasis {
    fn dimension(&self) -> usize {
        use LagrangeBasis::*;
        match self {
            LinearLine | QuadraticLine => 1,
            BilinearSquare | BiquadraticSquare | LinearTriangle => 2,
            TrilinearCube | LinearTetrahedron => 3,
        }
    }

    fn num_nodes(&self) -> usize {
        use LagrangeBasis::*;
        match self {
            LinearLine => 2,
            QuadraticLine => 3,
            BilinearSquare => 4,
            BiquadraticSquare => 9,
            TrilinearCube => 8,
            LinearTriangle => 3,
            LinearTetrahedron => 4,
        }
    }

    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), self.num_nodes());
        self.evaluate(xi, Some(basis_values), None);
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_gradients.len(), self.num_nodes() * self.dimension());
        self.evaluate(xi, None, Some(basis_gradients));
    }
}
