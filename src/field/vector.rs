use crate::cache::ValueCache;
use crate::error::EvaluationError;
use crate::field::{OperatorInput, VectorOp};
use itertools::izip;

impl VectorOp {
    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        let nxi = input.number_of_xi;
        let with_derivatives = input.derivatives_available();
        let a = input.source(0);
        let (values, derivatives) = cache.values_and_derivatives_mut();
        let mut derivatives_valid = with_derivatives;

        match self {
            VectorOp::DotProduct => {
                let b = input.source(1);
                values[0] = izip!(a.values(), b.values()).map(|(x, y)| x * y).sum();
                if let (true, Some(da), Some(db)) = (with_derivatives, a.derivatives(), b.derivatives()) {
                    for k in 0..nxi {
                        derivatives[k] = (0..a.component_count())
                            .map(|i| da[i * nxi + k] * b.values()[i] + a.values()[i] * db[i * nxi + k])
                            .sum();
                    }
                }
            }
            VectorOp::CrossProduct => {
                let b = input.source(1);
                let (u, v) = (a.values(), b.values());
                let cross = |u: [f64; 3], v: [f64; 3]| {
                    [
                        u[1] * v[2] - u[2] * v[1],
                        u[2] * v[0] - u[0] * v[2],
                        u[0] * v[1] - u[1] * v[0],
                    ]
                };
                values.copy_from_slice(&cross([u[0], u[1], u[2]], [v[0], v[1], v[2]]));
                if let (true, Some(du), Some(dv)) = (with_derivatives, a.derivatives(), b.derivatives()) {
                    for k in 0..nxi {
                        let du_k = [du[k], du[nxi + k], du[2 * nxi + k]];
                        let dv_k = [dv[k], dv[nxi + k], dv[2 * nxi + k]];
                        let first = cross(du_k, [v[0], v[1], v[2]]);
                        let second = cross([u[0], u[1], u[2]], dv_k);
                        for i in 0..3 {
                            derivatives[i * nxi + k] = first[i] + second[i];
                        }
                    }
                }
            }
            VectorOp::Magnitude => {
                let magnitude = a.values().iter().map(|x| x * x).sum::<f64>().sqrt();
                values[0] = magnitude;
                match (with_derivatives, a.derivatives()) {
                    (true, Some(da)) if magnitude > 0.0 => {
                        for k in 0..nxi {
                            derivatives[k] = a
                                .values()
                                .iter()
                                .enumerate()
                                .map(|(i, x)| x * da[i * nxi + k])
                                .sum::<f64>()
                                / magnitude;
                        }
                    }
                    _ => derivatives_valid = false,
                }
            }
            VectorOp::Normalise => {
                let magnitude = a.values().iter().map(|x| x * x).sum::<f64>().sqrt();
                if magnitude > 0.0 {
                    for (value, x) in izip!(values.iter_mut(), a.values()) {
                        *value = x / magnitude;
                    }
                } else {
                    values.copy_from_slice(a.values());
                }
                match (with_derivatives, a.derivatives()) {
                    (true, Some(da)) if magnitude > 0.0 => {
                        let m3 = magnitude * magnitude * magnitude;
                        for k in 0..nxi {
                            let x_dot_dx: f64 = a
                                .values()
                                .iter()
                                .enumerate()
                                .map(|(i, x)| x * da[i * nxi + k])
                                .sum();
                            for (i, x) in a.values().iter().enumerate() {
                                derivatives[i * nxi + k] = da[i * nxi + k] / magnitude - x * x_dot_dx / m3;
                            }
                        }
                    }
                    _ => derivatives_valid = false,
                }
            }
        }

        cache.set_derivatives_valid(derivatives_valid);
        Ok(())
    }
}
