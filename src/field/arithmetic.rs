use crate::cache::ValueCache;
use crate::error::EvaluationError;
use crate::field::{broadcast_index, ArithmeticOp, OperatorInput};

/// Applies `f` element-wise to the two sources, broadcasting single component operands.
///
/// `f` returns the value together with its partial derivatives with respect to both
/// arguments, from which the derivatives are assembled by the chain rule.
pub(super) fn evaluate_binary<F>(
    input: &OperatorInput,
    cache: &mut ValueCache,
    f: F,
) -> Result<(), EvaluationError>
where
    F: Fn(f64, f64) -> (f64, f64, f64),
{
    let (a, b) = (input.source(0), input.source(1));
    let nxi = input.number_of_xi;
    let with_derivatives = input.derivatives_available();
    let (values, derivatives) = cache.values_and_derivatives_mut();
    for i in 0..values.len() {
        let ia = broadcast_index(a.component_count(), i);
        let ib = broadcast_index(b.component_count(), i);
        let (value, df_da, df_db) = f(a.values()[ia], b.values()[ib]);
        values[i] = value;
        if let (true, Some(da), Some(db)) = (with_derivatives, a.derivatives(), b.derivatives()) {
            for k in 0..nxi {
                derivatives[i * nxi + k] = df_da * da[ia * nxi + k] + df_db * db[ib * nxi + k];
            }
        }
    }
    cache.set_derivatives_valid(with_derivatives);
    Ok(())
}

/// Applies `f` to each component of the single source. `f` returns the value and its
/// derivative.
pub(super) fn evaluate_unary<F>(
    input: &OperatorInput,
    cache: &mut ValueCache,
    f: F,
) -> Result<(), EvaluationError>
where
    F: Fn(f64) -> (f64, f64),
{
    let a = input.source(0);
    let nxi = input.number_of_xi;
    let with_derivatives = input.derivatives_available();
    let (values, derivatives) = cache.values_and_derivatives_mut();
    for (i, &x) in a.values().iter().enumerate() {
        let (value, df_dx) = f(x);
        values[i] = value;
        if let (true, Some(da)) = (with_derivatives, a.derivatives()) {
            for k in 0..nxi {
                derivatives[i * nxi + k] = df_dx * da[i * nxi + k];
            }
        }
    }
    cache.set_derivatives_valid(with_derivatives);
    Ok(())
}

impl ArithmeticOp {
    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        use ArithmeticOp::*;
        match self {
            Add => evaluate_binary(input, cache, |a, b| (a + b, 1.0, 1.0)),
            Subtract => evaluate_binary(input, cache, |a, b| (a - b, 1.0, -1.0)),
            Multiply => evaluate_binary(input, cache, |a, b| (a * b, b, a)),
            Divide => evaluate_binary(input, cache, |a, b| (a / b, 1.0 / b, -a / (b * b))),
            Power => evaluate_binary(input, cache, |a, b| {
                let value = a.powf(b);
                let df_db = if a > 0.0 { value * a.ln() } else { 0.0 };
                (value, b * a.powf(b - 1.0), df_db)
            }),
            Log => evaluate_unary(input, cache, |x| (x.ln(), 1.0 / x)),
            Sqrt => evaluate_unary(input, cache, |x| {
                let value = x.sqrt();
                (value, 0.5 / value)
            }),
            Exp => evaluate_unary(input, cache, |x| {
                let value = x.exp();
                (value, value)
            }),
            Abs => evaluate_unary(input, cache, |x| (x.abs(), 0.0)),
            SumComponents => {
                let a = input.source(0);
                let nxi = input.number_of_xi;
                let with_derivatives = input.derivatives_available();
                let (values, derivatives) = cache.values_and_derivatives_mut();
                values[0] = a.values().iter().sum();
                if let (true, Some(da)) = (with_derivatives, a.derivatives()) {
                    for k in 0..nxi {
                        derivatives[k] = (0..a.component_count()).map(|i| da[i * nxi + k]).sum();
                    }
                }
                cache.set_derivatives_valid(with_derivatives);
                Ok(())
            }
        }
    }
}
