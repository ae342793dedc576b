use super::arithmetic::{evaluate_binary, evaluate_unary};
use crate::cache::ValueCache;
use crate::error::EvaluationError;
use crate::field::{OperatorInput, TrigonometricOp};

impl TrigonometricOp {
    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        use TrigonometricOp::*;
        match self {
            Sin => evaluate_unary(input, cache, |x| (x.sin(), x.cos())),
            Cos => evaluate_unary(input, cache, |x| (x.cos(), -x.sin())),
            Tan => evaluate_unary(input, cache, |x| {
                let c = x.cos();
                (x.tan(), 1.0 / (c * c))
            }),
            Asin => evaluate_unary(input, cache, |x| (x.asin(), 1.0 / (1.0 - x * x).sqrt())),
            Acos => evaluate_unary(input, cache, |x| (x.acos(), -1.0 / (1.0 - x * x).sqrt())),
            Atan => evaluate_unary(input, cache, |x| (x.atan(), 1.0 / (1.0 + x * x))),
            // atan2(y, x) with y the first source
            Atan2 => evaluate_binary(input, cache, |y, x| {
                let r2 = x * x + y * y;
                (y.atan2(x), x / r2, -y / r2)
            }),
        }
    }
}
