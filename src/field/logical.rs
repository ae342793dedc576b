use super::arithmetic::{evaluate_binary, evaluate_unary};
use crate::cache::ValueCache;
use crate::error::EvaluationError;
use crate::field::{LogicalOp, OperatorInput};

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl LogicalOp {
    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        use LogicalOp::*;
        let binary = |f: fn(f64, f64) -> bool| move |a: f64, b: f64| (truth(f(a, b)), 0.0, 0.0);
        match self {
            And => evaluate_binary(input, cache, binary(|a, b| a != 0.0 && b != 0.0)),
            Or => evaluate_binary(input, cache, binary(|a, b| a != 0.0 || b != 0.0)),
            Xor => evaluate_binary(input, cache, binary(|a, b| (a != 0.0) != (b != 0.0))),
            EqualTo => evaluate_binary(input, cache, binary(|a, b| a == b)),
            GreaterThan => evaluate_binary(input, cache, binary(|a, b| a > b)),
            LessThan => evaluate_binary(input, cache, binary(|a, b| a < b)),
            Not => evaluate_unary(input, cache, |x| (truth(x == 0.0), 0.0)),
        }
    }
}
