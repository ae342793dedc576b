use crate::cache::ValueCache;
use crate::error::EvaluationError;
use crate::field::OperatorInput;
use crate::location::DomainLocation;

pub(super) fn evaluate_constant(
    values: &[f64],
    input: &OperatorInput,
    cache: &mut ValueCache,
) -> Result<(), EvaluationError> {
    cache.values_mut().copy_from_slice(values);
    // Derivatives are already zeroed
    cache.set_derivatives_valid(input.number_of_xi > 0);
    Ok(())
}

pub(super) fn evaluate_time(input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
    cache.values_mut()[0] = input.location.time;
    cache.set_derivatives_valid(input.number_of_xi > 0);
    Ok(())
}

pub(super) fn evaluate_xi(input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
    let xi = match &input.location.domain {
        DomainLocation::Element { xi, .. } => xi,
        _ => return Err(EvaluationError::UnsupportedLocation(input.field)),
    };
    let nxi = input.number_of_xi;
    let (values, derivatives) = cache.values_and_derivatives_mut();
    values.iter_mut().for_each(|v| *v = 0.0);
    for (value, &x) in values.iter_mut().zip(xi) {
        *value = x;
    }
    if nxi > 0 {
        for i in 0..values.len().min(nxi) {
            derivatives[i * nxi + i] = 1.0;
        }
    }
    cache.set_derivatives_valid(nxi > 0);
    Ok(())
}

pub(super) fn evaluate_identity(input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
    cache.copy_from(input.source(0));
    Ok(())
}

pub(super) fn evaluate_component(
    component: usize,
    input: &OperatorInput,
    cache: &mut ValueCache,
) -> Result<(), EvaluationError> {
    let source = input.source(0);
    cache.values_mut()[0] = source.values()[component];
    if let (true, Some(derivatives)) = (input.number_of_xi > 0, source.derivatives()) {
        let nxi = input.number_of_xi;
        cache
            .derivatives_mut()
            .copy_from_slice(&derivatives[component * nxi..(component + 1) * nxi]);
        cache.set_derivatives_valid(true);
    }
    Ok(())
}

pub(super) fn evaluate_concatenate(input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
    let nxi = input.number_of_xi;
    let with_derivatives = input.derivatives_available();
    let (values, derivatives) = cache.values_and_derivatives_mut();
    let mut offset = 0;
    for source in &input.sources {
        let n = source.component_count();
        values[offset..offset + n].copy_from_slice(source.values());
        if let (true, Some(source_derivatives)) = (with_derivatives, source.derivatives()) {
            derivatives[offset * nxi..(offset + n) * nxi].copy_from_slice(source_derivatives);
        }
        offset += n;
    }
    cache.set_derivatives_valid(with_derivatives);
    Ok(())
}

pub(super) fn evaluate_if(input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
    let condition = input.source(0);
    let branches = [input.source(1), input.source(2)];
    let nxi = input.number_of_xi;
    // The condition is piecewise constant, so only the branches need derivatives
    let with_derivatives = nxi > 0 && branches.iter().all(|b| b.has_derivatives());
    let (values, derivatives) = cache.values_and_derivatives_mut();
    for i in 0..values.len() {
        let c = condition.values()[super::broadcast_index(condition.component_count(), i)];
        let selected = if c != 0.0 { branches[0] } else { branches[1] };
        values[i] = selected.values()[i];
        if let (true, Some(selected_derivatives)) = (with_derivatives, selected.derivatives()) {
            derivatives[i * nxi..(i + 1) * nxi].copy_from_slice(&selected_derivatives[i * nxi..(i + 1) * nxi]);
        }
    }
    cache.set_derivatives_valid(with_derivatives);
    Ok(())
}

/// Reads one derivative direction of the source, which must have been evaluated with
/// derivatives.
pub(super) fn evaluate_derivative(
    xi_index: usize,
    input: &OperatorInput,
    cache: &mut ValueCache,
) -> Result<(), EvaluationError> {
    let source = input.source(0);
    let nxi = source.number_of_xi();
    match source.derivatives() {
        Some(derivatives) if xi_index < nxi => {
            for (i, value) in cache.values_mut().iter_mut().enumerate() {
                *value = derivatives[i * nxi + xi_index];
            }
            Ok(())
        }
        _ => Err(EvaluationError::DerivativesUnavailable(input.field)),
    }
}
