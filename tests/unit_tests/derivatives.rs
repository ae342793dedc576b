use super::bilinear_rectangle;
use femfield::{ConstructionError, ElementId, EvaluationError, FieldId, FieldModule};
use std::collections::BTreeSet;
use util::{assert_approx_slice_eq, central_difference};

const POINTS: [[f64; 2]; 2] = [[0.3, 0.7], [0.6, 0.2]];

/// Compares the derivatives computed by the field against central differences of its values
/// in the two directions of a two-dimensional element.
fn assert_derivatives_match_finite_differences(module: &FieldModule, field: FieldId) {
    let evaluate_at = |xi: [f64; 2]| {
        let mut ctx = module.create_evaluation_context();
        ctx.set_element_location(ElementId(1), &xi);
        module.evaluate_real(&mut ctx, field).unwrap()
    };

    for xi in POINTS {
        let mut ctx = module.create_evaluation_context();
        ctx.set_derivatives_requested(true);
        ctx.set_element_location(ElementId(1), &xi);
        let (values, derivatives) = module.evaluate_with_derivatives(&mut ctx, field).unwrap();
        assert_eq!(derivatives.len(), 2 * values.len());

        let mut expected = vec![0.0; derivatives.len()];
        for i in 0..values.len() {
            for k in 0..2 {
                let component_along = |t: f64| {
                    let mut moved = xi;
                    moved[k] = t;
                    evaluate_at(moved)[i]
                };
                expected[i * 2 + k] = central_difference(component_along, xi[k], 1e-6);
            }
        }
        assert_approx_slice_eq!(derivatives, expected, abstol = 1e-6);
    }
}

/// The reference coordinates `x` and `y` of a two-dimensional element, and the padded
/// three component `xi` field they are taken from.
fn coordinates(module: &mut FieldModule) -> (FieldId, FieldId, FieldId) {
    let xi = module.create_xi_coordinates().unwrap();
    let x = module.create_component(xi, 0).unwrap();
    let y = module.create_component(xi, 1).unwrap();
    (xi, x, y)
}

#[test]
fn arithmetic_derivatives() {
    let mut module = FieldModule::new();
    let (xi, x, y) = coordinates(&mut module);
    let one = module.create_constant(&[1.0]).unwrap();
    let three = module.create_constant(&[3.0]).unwrap();
    let x1 = module.create_add(x, one).unwrap();
    let y1 = module.create_add(y, one).unwrap();
    let xy = module.create_multiply(x, y).unwrap();

    let fields = [
        module.create_add(x, y).unwrap(),
        module.create_subtract(x, xi).unwrap(),
        module.create_multiply(xi, y).unwrap(),
        module.create_divide(x, y1).unwrap(),
        module.create_power(x1, y).unwrap(),
        module.create_power(xy, three).unwrap(),
        module.create_sum_components(xi).unwrap(),
        module.create_log(x1).unwrap(),
        module.create_sqrt(y1).unwrap(),
        module.create_exp(xy).unwrap(),
        module.create_identity(xi).unwrap(),
    ];
    for field in fields {
        assert_derivatives_match_finite_differences(&module, field);
    }
}

#[test]
fn trigonometric_derivatives() {
    let mut module = FieldModule::new();
    let (xi, x, y) = coordinates(&mut module);
    let one = module.create_constant(&[1.0]).unwrap();
    let x1 = module.create_add(x, one).unwrap();

    let fields = [
        module.create_sin(xi).unwrap(),
        module.create_cos(xi).unwrap(),
        module.create_tan(y).unwrap(),
        module.create_asin(x).unwrap(),
        module.create_acos(y).unwrap(),
        module.create_atan(xi).unwrap(),
        module.create_atan2(y, x1).unwrap(),
    ];
    for field in fields {
        assert_derivatives_match_finite_differences(&module, field);
    }
}

#[test]
fn vector_derivatives() {
    let mut module = FieldModule::new();
    let (xi, x, y) = coordinates(&mut module);
    let one = module.create_constant(&[1.0]).unwrap();
    let fixed = module.create_constant(&[1.0, -2.0, 0.5]).unwrap();
    let lifted = module.create_concatenate(&[x, y, one]).unwrap();

    let fields = [
        module.create_dot_product(xi, lifted).unwrap(),
        module.create_cross_product(lifted, fixed).unwrap(),
        module.create_cross_product(xi, lifted).unwrap(),
        module.create_magnitude(lifted).unwrap(),
        module.create_normalise(lifted).unwrap(),
    ];
    for field in fields {
        assert_derivatives_match_finite_differences(&module, field);
    }
}

#[test]
fn composite_and_conditional_derivatives() {
    let mut module = FieldModule::new();
    let (xi, x, y) = coordinates(&mut module);
    let half = module.create_constant(&[0.5]).unwrap();
    let xx = module.create_multiply(x, x).unwrap();
    let condition = module.create_greater_than(x, half).unwrap();

    let fields = [
        module.create_concatenate(&[y, xi, xx]).unwrap(),
        module.create_component(xi, 1).unwrap(),
        module.create_if(condition, xx, y).unwrap(),
    ];
    for field in fields {
        assert_derivatives_match_finite_differences(&module, field);
    }
}

#[test]
fn matrix_derivatives() {
    let mut module = FieldModule::new();
    let (_, x, y) = coordinates(&mut module);
    let one = module.create_constant(&[1.0]).unwrap();
    let two = module.create_constant(&[2.0]).unwrap();
    let xy = module.create_multiply(x, y).unwrap();
    let a = module.create_concatenate(&[x, y, one, x]).unwrap();
    let b = module.create_concatenate(&[y, xy, two, one]).unwrap();
    let c = module.create_concatenate(&[x, y, xy, one, two, x]).unwrap();
    let point = module.create_concatenate(&[x, y, one]).unwrap();
    #[rustfmt::skip]
    let perspective = module.create_constant(&[
        2.0, 0.0, 0.0, 1.0,
        0.0, 1.0, 0.5, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.5, 0.0, 1.0, 1.0,
    ]).unwrap();
    let lens = module.create_concatenate(&[y, one, x, one, x, y]).unwrap();

    let fields = [
        module.create_matrix_multiply(2, a, b).unwrap(),
        module.create_matrix_multiply(2, c, point).unwrap(),
        module.create_transpose(2, c).unwrap(),
        module.create_projection(point, perspective).unwrap(),
        module.create_projection(x, lens).unwrap(),
    ];
    for field in fields {
        assert_derivatives_match_finite_differences(&module, field);
    }
}

#[test]
fn non_differentiable_operators_report_unavailable_derivatives() {
    let mut module = FieldModule::new();
    let (xi, x, y) = coordinates(&mut module);
    let abs = module.create_abs(x).unwrap();
    let less = module.create_less_than(x, y).unwrap();
    let matrix = module.create_concatenate(&[x, y, y, x]).unwrap();
    let determinant = module.create_determinant(matrix).unwrap();
    let downstream = module.create_add(abs, y).unwrap();
    let sum = module.create_sum_components(xi).unwrap();

    let mut ctx = module.create_evaluation_context();
    ctx.set_derivatives_requested(true);
    ctx.set_element_location(ElementId(1), &[0.3, 0.7]);
    for field in [abs, less, determinant, downstream] {
        assert_eq!(
            module.evaluate_with_derivatives(&mut ctx, field),
            Err(EvaluationError::DerivativesUnavailable(field))
        );
    }
    // Values are still available
    assert_approx_slice_eq!(module.evaluate_real(&mut ctx, determinant).unwrap(), [0.09 - 0.49], abstol = 1e-15);
    assert_approx_slice_eq!(module.evaluate_real(&mut ctx, downstream).unwrap(), [1.0], abstol = 1e-15);
    assert!(module.evaluate_with_derivatives(&mut ctx, sum).is_ok());

    ctx.set_derivatives_requested(false);
    assert_eq!(
        module.evaluate_with_derivatives(&mut ctx, sum),
        Err(EvaluationError::DerivativesUnavailable(sum))
    );
}

#[test]
fn derivative_fields_match_finite_differences() {
    let mut module = FieldModule::new();
    let (_, x, y) = coordinates(&mut module);
    let xy = module.create_multiply(x, y).unwrap();
    let sin_xy = module.create_sin(xy).unwrap();
    let expression = module.create_concatenate(&[sin_xy, xy, x]).unwrap();
    let along_x = module.create_derivative(expression, 0).unwrap();
    let along_y = module.create_derivative(expression, 1).unwrap();

    let value_at = |xi: [f64; 2]| {
        let mut ctx = module.create_evaluation_context();
        ctx.set_element_location(ElementId(1), &xi);
        module.evaluate_real(&mut ctx, expression).unwrap()
    };
    for xi in POINTS {
        for (k, derivative) in [along_x, along_y].into_iter().enumerate() {
            let mut ctx = module.create_evaluation_context();
            ctx.set_derivatives_requested(true);
            ctx.set_element_location(ElementId(1), &xi);
            let values = module.evaluate_real(&mut ctx, derivative).unwrap();
            let expected: Vec<f64> = (0..3)
                .map(|i| {
                    let component_along = |t: f64| {
                        let mut moved = xi;
                        moved[k] = t;
                        value_at(moved)[i]
                    };
                    central_difference(component_along, xi[k], 1e-6)
                })
                .collect();
            assert_approx_slice_eq!(values, expected, abstol = 1e-6);
        }
    }
}

#[test]
fn derivative_fields_need_derivatives_of_their_source() {
    let mut module = FieldModule::new();
    let (_, x, y) = coordinates(&mut module);
    let xy = module.create_multiply(x, y).unwrap();
    module.set_name(xy, "xy").unwrap();
    let along_x = module.create_derivative(xy, 0).unwrap();
    let along_z = module.create_derivative(xy, 2).unwrap();
    let abs = module.create_abs(x).unwrap();
    let of_abs = module.create_derivative(abs, 0).unwrap();
    assert_eq!(module.component_count(along_x), Some(1));
    assert_eq!(module.describe(along_x).unwrap(), "derivative field xy xi_index 0");
    assert!(matches!(
        module.create_derivative(xy, 3),
        Err(ConstructionError::InvalidParameter { operator: "derivative", .. })
    ));

    let mut ctx = module.create_evaluation_context();
    ctx.set_element_location(ElementId(1), &[0.3, 0.7]);
    assert_eq!(
        module.evaluate_real(&mut ctx, along_x),
        Err(EvaluationError::DerivativesUnavailable(along_x))
    );

    ctx.set_derivatives_requested(true);
    assert_approx_slice_eq!(module.evaluate_real(&mut ctx, along_x).unwrap(), [0.7], abstol = 1e-15);
    // Second derivatives are not computed
    assert_eq!(
        module.evaluate_with_derivatives(&mut ctx, along_x),
        Err(EvaluationError::DerivativesUnavailable(along_x))
    );
    // The element only has two reference coordinates
    assert_eq!(
        module.evaluate_real(&mut ctx, along_z),
        Err(EvaluationError::DerivativesUnavailable(along_z))
    );
    assert_eq!(
        module.evaluate_real(&mut ctx, of_abs),
        Err(EvaluationError::DerivativesUnavailable(of_abs))
    );
}

#[test]
fn derivative_validity_follows_operator_capabilities() {
    let mut module = FieldModule::new();
    let position = bilinear_rectangle(&mut module);
    let (xi, x, y) = coordinates(&mut module);
    let one = module.create_constant(&[1.0]).unwrap();
    let two = module.create_constant(&[2.0]).unwrap();
    module.create_time_value().unwrap();
    let vector = module.create_concatenate(&[x, y, one]).unwrap();
    let matrix = module.create_concatenate(&[two, x, x, one]).unwrap();
    let quaternion = module.create_concatenate(&[one, x, y, x]).unwrap();
    #[rustfmt::skip]
    let perspective = module.create_constant(&[
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.5, 1.0,
    ]).unwrap();
    let eigenvalues = module.create_eigenvalues(matrix).unwrap();
    let rotation = module.create_quaternion_to_matrix(quaternion).unwrap();

    let _derived = [
        module.create_identity(position).unwrap(),
        module.create_component(position, 1).unwrap(),
        module.create_if(x, vector, xi).unwrap(),
        module.create_derivative(position, 0).unwrap(),
        module.create_add(x, y).unwrap(),
        module.create_subtract(vector, one).unwrap(),
        module.create_multiply(x, position).unwrap(),
        module.create_divide(y, two).unwrap(),
        module.create_power(x, two).unwrap(),
        module.create_sum_components(vector).unwrap(),
        module.create_log(y).unwrap(),
        module.create_sqrt(x).unwrap(),
        module.create_exp(x).unwrap(),
        module.create_abs(x).unwrap(),
        module.create_sin(x).unwrap(),
        module.create_cos(x).unwrap(),
        module.create_tan(x).unwrap(),
        module.create_asin(x).unwrap(),
        module.create_acos(y).unwrap(),
        module.create_atan(x).unwrap(),
        module.create_atan2(y, x).unwrap(),
        module.create_and(x, y).unwrap(),
        module.create_or(x, y).unwrap(),
        module.create_xor(x, y).unwrap(),
        module.create_not(x).unwrap(),
        module.create_equal_to(x, y).unwrap(),
        module.create_greater_than(x, y).unwrap(),
        module.create_less_than(x, y).unwrap(),
        module.create_dot_product(vector, xi).unwrap(),
        module.create_cross_product(vector, xi).unwrap(),
        module.create_magnitude(vector).unwrap(),
        module.create_normalise(vector).unwrap(),
        module.create_determinant(matrix).unwrap(),
        module.create_eigenvectors(eigenvalues).unwrap(),
        module.create_matrix_invert(matrix).unwrap(),
        module.create_matrix_multiply(2, matrix, position).unwrap(),
        module.create_projection(vector, perspective).unwrap(),
        module.create_transpose(2, matrix).unwrap(),
        module.create_matrix_to_quaternion(rotation).unwrap(),
    ];

    let mut ctx = module.create_evaluation_context();
    ctx.set_derivatives_requested(true);
    ctx.set_element_location(ElementId(1), &[0.3, 0.7]);
    let mut keywords = BTreeSet::new();
    for id in module.fields().collect::<Vec<_>>() {
        let operator = module.operator(id).unwrap();
        let cache = module.evaluate(&mut ctx, id).unwrap();
        assert_eq!(
            cache.has_derivatives(),
            operator.supports_derivatives(),
            "{}",
            operator.keyword()
        );
        keywords.insert(operator.keyword());
    }
    // Every operator keyword is covered
    assert_eq!(keywords.len(), 46);
}
