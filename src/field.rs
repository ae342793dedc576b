//! Field definitions: the closed set of operators and the nodes of the field graph.
//!
//! A [`Field`] combines an [`Operator`] with an ordered list of source fields. The operator
//! determines the number of sources, the number of output components and how values and
//! derivatives are computed from the sources. Fields are owned by a
//! [`FieldModule`](crate::module::FieldModule) and refer to their sources by [`FieldId`].
use crate::cache::ValueCache;
use crate::error::{ConstructionError, EvaluationError};
use crate::location::{CoordinateSystem, Location};
use std::fmt;
use std::fmt::Display;
use std::fmt::Write;

mod arithmetic;
mod composite;
mod finite_element;
mod logical;
mod matrix;
mod trigonometric;
mod vector;

pub use finite_element::{ElementInterpolation, FiniteElementParameters};

/// Stable identifier of a field within its module.
///
/// Identifiers of destroyed fields are never handed out again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    SumComponents,
    Log,
    Sqrt,
    Exp,
    Abs,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TrigonometricOp {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
}

/// Comparisons and boolean connectives. Non-zero values are true, results are `1.0` or `0.0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    Not,
    EqualTo,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VectorOp {
    DotProduct,
    CrossProduct,
    Magnitude,
    Normalise,
}

/// Operators that interpret their sources as dense matrices stored row by row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MatrixOp {
    Determinant,
    Eigenvalues,
    /// Eigenvectors as the rows of a square matrix, sourced from an eigenvalues field.
    Eigenvectors,
    MatrixInvert,
    MatrixMultiply { number_of_rows: usize },
    /// Perspective projection of the first source by the matrix given by the second source.
    Projection,
    Transpose { source_number_of_rows: usize },
    QuaternionToMatrix,
    MatrixToQuaternion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Constant(Vec<f64>),
    FiniteElement(FiniteElementParameters),
    /// The reference coordinates of the current element location, padded to 3 components.
    XiCoordinates,
    TimeValue,
    Identity,
    Component(usize),
    Concatenate,
    /// Selects the second or third source per component, depending on the first.
    If,
    /// Derivative of the source with respect to one reference coordinate of the element.
    Derivative { xi_index: usize },
    Arithmetic(ArithmeticOp),
    Trigonometric(TrigonometricOp),
    Logical(LogicalOp),
    Vector(VectorOp),
    Matrix(MatrixOp),
}

/// A node in the field graph.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) operator: Operator,
    pub(crate) sources: Vec<FieldId>,
    pub(crate) component_count: usize,
    pub(crate) coordinate_system: CoordinateSystem,
    pub(crate) managed: bool,
    pub(crate) access_count: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn sources(&self) -> &[FieldId] {
        &self.sources
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    /// Whether the module keeps the field alive even when it is not accessed.
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Number of accesses held by dependent fields and by callers.
    pub fn access_count(&self) -> usize {
        self.access_count
    }
}

/// Input to the evaluation of a single operator: the already evaluated source caches and the
/// current location.
pub(crate) struct OperatorInput<'a> {
    pub field: FieldId,
    pub sources: Vec<&'a ValueCache>,
    pub location: &'a Location,
    /// Number of derivative directions to compute, zero if none are requested or the operator
    /// does not support derivatives.
    pub number_of_xi: usize,
}

impl<'a> OperatorInput<'a> {
    pub fn source(&self, index: usize) -> &'a ValueCache {
        self.sources[index]
    }

    /// Whether derivatives can be computed from the sources, i.e. they are requested and the
    /// derivatives of every source are valid.
    pub fn derivatives_available(&self) -> bool {
        self.number_of_xi > 0 && self.sources.iter().all(|s| s.has_derivatives())
    }
}

fn expect_sources(operator: &Operator, expected: usize, actual: usize) -> Result<(), ConstructionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConstructionError::WrongSourceCount {
            operator: operator.keyword(),
            expected,
            actual,
        })
    }
}

/// Number of components of a binary element-wise operation, where a single component
/// operand is applied to every component of the other operand.
fn broadcast_count(operator: &Operator, first: usize, second: usize) -> Result<usize, ConstructionError> {
    if first == second || second == 1 {
        Ok(first)
    } else if first == 1 {
        Ok(second)
    } else {
        Err(ConstructionError::ComponentCountMismatch {
            operator: operator.keyword(),
            first,
            second,
        })
    }
}

/// Side length of a square matrix with the given number of entries.
pub(crate) fn square_dimension(components: usize) -> Option<usize> {
    let n = (components as f64).sqrt().round() as usize;
    (n > 0 && n * n == components).then(|| n)
}

fn is_plain_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Writes a field name so that it reads back as a single token.
pub(crate) fn quote_name(name: &str) -> String {
    if is_plain_token(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl Operator {
    /// The command keyword of the operator.
    pub fn keyword(&self) -> &'static str {
        use ArithmeticOp::*;
        use LogicalOp::*;
        use MatrixOp::*;
        use TrigonometricOp::*;
        use VectorOp::*;
        match self {
            Operator::Constant(_) => "constant",
            Operator::FiniteElement(_) => "finite_element",
            Operator::XiCoordinates => "xi_coordinates",
            Operator::TimeValue => "time_value",
            Operator::Identity => "identity",
            Operator::Component(_) => "component",
            Operator::Concatenate => "concatenate",
            Operator::If => "if",
            Operator::Derivative { .. } => "derivative",
            Operator::Arithmetic(op) => match op {
                Add => "add",
                Subtract => "subtract",
                Multiply => "multiply",
                Divide => "divide",
                Power => "power",
                SumComponents => "sum_components",
                Log => "log",
                Sqrt => "sqrt",
                Exp => "exp",
                Abs => "abs",
            },
            Operator::Trigonometric(op) => match op {
                Sin => "sin",
                Cos => "cos",
                Tan => "tan",
                Asin => "asin",
                Acos => "acos",
                Atan => "atan",
                Atan2 => "atan2",
            },
            Operator::Logical(op) => match op {
                And => "and",
                Or => "or",
                Xor => "xor",
                Not => "not",
                EqualTo => "equal_to",
                GreaterThan => "greater_than",
                LessThan => "less_than",
            },
            Operator::Vector(op) => match op {
                DotProduct => "dot_product",
                CrossProduct => "cross_product",
                Magnitude => "magnitude",
                Normalise => "normalise",
            },
            Operator::Matrix(op) => match op {
                Determinant => "determinant",
                Eigenvalues => "eigenvalues",
                Eigenvectors => "eigenvectors",
                MatrixInvert => "matrix_invert",
                MatrixMultiply { .. } => "matrix_multiply",
                Projection => "projection",
                Transpose { .. } => "transpose",
                QuaternionToMatrix => "quaternion_to_matrix",
                MatrixToQuaternion => "matrix_to_quaternion",
            },
        }
    }

    /// Checks the sources against the requirements of the operator and computes the number
    /// of output components.
    pub(crate) fn component_count(&self, sources: &[&Field]) -> Result<usize, ConstructionError> {
        let counts: Vec<usize> = sources.iter().map(|s| s.component_count).collect();
        let keyword = self.keyword();
        let unary = |expected_count: Option<usize>| -> Result<usize, ConstructionError> {
            expect_sources(self, 1, counts.len())?;
            Ok(expected_count.unwrap_or(counts[0]))
        };
        let binary = || -> Result<usize, ConstructionError> {
            expect_sources(self, 2, counts.len())?;
            broadcast_count(self, counts[0], counts[1])
        };

        match self {
            Operator::Constant(values) => {
                expect_sources(self, 0, counts.len())?;
                if values.is_empty() {
                    return Err(ConstructionError::InvalidParameter {
                        operator: keyword,
                        detail: "at least one value is required".to_string(),
                    });
                }
                Ok(values.len())
            }
            Operator::FiniteElement(parameters) => {
                expect_sources(self, 0, counts.len())?;
                if parameters.component_count() == 0 {
                    return Err(ConstructionError::InvalidParameter {
                        operator: keyword,
                        detail: "at least one component is required".to_string(),
                    });
                }
                Ok(parameters.component_count())
            }
            Operator::XiCoordinates => {
                expect_sources(self, 0, counts.len())?;
                Ok(3)
            }
            Operator::TimeValue => {
                expect_sources(self, 0, counts.len())?;
                Ok(1)
            }
            Operator::Identity => unary(None),
            &Operator::Component(component) => {
                let _ = unary(Some(1))?;
                if component >= counts[0] {
                    return Err(ConstructionError::ComponentOutOfRange {
                        component,
                        components: counts[0],
                    });
                }
                Ok(1)
            }
            Operator::Concatenate => {
                if counts.is_empty() {
                    return Err(ConstructionError::WrongSourceCount {
                        operator: keyword,
                        expected: 1,
                        actual: 0,
                    });
                }
                Ok(counts.iter().sum())
            }
            Operator::If => {
                expect_sources(self, 3, counts.len())?;
                let components = counts[1];
                if counts[1] != counts[2] {
                    return Err(ConstructionError::ComponentCountMismatch {
                        operator: keyword,
                        first: counts[1],
                        second: counts[2],
                    });
                }
                if counts[0] != 1 && counts[0] != components {
                    return Err(ConstructionError::ComponentCountMismatch {
                        operator: keyword,
                        first: counts[0],
                        second: components,
                    });
                }
                Ok(components)
            }
            &Operator::Derivative { xi_index } => {
                let components = unary(None)?;
                // Elements have at most three reference coordinates
                if xi_index >= 3 {
                    return Err(ConstructionError::InvalidParameter {
                        operator: keyword,
                        detail: format!("xi index {} is not below 3", xi_index),
                    });
                }
                Ok(components)
            }
            Operator::Arithmetic(op) => match op {
                ArithmeticOp::Add
                | ArithmeticOp::Subtract
                | ArithmeticOp::Multiply
                | ArithmeticOp::Divide
                | ArithmeticOp::Power => binary(),
                ArithmeticOp::SumComponents => unary(Some(1)),
                ArithmeticOp::Log | ArithmeticOp::Sqrt | ArithmeticOp::Exp | ArithmeticOp::Abs => unary(None),
            },
            Operator::Trigonometric(TrigonometricOp::Atan2) => binary(),
            Operator::Trigonometric(_) => unary(None),
            Operator::Logical(LogicalOp::Not) => unary(None),
            Operator::Logical(_) => binary(),
            Operator::Vector(op) => match op {
                VectorOp::DotProduct => {
                    expect_sources(self, 2, counts.len())?;
                    if counts[0] != counts[1] {
                        return Err(ConstructionError::ComponentCountMismatch {
                            operator: keyword,
                            first: counts[0],
                            second: counts[1],
                        });
                    }
                    Ok(1)
                }
                VectorOp::CrossProduct => {
                    expect_sources(self, 2, counts.len())?;
                    match (counts[0], counts[1]) {
                        (3, 3) => Ok(3),
                        (3, other) | (other, _) => Err(ConstructionError::UnsupportedComponentCount {
                            operator: keyword,
                            components: other,
                        }),
                    }
                }
                VectorOp::Magnitude => unary(Some(1)),
                VectorOp::Normalise => unary(None),
            },
            Operator::Matrix(op) => matrix::component_count(op, keyword, sources, &counts),
        }
    }

    /// Structural equality of operator definitions.
    ///
    /// Finite element fields carry their own parameters, so two of them are never equivalent.
    pub fn is_equivalent(&self, other: &Operator) -> bool {
        match (self, other) {
            (Operator::FiniteElement(_), _) | (_, Operator::FiniteElement(_)) => false,
            _ => self == other,
        }
    }

    /// Whether the operator computes derivatives when its sources provide them.
    ///
    /// Operators without support are evaluated with no derivative directions, so their
    /// derivatives are never valid.
    pub fn supports_derivatives(&self) -> bool {
        match self {
            Operator::Derivative { .. } | Operator::Arithmetic(ArithmeticOp::Abs) | Operator::Logical(_) => false,
            Operator::Matrix(op) => matches!(
                op,
                MatrixOp::MatrixMultiply { .. } | MatrixOp::Projection | MatrixOp::Transpose { .. }
            ),
            _ => true,
        }
    }

    /// Builds the command text of the operator given the (already quoted) source names.
    pub(crate) fn describe(&self, sources: &[String]) -> String {
        let mut text = self.keyword().to_string();
        let single = |text: &mut String, parameter: &str| {
            let _ = write!(text, " {} {}", parameter, sources.join(" "));
        };
        match self {
            Operator::Constant(values) => {
                text.push_str(" values");
                for value in values {
                    let _ = write!(text, " {}", value);
                }
            }
            Operator::FiniteElement(parameters) => {
                let _ = write!(text, " number_of_components {}", parameters.component_count());
            }
            Operator::XiCoordinates | Operator::TimeValue => {}
            Operator::Component(component) => {
                let _ = write!(text, " field {} component {}", sources.join(" "), component);
            }
            Operator::Derivative { xi_index } => {
                let _ = write!(text, " field {} xi_index {}", sources[0], xi_index);
            }
            Operator::Matrix(MatrixOp::Eigenvectors) => single(&mut text, "eigenvalues"),
            Operator::Matrix(MatrixOp::MatrixMultiply { number_of_rows }) => {
                let _ = write!(text, " number_of_rows {} fields {}", number_of_rows, sources.join(" "));
            }
            Operator::Matrix(MatrixOp::Projection) => {
                let _ = write!(text, " field {} projection_matrix {}", sources[0], sources[1]);
            }
            Operator::Matrix(MatrixOp::Transpose { source_number_of_rows }) => {
                let _ = write!(
                    text,
                    " source_number_of_rows {} field {}",
                    source_number_of_rows, sources[0]
                );
            }
            _ if sources.len() == 1 => single(&mut text, "field"),
            _ => single(&mut text, "fields"),
        }
        text
    }

    /// Computes the values, and if possible the derivatives, of a field from its evaluated
    /// sources.
    pub(crate) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        match self {
            Operator::Constant(values) => composite::evaluate_constant(values, input, cache),
            Operator::FiniteElement(parameters) => parameters.evaluate(input, cache),
            Operator::XiCoordinates => composite::evaluate_xi(input, cache),
            Operator::TimeValue => composite::evaluate_time(input, cache),
            Operator::Identity => composite::evaluate_identity(input, cache),
            &Operator::Component(component) => composite::evaluate_component(component, input, cache),
            Operator::Concatenate => composite::evaluate_concatenate(input, cache),
            Operator::If => composite::evaluate_if(input, cache),
            &Operator::Derivative { xi_index } => composite::evaluate_derivative(xi_index, input, cache),
            Operator::Arithmetic(op) => op.evaluate(input, cache),
            Operator::Trigonometric(op) => op.evaluate(input, cache),
            Operator::Logical(op) => op.evaluate(input, cache),
            Operator::Vector(op) => op.evaluate(input, cache),
            Operator::Matrix(op) => op.evaluate(input, cache),
        }
    }
}

/// Index of the operand component paired with output component `i` under broadcasting.
#[inline]
pub(crate) fn broadcast_index(operand_components: usize, i: usize) -> usize {
    if operand_components == 1 {
        0
    } else {
        i
    }
}

pub(crate) use matrix::{inverse_projection, inverse_transpose};
