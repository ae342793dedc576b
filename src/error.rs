//! Error types for field construction, evaluation and assignment.
use crate::field::FieldId;
use crate::location::{ElementId, NodeId};
use femfield_linalg::{EigenanalysisError, SingularMatrixError};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// A field definition was rejected.
///
/// Returned by the factory methods of [`FieldModule`](crate::module::FieldModule) and by the
/// primitives that modify names, ownership or finite element parameters. When a factory
/// fails, no field is created.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// The field does not exist in the module, or has been destroyed.
    UnknownField(FieldId),
    /// The operator requires a different number of source fields.
    WrongSourceCount {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Two source fields that must agree on their number of components do not.
    ComponentCountMismatch {
        operator: &'static str,
        first: usize,
        second: usize,
    },
    /// The operator is not defined for a source with this number of components.
    UnsupportedComponentCount { operator: &'static str, components: usize },
    /// The operator requires a square matrix, i.e. `n * n` components.
    NotSquareMatrix { operator: &'static str, components: usize },
    /// The source fields can not be interpreted as matrices of compatible shape.
    IncompatibleShape { operator: &'static str, detail: String },
    /// An operator parameter is out of range.
    InvalidParameter { operator: &'static str, detail: String },
    /// An eigenvectors field must be created from an eigenvalues field.
    NotEigenvaluesField,
    /// The definition would make the field depend on itself.
    CyclicDefinition(FieldId),
    /// The new definition of a replaced field is incompatible with one of its dependents.
    IncompatibleReplacement { field: FieldId, dependent: FieldId },
    DuplicateName(String),
    InvalidName(String),
    /// The field was released more often than it was retained.
    NotAccessed(FieldId),
    /// The operation only applies to finite element fields.
    NotFiniteElement(FieldId),
    ComponentOutOfRange { component: usize, components: usize },
    WrongValueCount { expected: usize, actual: usize },
    /// The number of element nodes does not match the number of basis functions.
    BasisNodeCountMismatch { expected: usize, actual: usize },
}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use ConstructionError::*;
        match self {
            UnknownField(id) => write!(f, "Field {} does not exist.", id),
            WrongSourceCount {
                operator,
                expected,
                actual,
            } => write!(
                f,
                "Operator {} expects {} source field(s), got {}.",
                operator, expected, actual
            ),
            ComponentCountMismatch { operator, first, second } => write!(
                f,
                "Operator {} requires matching component counts, got {} and {}.",
                operator, first, second
            ),
            UnsupportedComponentCount { operator, components } => write!(
                f,
                "Operator {} is not defined for a source with {} component(s).",
                operator, components
            ),
            NotSquareMatrix { operator, components } => write!(
                f,
                "Operator {} requires a square matrix, but source has {} component(s).",
                operator, components
            ),
            IncompatibleShape { operator, detail } => write!(f, "Incompatible shapes for {}: {}", operator, detail),
            InvalidParameter { operator, detail } => write!(f, "Invalid parameter for {}: {}", operator, detail),
            NotEigenvaluesField => write!(f, "Source of eigenvectors must be an eigenvalues field."),
            CyclicDefinition(id) => write!(f, "Definition would make field {} depend on itself.", id),
            IncompatibleReplacement { field, dependent } => write!(
                f,
                "New definition of field {} is incompatible with dependent field {}.",
                field, dependent
            ),
            DuplicateName(name) => write!(f, "A field named \"{}\" already exists.", name),
            InvalidName(name) => write!(f, "\"{}\" is not a valid field name.", name),
            NotAccessed(id) => write!(f, "Field {} has no accesses to release.", id),
            NotFiniteElement(id) => write!(f, "Field {} is not a finite element field.", id),
            ComponentOutOfRange { component, components } => write!(
                f,
                "Component {} is out of range for a field with {} component(s).",
                component, components
            ),
            WrongValueCount { expected, actual } => write!(f, "Expected {} value(s), got {}.", expected, actual),
            BasisNodeCountMismatch { expected, actual } => write!(
                f,
                "Basis requires {} node(s), but {} were given.",
                expected, actual
            ),
        }
    }
}

impl Error for ConstructionError {}

/// A field could not be evaluated at the current location.
///
/// Failures propagate: a field whose source fails to evaluate fails with the error of that
/// source.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    UnknownField(FieldId),
    /// The context was created by a different field module.
    ForeignContext,
    /// The field (transitively) depends on itself.
    CyclicDependency(FieldId),
    /// The field is not defined at the kind of location currently set.
    UnsupportedLocation(FieldId),
    NodeNotDefined { field: FieldId, node: NodeId },
    ElementNotDefined { field: FieldId, element: ElementId },
    /// The number of element coordinates does not match the dimension of the element basis.
    XiDimensionMismatch {
        field: FieldId,
        expected: usize,
        actual: usize,
    },
    SingularMatrix(SingularMatrixError),
    Eigenanalysis(EigenanalysisError),
    /// Intermediate results expected in a source cache were not present.
    MissingIntermediate(FieldId),
    /// Derivatives were required but are not available for the field.
    DerivativesUnavailable(FieldId),
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use EvaluationError::*;
        match self {
            UnknownField(id) => write!(f, "Field {} does not exist.", id),
            ForeignContext => write!(f, "Evaluation context belongs to a different field module."),
            CyclicDependency(id) => write!(f, "Field {} depends on itself.", id),
            UnsupportedLocation(id) => write!(f, "Field {} is not defined at the current location.", id),
            NodeNotDefined { field, node } => write!(f, "Field {} is not defined at node {}.", field, node),
            ElementNotDefined { field, element } => {
                write!(f, "Field {} is not defined on element {}.", field, element)
            }
            XiDimensionMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Field {} requires {} element coordinate(s), got {}.",
                field, expected, actual
            ),
            SingularMatrix(err) => write!(f, "{}", err),
            Eigenanalysis(err) => write!(f, "{}", err),
            MissingIntermediate(id) => write!(f, "Source of field {} is missing intermediate results.", id),
            DerivativesUnavailable(id) => write!(f, "Derivatives of field {} are not available.", id),
        }
    }
}

impl Error for EvaluationError {}

impl From<SingularMatrixError> for EvaluationError {
    fn from(err: SingularMatrixError) -> Self {
        EvaluationError::SingularMatrix(err)
    }
}

impl From<EigenanalysisError> for EvaluationError {
    fn from(err: EigenanalysisError) -> Self {
        EvaluationError::Eigenanalysis(err)
    }
}

/// Values could not be assigned to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentError {
    UnknownField(FieldId),
    ForeignContext,
    /// The operator has no inverse.
    NotSupported { operator: &'static str },
    /// The operator only has an inverse for particular source shapes.
    UnsupportedShape { operator: &'static str },
    /// The field can not be assigned at the kind of location currently set.
    UnsupportedLocation(FieldId),
    WrongValueCount { expected: usize, actual: usize },
    SingularMatrix(SingularMatrixError),
    /// The inverse projection produced a point at infinity.
    ZeroHomogeneousCoordinate,
    /// A source field needed to compute the inverse failed to evaluate.
    Evaluation(EvaluationError),
}

impl Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use AssignmentError::*;
        match self {
            UnknownField(id) => write!(f, "Field {} does not exist.", id),
            ForeignContext => write!(f, "Evaluation context belongs to a different field module."),
            NotSupported { operator } => write!(f, "Operator {} does not support assignment.", operator),
            UnsupportedShape { operator } => {
                write!(f, "Operator {} does not support assignment for these shapes.", operator)
            }
            UnsupportedLocation(id) => write!(f, "Field {} can not be assigned at the current location.", id),
            WrongValueCount { expected, actual } => write!(f, "Expected {} value(s), got {}.", expected, actual),
            SingularMatrix(err) => write!(f, "{}", err),
            ZeroHomogeneousCoordinate => write!(f, "Inverse projection has zero homogeneous coordinate."),
            Evaluation(err) => write!(f, "Evaluation failed during assignment: {}", err),
        }
    }
}

impl Error for AssignmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssignmentError::Evaluation(err) => Some(err),
            AssignmentError::SingularMatrix(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EvaluationError> for AssignmentError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::ForeignContext => AssignmentError::ForeignContext,
            err => AssignmentError::Evaluation(err),
        }
    }
}
