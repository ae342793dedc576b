//! Storage for the computed output of one field in one evaluation context.
use crate::error::EvaluationError;
use nalgebra::DMatrix;

/// Evaluation state of a [`ValueCache`] relative to the generation of its context.
///
/// A state stamped with a generation other than the current generation of the context is
/// equivalent to [`CacheState::Invalid`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Invalid,
    /// The field is being evaluated. Reaching a field in this state means it depends on itself.
    Computing(u64),
    Valid(u64),
    /// Evaluation failed. The error is reported again for further requests in the same
    /// generation.
    Failed(u64, EvaluationError),
}

/// Intermediate results kept by some operators for use by dependent fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Scratch {
    None,
    /// Eigenvectors stored as columns, in the order of the computed eigenvalues.
    Eigen { eigenvectors: DMatrix<f64> },
}

impl CacheState {
    /// The generation the state was stamped with, if any.
    pub fn generation(&self) -> Option<u64> {
        match *self {
            CacheState::Invalid => None,
            CacheState::Computing(g) | CacheState::Valid(g) | CacheState::Failed(g, _) => Some(g),
        }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Scratch::None
    }
}

#[derive(Debug, Clone)]
pub struct ValueCache {
    values: Vec<f64>,
    derivatives: Vec<f64>,
    number_of_xi: usize,
    derivatives_valid: bool,
    state: CacheState,
    scratch: Scratch,
}

impl ValueCache {
    pub fn new(component_count: usize) -> Self {
        Self {
            values: vec![0.0; component_count],
            derivatives: Vec::new(),
            number_of_xi: 0,
            derivatives_valid: false,
            state: CacheState::Invalid,
            scratch: Scratch::None,
        }
    }

    pub fn component_count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of derivative directions stored per component.
    pub fn number_of_xi(&self) -> usize {
        self.number_of_xi
    }

    pub fn has_derivatives(&self) -> bool {
        self.derivatives_valid
    }

    /// Derivatives of every component with respect to each direction, with the derivative of
    /// component `i` in direction `k` at `i * number_of_xi() + k`.
    ///
    /// Returns `None` unless the derivatives were computed in the last evaluation.
    pub fn derivatives(&self) -> Option<&[f64]> {
        self.derivatives_valid.then(|| self.derivatives.as_slice())
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Whether the contents may be read in the given generation.
    pub fn is_valid(&self, generation: u64) -> bool {
        self.state == CacheState::Valid(generation)
    }

    /// Resizes the storage for a new evaluation and marks the derivatives invalid.
    ///
    /// Scratch data is kept, so that operators can reuse its allocation.
    pub(crate) fn prepare(&mut self, component_count: usize, number_of_xi: usize) {
        self.values.resize(component_count, 0.0);
        self.derivatives.clear();
        self.derivatives.resize(component_count * number_of_xi, 0.0);
        self.number_of_xi = number_of_xi;
        self.derivatives_valid = false;
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub(crate) fn derivatives_mut(&mut self) -> &mut [f64] {
        &mut self.derivatives
    }

    /// Returns the values and derivatives for simultaneous writing.
    pub(crate) fn values_and_derivatives_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.values, &mut self.derivatives)
    }

    pub(crate) fn set_derivatives_valid(&mut self, valid: bool) {
        self.derivatives_valid = valid;
    }

    pub(crate) fn set_state(&mut self, state: CacheState) {
        self.state = state;
    }

    pub(crate) fn set_scratch(&mut self, scratch: Scratch) {
        self.scratch = scratch;
    }

    /// Copies values and, if valid, derivatives from another cache of the same shape.
    pub(crate) fn copy_from(&mut self, other: &ValueCache) {
        self.values.copy_from_slice(&other.values);
        if other.derivatives_valid && other.number_of_xi == self.number_of_xi {
            self.derivatives.copy_from_slice(&other.derivatives);
            self.derivatives_valid = true;
        }
    }
}
