use crate::basis::{ElementBasis, LagrangeBasis};
use crate::cache::ValueCache;
use crate::error::{ConstructionError, EvaluationError};
use crate::field::OperatorInput;
use crate::location::{DomainLocation, ElementId, NodeId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Interpolation of one field component over an element from values at the element nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInterpolation {
    pub basis: LagrangeBasis,
    /// The node associated with each basis function.
    pub nodes: Vec<NodeId>,
}

/// Node values and element interpolations of a finite element field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FiniteElementParameters {
    component_count: usize,
    node_values: FxHashMap<NodeId, Vec<f64>>,
    elements: FxHashMap<ElementId, Vec<Option<ElementInterpolation>>>,
}

impl FiniteElementParameters {
    pub fn new(component_count: usize) -> Self {
        Self {
            component_count,
            ..Default::default()
        }
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn node_values(&self, node: NodeId) -> Option<&[f64]> {
        self.node_values.get(&node).map(Vec::as_slice)
    }

    pub fn element_interpolation(&self, element: ElementId, component: usize) -> Option<&ElementInterpolation> {
        self.elements
            .get(&element)
            .and_then(|components| components.get(component))
            .and_then(Option::as_ref)
    }

    pub fn is_defined_on_element(&self, element: ElementId) -> bool {
        self.elements
            .get(&element)
            .map_or(false, |components| components.iter().all(Option::is_some))
    }

    /// Nodes with values, in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.node_values.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Elements with at least one interpolated component, in ascending order.
    pub fn elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<_> = self.elements.keys().copied().collect();
        elements.sort_unstable();
        elements
    }

    pub(crate) fn set_node_values(&mut self, node: NodeId, values: &[f64]) -> Result<(), ConstructionError> {
        if values.len() != self.component_count {
            return Err(ConstructionError::WrongValueCount {
                expected: self.component_count,
                actual: values.len(),
            });
        }
        self.node_values.insert(node, values.to_vec());
        Ok(())
    }

    /// Sets a single component at a node. The remaining components of a node without values
    /// are set to zero.
    pub(crate) fn set_node_component(
        &mut self,
        node: NodeId,
        component: usize,
        value: f64,
    ) -> Result<(), ConstructionError> {
        self.check_component(component)?;
        let component_count = self.component_count;
        self.node_values
            .entry(node)
            .or_insert_with(|| vec![0.0; component_count])[component] = value;
        Ok(())
    }

    /// Defines the interpolation of one component, or of all components if `component` is
    /// `None`, over the element.
    pub(crate) fn define_element(
        &mut self,
        element: ElementId,
        component: Option<usize>,
        interpolation: ElementInterpolation,
    ) -> Result<(), ConstructionError> {
        let expected = interpolation.basis.num_nodes();
        if interpolation.nodes.len() != expected {
            return Err(ConstructionError::BasisNodeCountMismatch {
                expected,
                actual: interpolation.nodes.len(),
            });
        }
        if let Some(component) = component {
            self.check_component(component)?;
        }
        let component_count = self.component_count;
        let components = self
            .elements
            .entry(element)
            .or_insert_with(|| vec![None; component_count]);
        match component {
            Some(component) => components[component] = Some(interpolation),
            None => components.fill(Some(interpolation)),
        }
        Ok(())
    }

    /// Removes all interpolations over the element. Returns whether any existed.
    pub(crate) fn undefine_element(&mut self, element: ElementId) -> bool {
        self.elements.remove(&element).is_some()
    }

    fn check_component(&self, component: usize) -> Result<(), ConstructionError> {
        if component < self.component_count {
            Ok(())
        } else {
            Err(ConstructionError::ComponentOutOfRange {
                component,
                components: self.component_count,
            })
        }
    }

    pub(super) fn evaluate(&self, input: &OperatorInput, cache: &mut ValueCache) -> Result<(), EvaluationError> {
        let field = input.field;
        match &input.location.domain {
            DomainLocation::Unset => Err(EvaluationError::UnsupportedLocation(field)),
            &DomainLocation::Node(node) => {
                let values = self
                    .node_values(node)
                    .ok_or(EvaluationError::NodeNotDefined { field, node })?;
                cache.values_mut().copy_from_slice(values);
                Ok(())
            }
            &DomainLocation::Element { element, ref xi } => {
                let components = self
                    .elements
                    .get(&element)
                    .ok_or(EvaluationError::ElementNotDefined { field, element })?;
                let nxi = input.number_of_xi;
                let mut basis_values = Vec::new();
                let mut basis_gradients = Vec::new();
                let (values, derivatives) = cache.values_and_derivatives_mut();

                for (c, interpolation) in components.iter().enumerate() {
                    let interpolation = interpolation
                        .as_ref()
                        .ok_or(EvaluationError::ElementNotDefined { field, element })?;
                    let basis = &interpolation.basis;
                    let dimension = basis.dimension();
                    if dimension != xi.len() {
                        return Err(EvaluationError::XiDimensionMismatch {
                            field,
                            expected: dimension,
                            actual: xi.len(),
                        });
                    }
                    basis_values.resize(basis.num_nodes(), 0.0);
                    basis.populate_basis(&mut basis_values, xi);
                    if nxi > 0 {
                        basis_gradients.resize(basis.num_nodes() * dimension, 0.0);
                        basis.populate_basis_gradients(&mut basis_gradients, xi);
                    }

                    values[c] = 0.0;
                    for (i, &node) in interpolation.nodes.iter().enumerate() {
                        let u = self
                            .node_values
                            .get(&node)
                            .ok_or(EvaluationError::NodeNotDefined { field, node })?[c];
                        values[c] += basis_values[i] * u;
                        for k in 0..nxi {
                            derivatives[c * nxi + k] += basis_gradients[i * dimension + k] * u;
                        }
                    }
                }
                cache.set_derivatives_valid(nxi > 0);
                Ok(())
            }
        }
    }
}
