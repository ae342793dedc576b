//! Bulk loading of finite element parameters from flat arrays.
use crate::basis::{ElementBasis, LagrangeBasis};
use crate::field::FieldId;
use crate::location::{ElementId, NodeId};
use crate::module::FieldModule;
use eyre::{eyre, WrapErr};

/// Sets the values of a finite element field at many nodes.
///
/// `values` holds the components of each node in turn. Observers are notified once.
pub fn import_node_parameters(
    module: &mut FieldModule,
    field: FieldId,
    node_ids: &[NodeId],
    values: &[f64],
) -> eyre::Result<()> {
    let component_count = module
        .component_count(field)
        .ok_or_else(|| eyre!("Field {} does not exist", field))?;
    if values.len() != node_ids.len() * component_count {
        return Err(eyre!(
            "Expected {} values for {} nodes with {} components, got {}",
            node_ids.len() * component_count,
            node_ids.len(),
            component_count,
            values.len()
        ));
    }

    module.begin_change();
    let result = node_ids
        .iter()
        .zip(values.chunks_exact(component_count))
        .try_for_each(|(&node, node_values)| {
            module
                .set_node_parameters(field, node, node_values)
                .wrap_err_with(|| format!("Failed to set parameters of node {}", node))
        });
    module.end_change();
    result
}

/// Interpolates all components of a finite element field over many elements with the same
/// basis.
///
/// `local_node_map` holds the nodes of each element in turn, one per basis function.
/// Observers are notified once.
pub fn import_element_interpolation(
    module: &mut FieldModule,
    field: FieldId,
    element_ids: &[ElementId],
    basis: LagrangeBasis,
    local_node_map: &[NodeId],
) -> eyre::Result<()> {
    let nodes_per_element = basis.num_nodes();
    if local_node_map.len() != element_ids.len() * nodes_per_element {
        return Err(eyre!(
            "Expected {} local nodes for {} elements with basis {}, got {}",
            element_ids.len() * nodes_per_element,
            element_ids.len(),
            basis.keyword(),
            local_node_map.len()
        ));
    }

    module.begin_change();
    let result = element_ids
        .iter()
        .zip(local_node_map.chunks_exact(nodes_per_element))
        .try_for_each(|(&element, nodes)| {
            module
                .define_element(field, element, None, basis, nodes)
                .wrap_err_with(|| format!("Failed to define field on element {}", element))
        });
    module.end_change();
    result
}
