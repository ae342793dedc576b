use femfield::{ElementId, FieldId, FieldModule, LagrangeBasis, NodeId};

mod context;
mod derivatives;
mod import;

/// The rectangle `[0, 1] x [0, 2]` as a single bilinear element 1 with nodes 1 to 4,
/// numbered with x varying fastest.
pub fn bilinear_rectangle(module: &mut FieldModule) -> FieldId {
    let coordinates = module.create_finite_element(2).unwrap();
    let points = [[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [1.0, 2.0]];
    for (i, point) in points.iter().enumerate() {
        module
            .set_node_parameters(coordinates, NodeId(i as u32 + 1), point)
            .unwrap();
    }
    let nodes = [NodeId(1), NodeId(2), NodeId(3), NodeId(4)];
    module
        .define_element(coordinates, ElementId(1), None, LagrangeBasis::BilinearSquare, &nodes)
        .unwrap();
    coordinates
}
