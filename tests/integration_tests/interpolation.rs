use femfield::import::{import_element_interpolation, import_node_parameters};
use femfield::{ElementId, FieldId, FieldModule, LagrangeBasis, NodeId};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Matrix2, Vector2};

struct TriangleMesh {
    vertices: Vec<[f64; 2]>,
    nodes: Vec<NodeId>,
    elements: Vec<ElementId>,
    connectivity: Vec<[NodeId; 3]>,
}

/// The unit square divided into `res x res` cells of two triangles each.
fn create_unit_square_tri_mesh(res: u32) -> TriangleMesh {
    let n = res + 1;
    let node = |i: u32, j: u32| NodeId(i + n * j);
    let mut mesh = TriangleMesh {
        vertices: Vec::new(),
        nodes: Vec::new(),
        elements: Vec::new(),
        connectivity: Vec::new(),
    };
    for j in 0..n {
        for i in 0..n {
            mesh.nodes.push(node(i, j));
            mesh.vertices.push([i as f64 / res as f64, j as f64 / res as f64]);
        }
    }
    for j in 0..res {
        for i in 0..res {
            mesh.connectivity.push([node(i, j), node(i + 1, j), node(i, j + 1)]);
            mesh.connectivity.push([node(i + 1, j + 1), node(i, j + 1), node(i + 1, j)]);
        }
    }
    mesh.elements = (0..mesh.connectivity.len() as u32).map(ElementId).collect();
    mesh
}

fn define_on_mesh(module: &mut FieldModule, mesh: &TriangleMesh, component_count: usize) -> FieldId {
    let field = module.create_finite_element(component_count).unwrap();
    let local_nodes: Vec<NodeId> = mesh.connectivity.iter().flatten().copied().collect();
    import_element_interpolation(module, field, &mesh.elements, LagrangeBasis::LinearTriangle, &local_nodes).unwrap();
    field
}

/// Evaluates `expression` at every node and assigns the result to `target`.
fn interpolate_at_nodes(module: &mut FieldModule, mesh: &TriangleMesh, expression: FieldId, target: FieldId) {
    let mut ctx = module.create_evaluation_context();
    module.begin_change();
    for &node in &mesh.nodes {
        ctx.set_node(node);
        let values = module.evaluate_real(&mut ctx, expression).unwrap();
        module.assign_real(&mut ctx, target, &values).unwrap();
    }
    module.end_change();
}

fn mesh_with_coordinates(res: u32) -> (FieldModule, TriangleMesh, FieldId) {
    let mesh = create_unit_square_tri_mesh(res);
    let mut module = FieldModule::new();
    let coordinates = define_on_mesh(&mut module, &mesh, 2);
    let values: Vec<f64> = mesh.vertices.iter().flatten().copied().collect();
    import_node_parameters(&mut module, coordinates, &mesh.nodes, &values).unwrap();
    module.set_name(coordinates, "coordinates").unwrap();
    (module, mesh, coordinates)
}

#[test]
fn nodal_interpolation_of_expression_averages_at_centroids() {
    let (mut module, mesh, coordinates) = mesh_with_coordinates(6);
    let x = module.create_component(coordinates, 0).unwrap();
    let y = module.create_component(coordinates, 1).unwrap();
    let sin_x = module.create_sin(x).unwrap();
    let two = module.create_constant(&[2.0]).unwrap();
    let x_squared = module.create_power(x, two).unwrap();
    let sin_x_y = module.create_multiply(sin_x, y).unwrap();
    let expression = module.create_add(sin_x_y, x_squared).unwrap();

    let u = define_on_mesh(&mut module, &mesh, 1);
    interpolate_at_nodes(&mut module, &mesh, expression, u);

    let f = |p: [f64; 2]| p[0].sin() * p[1] + p[0] * p[0];
    let vertex = |node: NodeId| mesh.vertices[node.0 as usize];
    let mut ctx = module.create_evaluation_context();
    for (&element, nodes) in mesh.elements.iter().zip(&mesh.connectivity) {
        ctx.set_element_location(element, &[1.0 / 3.0, 1.0 / 3.0]);
        let u_centroid = module.evaluate_real(&mut ctx, u).unwrap()[0];
        let expected = nodes.iter().map(|&node| f(vertex(node))).sum::<f64>() / 3.0;
        assert_scalar_eq!(u_centroid, expected, comp = abs, tol = 1e-12);
    }
}

#[test]
fn reference_jacobians_recover_area_and_gradients() {
    let (mut module, mesh, coordinates) = mesh_with_coordinates(5);
    let x = module.create_component(coordinates, 0).unwrap();
    let y = module.create_component(coordinates, 1).unwrap();
    let a = module.create_constant(&[2.0]).unwrap();
    let b = module.create_constant(&[-3.0]).unwrap();
    let one = module.create_constant(&[1.0]).unwrap();
    let ax = module.create_multiply(a, x).unwrap();
    let by = module.create_multiply(b, y).unwrap();
    let ax_by = module.create_add(ax, by).unwrap();
    let affine = module.create_add(ax_by, one).unwrap();

    let u = define_on_mesh(&mut module, &mesh, 1);
    interpolate_at_nodes(&mut module, &mesh, affine, u);

    let mut ctx = module.create_evaluation_context();
    ctx.set_derivatives_requested(true);
    let mut area = 0.0;
    for &element in &mesh.elements {
        ctx.set_element_location(element, &[0.2, 0.3]);
        let (_, dx_dxi) = module.evaluate_with_derivatives(&mut ctx, coordinates).unwrap();
        let (_, du_dxi) = module.evaluate_with_derivatives(&mut ctx, u).unwrap();
        let jacobian = Matrix2::from_row_slice(&dx_dxi);
        area += jacobian.determinant().abs() / 2.0;

        // du/dxi = J^T grad u
        let gradient = jacobian
            .transpose()
            .lu()
            .solve(&Vector2::new(du_dxi[0], du_dxi[1]))
            .unwrap();
        assert_scalar_eq!(gradient[0], 2.0, comp = abs, tol = 1e-10);
        assert_scalar_eq!(gradient[1], -3.0, comp = abs, tol = 1e-10);
    }
    assert_scalar_eq!(area, 1.0, comp = abs, tol = 1e-12);
}
