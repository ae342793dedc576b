use femfield::import::{import_element_interpolation, import_node_parameters};
use femfield::{ConstructionError, ElementId, FieldModule, LagrangeBasis, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn line_mesh_is_imported_in_one_change() {
    let mut module = FieldModule::new();
    let field = module.create_finite_element(2).unwrap();
    let notifications = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&notifications);
    module.add_observer(move |_| *sink.borrow_mut() += 1);

    let nodes = [NodeId(1), NodeId(2), NodeId(3)];
    #[rustfmt::skip]
    let values = [
        0.0, 10.0,
        1.0, 20.0,
        3.0, 40.0,
    ];
    import_node_parameters(&mut module, field, &nodes, &values).unwrap();
    let elements = [ElementId(1), ElementId(2)];
    let local_nodes = [NodeId(1), NodeId(2), NodeId(2), NodeId(3)];
    import_element_interpolation(&mut module, field, &elements, LagrangeBasis::LinearLine, &local_nodes).unwrap();
    assert_eq!(*notifications.borrow(), 2);

    let parameters = module.finite_element_parameters(field).unwrap();
    assert_eq!(parameters.nodes(), nodes.to_vec());
    assert_eq!(parameters.elements(), elements.to_vec());

    let mut ctx = module.create_evaluation_context();
    ctx.set_element_location(ElementId(2), &[0.5]);
    assert_eq!(module.evaluate_real(&mut ctx, field).unwrap(), vec![2.0, 30.0]);
    ctx.set_element_location(ElementId(1), &[0.25]);
    assert_eq!(module.evaluate_real(&mut ctx, field).unwrap(), vec![0.25, 12.5]);
}

#[test]
fn mismatched_array_lengths_are_rejected() {
    let mut module = FieldModule::new();
    let field = module.create_finite_element(2).unwrap();

    let err = import_node_parameters(&mut module, field, &[NodeId(1), NodeId(2)], &[1.0, 2.0, 3.0]).unwrap_err();
    assert!(err.to_string().contains("Expected 4 values"));

    let err = import_element_interpolation(
        &mut module,
        field,
        &[ElementId(1)],
        LagrangeBasis::BilinearSquare,
        &[NodeId(1), NodeId(2)],
    )
    .unwrap_err();
    assert!(err.to_string().contains("l.Lagrange*l.Lagrange"));
    assert!(module.finite_element_parameters(field).unwrap().nodes().is_empty());
}

#[test]
fn failures_carry_the_offending_entity() {
    let mut module = FieldModule::new();
    let constant = module.create_constant(&[1.0]).unwrap();
    let err = import_node_parameters(&mut module, constant, &[NodeId(5)], &[2.0]).unwrap_err();
    assert_eq!(err.to_string(), "Failed to set parameters of node 5");
    assert_eq!(
        err.root_cause().downcast_ref::<ConstructionError>(),
        Some(&ConstructionError::NotFiniteElement(constant))
    );

    let missing = module.create_constant(&[0.0]).unwrap();
    module.release(missing).unwrap();
    let err = import_element_interpolation(
        &mut module,
        missing,
        &[ElementId(3)],
        LagrangeBasis::LinearLine,
        &[NodeId(1), NodeId(2)],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Failed to define field on element 3");
}
