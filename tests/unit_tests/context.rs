use femfield::{CacheState, DomainLocation, ElementId, EvaluationError, FieldModule, Location, NodeId};

#[test]
fn moving_location_never_returns_stale_values() {
    let mut module = FieldModule::new();
    let xi = module.create_xi_coordinates().unwrap();
    let two = module.create_constant(&[2.0]).unwrap();
    let scaled = module.create_multiply(xi, two).unwrap();
    let mut ctx = module.create_evaluation_context();

    ctx.set_element_location(ElementId(1), &[0.25, 0.5]);
    let at_a = module.evaluate_real(&mut ctx, scaled).unwrap();
    assert_eq!(at_a, vec![0.5, 1.0, 0.0]);
    let generation_a = ctx.generation();

    ctx.set_element_location(ElementId(1), &[0.75, 0.125]);
    assert_eq!(module.evaluate_real(&mut ctx, scaled).unwrap(), vec![1.5, 0.25, 0.0]);

    ctx.set_element_location(ElementId(1), &[0.25, 0.5]);
    assert!(ctx.generation() > generation_a);
    assert!(module.cache(&ctx, scaled).is_none());
    assert_eq!(module.evaluate_real(&mut ctx, scaled).unwrap(), at_a);
    assert_eq!(
        module.cache(&ctx, scaled).unwrap().state(),
        &CacheState::Valid(ctx.generation())
    );
}

#[test]
fn setting_same_location_keeps_generation() {
    let module = FieldModule::new();
    let mut ctx = module.create_evaluation_context();
    ctx.set_element_location(ElementId(3), &[0.5]);
    let generation = ctx.generation();
    ctx.set_element_location(ElementId(3), &[0.5]);
    ctx.set_time(0.0);
    ctx.set_derivatives_requested(false);
    assert_eq!(ctx.generation(), generation);

    ctx.set_time(1.0);
    assert_eq!(ctx.generation(), generation + 1);
    ctx.set_node(NodeId(4));
    assert_eq!(ctx.generation(), generation + 2);
    assert_eq!(ctx.location(), &Location::node(NodeId(4), 1.0));
    ctx.clear_location();
    assert_eq!(ctx.location().domain, DomainLocation::Unset);
    assert_eq!(ctx.generation(), generation + 3);
}

#[test]
fn time_value_follows_context_time() {
    let mut module = FieldModule::new();
    let time = module.create_time_value().unwrap();
    let mut ctx = module.create_evaluation_context();
    assert_eq!(module.evaluate_real(&mut ctx, time).unwrap(), vec![0.0]);
    ctx.set_time(2.5);
    assert_eq!(module.evaluate_real(&mut ctx, time).unwrap(), vec![2.5]);
}

#[test]
fn number_of_xi_depends_on_location_and_request() {
    let module = FieldModule::new();
    let mut ctx = module.create_evaluation_context();
    ctx.set_derivatives_requested(true);
    assert_eq!(ctx.number_of_xi(), 0);
    ctx.set_element_location(ElementId(1), &[0.1, 0.2, 0.3]);
    assert_eq!(ctx.number_of_xi(), 3);
    ctx.set_node(NodeId(1));
    assert_eq!(ctx.number_of_xi(), 0);
    ctx.set_element_location(ElementId(1), &[0.1, 0.2]);
    ctx.set_derivatives_requested(false);
    assert_eq!(ctx.number_of_xi(), 0);
}

#[test]
fn context_of_other_module_is_rejected() {
    let mut module = FieldModule::new();
    let other = FieldModule::new();
    let constant = module.create_constant(&[1.0]).unwrap();
    let mut ctx = other.create_evaluation_context();
    assert_eq!(
        module.evaluate_real(&mut ctx, constant),
        Err(EvaluationError::ForeignContext)
    );
}

#[test]
fn changed_definitions_invalidate_caches() {
    let mut module = FieldModule::new();
    let constant = module.create_constant(&[1.0, 2.0]).unwrap();
    let sum = module.create_sum_components(constant).unwrap();
    let mut ctx = module.create_evaluation_context();
    assert_eq!(module.evaluate_real(&mut ctx, sum).unwrap(), vec![3.0]);

    let generation = ctx.generation();
    module.assign_real(&mut ctx, constant, &[5.0, 7.0]).unwrap();
    assert_eq!(module.evaluate_real(&mut ctx, sum).unwrap(), vec![12.0]);
    assert_eq!(ctx.generation(), generation + 1);

    // Several changes cost a single generation
    module.begin_change();
    module.assign_real(&mut ctx, constant, &[1.0, 1.0]).unwrap();
    module.assign_real(&mut ctx, constant, &[2.0, 2.0]).unwrap();
    module.end_change();
    assert_eq!(module.evaluate_real(&mut ctx, sum).unwrap(), vec![4.0]);
    assert_eq!(ctx.generation(), generation + 2);
}

#[test]
fn caches_are_hidden_until_definition_changes_are_evaluated() {
    let mut module = FieldModule::new();
    let field = module.create_finite_element(1).unwrap();
    module.set_node_parameters(field, NodeId(1), &[1.0]).unwrap();
    let mut ctx = module.create_evaluation_context();
    ctx.set_node(NodeId(1));
    module.evaluate_real(&mut ctx, field).unwrap();
    assert_eq!(module.cache(&ctx, field).unwrap().values(), &[1.0]);
    let generation = ctx.generation();

    module.set_node_parameters(field, NodeId(1), &[5.0]).unwrap();
    // The context itself only catches up on the next evaluation
    assert_eq!(ctx.generation(), generation);
    assert!(module.cache(&ctx, field).is_none());

    assert_eq!(module.evaluate_real(&mut ctx, field).unwrap(), vec![5.0]);
    let cache = module.cache(&ctx, field).unwrap();
    assert_eq!(cache.values(), &[5.0]);
    assert!(cache.is_valid(ctx.generation()));

    let other = FieldModule::new();
    assert!(other.cache(&ctx, field).is_none());
}

#[test]
fn caches_of_destroyed_fields_are_dropped() {
    let mut module = FieldModule::new();
    let constant = module.create_constant(&[1.0]).unwrap();
    let temporary = module.create_sqrt(constant).unwrap();
    let mut ctx = module.create_evaluation_context();
    module.evaluate_real(&mut ctx, temporary).unwrap();
    assert!(module.cache(&ctx, temporary).is_some());

    module.release(temporary).unwrap();
    assert!(!module.contains(temporary));
    module.evaluate_real(&mut ctx, constant).unwrap();
    assert!(module.cache(&ctx, temporary).is_none());
    assert_eq!(
        module.evaluate_real(&mut ctx, temporary),
        Err(EvaluationError::UnknownField(temporary))
    );
}

#[test]
fn failures_propagate_to_dependents() {
    let mut module = FieldModule::new();
    let xi = module.create_xi_coordinates().unwrap();
    let one = module.create_constant(&[1.0]).unwrap();
    let shifted = module.create_add(xi, one).unwrap();
    let mut ctx = module.create_evaluation_context();

    ctx.set_node(NodeId(1));
    assert_eq!(
        module.evaluate_real(&mut ctx, shifted),
        Err(EvaluationError::UnsupportedLocation(xi))
    );
    assert!(matches!(
        module.cache(&ctx, shifted).unwrap().state(),
        CacheState::Failed(_, EvaluationError::UnsupportedLocation(_))
    ));

    ctx.set_element_location(ElementId(1), &[0.5]);
    assert_eq!(module.evaluate_real(&mut ctx, shifted).unwrap(), vec![1.5, 1.0, 1.0]);
}
