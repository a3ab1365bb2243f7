use safeguard::world_model::{
    EdgeAttrs, NodeAttrs, TRANSITION_RELATION, WorldModel, WorldModelErrorKind,
};

fn model_with_money() -> WorldModel {
    let mut model = WorldModel::new("shopping_site").expect("initial state should register");
    model
        .set_variability(&["money".to_string()], &["between 100 and 200".to_string()])
        .expect("variability should be set");
    model
}

#[test]
fn given_identical_node_and_edge_when_added_twice_then_graph_is_unchanged() {
    let mut model = model_with_money();
    model
        .add_node("cart", NodeAttrs::State)
        .expect("state should register");
    model
        .add_edge(
            "shopping_site",
            TRANSITION_RELATION,
            "cart",
            EdgeAttrs::transition("click"),
        )
        .expect("transition should register");
    model
        .add_edge("cart", "spends", "money", EdgeAttrs::default())
        .expect("relation should register");
    let nodes = model.graph().node_count();
    let edges = model.graph().edge_count();

    model
        .add_node("cart", NodeAttrs::State)
        .expect("re-adding the same state is a no-op");
    model
        .add_edge(
            "shopping_site",
            TRANSITION_RELATION,
            "cart",
            EdgeAttrs::transition("click"),
        )
        .expect("re-adding the same transition is a no-op");
    model
        .add_edge("cart", "spends", "money", EdgeAttrs::default())
        .expect("re-adding the same relation is a no-op");

    assert_eq!(model.graph().node_count(), nodes);
    assert_eq!(model.graph().edge_count(), edges);
}

#[test]
fn given_state_node_when_re_registered_as_core_variable_then_graph_inconsistency() {
    let mut model = model_with_money();

    let err = model
        .add_node("shopping_site", NodeAttrs::core_variable(""))
        .expect_err("changing a node's kind must fail");
    assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);

    let err = model
        .add_node("money", NodeAttrs::State)
        .expect_err("a core variable cannot become a state");
    assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);
}

#[test]
fn given_unregistered_endpoint_when_edge_added_then_graph_inconsistency() {
    let mut model = model_with_money();

    let err = model
        .add_edge(
            "shopping_site",
            TRANSITION_RELATION,
            "nowhere",
            EdgeAttrs::transition("goto"),
        )
        .expect_err("unknown object must fail");
    assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);

    let err = model
        .add_edge("shopping_site", "leaks", "credit_card", EdgeAttrs::default())
        .expect_err("unknown core variable must fail");
    assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);
}

#[test]
fn given_core_variable_when_used_as_edge_subject_then_graph_inconsistency() {
    let mut model = model_with_money();

    let err = model
        .add_edge("money", "affects", "money", EdgeAttrs::default())
        .expect_err("core variables are terminal");
    assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);
}

#[test]
fn given_misshapen_edges_when_added_then_each_is_rejected() {
    let mut model = model_with_money();
    model
        .add_node("cart", NodeAttrs::State)
        .expect("state should register");

    let to_core = model.add_edge(
        "shopping_site",
        TRANSITION_RELATION,
        "money",
        EdgeAttrs::transition("click"),
    );
    let without_action = model.add_edge(
        "shopping_site",
        TRANSITION_RELATION,
        "cart",
        EdgeAttrs::default(),
    );
    let relation_to_state = model.add_edge("shopping_site", "spends", "cart", EdgeAttrs::default());

    for result in [to_core, without_action, relation_to_state] {
        let err = result.expect_err("misshapen edge must be rejected");
        assert_eq!(err.kind, WorldModelErrorKind::GraphInconsistency);
    }
    assert_eq!(model.graph().edge_count(), 0);
}
