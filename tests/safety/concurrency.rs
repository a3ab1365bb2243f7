use std::time::Duration;

use safeguard::{
    action_space::Action,
    oracle::OracleQueryKind,
    safety::{SafetyError, Verdict},
};

use crate::support::{INITIAL_STATE, analyzed_module, shopping_oracle};

#[tokio::test]
async fn given_identical_concurrent_checks_when_decided_then_one_oracle_call_per_query() {
    let scripted = shopping_oracle().with_latency(Duration::from_millis(20));
    let module = analyzed_module(&scripted).await;
    let action = Action::new("click", ["add_to_cart_button"]);

    let (first, second) = tokio::join!(
        module.is_action_safe("shopping_site", &action),
        module.is_action_safe("shopping_site", &action),
    );

    assert_eq!(first.expect("first caller"), Verdict::Safe);
    assert_eq!(second.expect("second caller"), Verdict::Safe);
    for kind in [
        OracleQueryKind::IsAlwaysSafe,
        OracleQueryKind::UsualParamRange,
        OracleQueryKind::MatchEffectiveState,
        OracleQueryKind::NextEffectiveState,
        OracleQueryKind::StateAffectsCoreVariables,
    ] {
        assert_eq!(scripted.calls(kind), 1, "{kind}");
    }
    assert_eq!(module.effective_state().await, "cart");
}

#[tokio::test]
async fn given_distinct_checks_from_spawned_tasks_when_decided_then_they_serialize_on_one_world() {
    let scripted = shopping_oracle().with_latency(Duration::from_millis(5));
    let module = analyzed_module(&scripted).await;

    let handles = ["add_to_cart_button", "product_link"].map(|target| {
        let module = module.clone();
        tokio::spawn(async move {
            module
                .is_action_safe("shopping_site", &Action::new("click", [target]))
                .await
        })
    });
    for handle in handles {
        let verdict = handle
            .await
            .expect("task should not panic")
            .expect("decision should succeed");
        assert_eq!(verdict, Verdict::Safe);
    }

    assert_eq!(scripted.calls(OracleQueryKind::IsAlwaysSafe), 1);
    assert_eq!(scripted.calls(OracleQueryKind::UsualParamRange), 1);
    assert_eq!(scripted.calls(OracleQueryKind::MatchEffectiveState), 1);

    let world = module.world_model().await;
    assert_eq!(world.caches().action_safety_len(), 2);
}

#[tokio::test]
async fn given_oracle_outage_when_deciding_then_session_is_untouched_until_retry_succeeds() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;
    let nodes_before = module.world_model().await.graph().node_count();
    let action = Action::new("click", ["add_to_cart_button"]);

    scripted.fail(OracleQueryKind::NextEffectiveState);
    let err = module
        .is_action_safe("shopping_site", &action)
        .await
        .expect_err("outage should abort the decision");

    assert!(matches!(err, SafetyError::OracleUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(module.effective_state().await, INITIAL_STATE);
    let world = module.world_model().await;
    assert!(!world.is_analyzed("click"));
    assert_eq!(world.caches().effective_state_len(), 0);
    assert_eq!(world.graph().node_count(), nodes_before);

    scripted.recover(OracleQueryKind::NextEffectiveState);
    let verdict = module
        .is_action_safe("shopping_site", &action)
        .await
        .expect("retry should succeed");

    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(scripted.calls(OracleQueryKind::IsAlwaysSafe), 2);
    assert_eq!(module.effective_state().await, "cart");
}

#[tokio::test]
async fn given_abandoned_check_when_caller_times_out_then_nothing_is_committed_and_lock_is_free() {
    let scripted = shopping_oracle().with_latency(Duration::from_millis(50));
    let module = analyzed_module(&scripted).await;
    let action = Action::new("click", ["add_to_cart_button"]);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        module.is_action_safe("shopping_site", &action),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(module.effective_state().await, INITIAL_STATE);
    assert!(!module.world_model().await.is_analyzed("click"));

    let verdict = module
        .is_action_safe("shopping_site", &action)
        .await
        .expect("a fresh check should run to completion");
    assert_eq!(verdict, Verdict::Safe);
}
