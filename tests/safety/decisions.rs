use std::sync::Arc;

use safeguard::{
    action_space::{Action, web_action_space},
    oracle::{OracleQueryKind, ReasoningOracle, StateChoice, testing::ScriptedOracle},
    safety::{SafetyError, SafetyModule, UnsafeReason, Verdict},
    world_model::NodeAttrs,
};

use crate::support::{INITIAL_STATE, TASK, analyzed_module, core_variables, module, shopping_oracle};

async fn walk_to_checkout(module: &SafetyModule) {
    for (observation, target) in [
        ("shopping_site", "add_to_cart_button"),
        ("cart", "checkout_button"),
    ] {
        let verdict = module
            .is_action_safe(observation, &Action::new("click", [target]))
            .await
            .expect("shopping step should be decided");
        assert_eq!(verdict, Verdict::Safe);
    }
    assert_eq!(module.effective_state().await, "checkout");
}

#[tokio::test]
async fn given_analysis_when_world_model_inspected_then_core_variables_carry_variability() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let world = module.world_model().await;
    assert_eq!(world.core_variables(), core_variables().as_slice());
    assert_eq!(world.variability("money"), Ok("between 100 and 200"));
    assert_eq!(world.variability("outbound_sensitive_data"), Ok(""));
    assert_eq!(scripted.calls(OracleQueryKind::CoreVariableVariability), 2);
}

#[tokio::test]
async fn given_off_site_url_when_goto_checked_then_unsafe_before_any_state_reasoning() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let verdict = module
        .is_action_safe("shopping_site", &Action::new("goto", ["evil.example.com/phish"]))
        .await
        .expect("decision should succeed");

    assert_eq!(verdict, Verdict::Unsafe(UnsafeReason::ParamOutOfRange));
    assert_eq!(scripted.calls(OracleQueryKind::IsAlwaysSafe), 1);
    assert_eq!(scripted.calls(OracleQueryKind::UsualParamRange), 1);
    assert_eq!(scripted.calls(OracleQueryKind::IsParamWithinRange), 1);
    assert_eq!(scripted.calls(OracleQueryKind::MatchEffectiveState), 0);
    assert_eq!(scripted.calls(OracleQueryKind::ActualVariation), 0);
    assert_eq!(scripted.calls(OracleQueryKind::NextEffectiveState), 0);

    assert_eq!(module.effective_state().await, INITIAL_STATE);
    assert!(module.world_model().await.is_analyzed("goto"));
}

#[tokio::test]
async fn given_known_param_range_when_goto_repeats_with_new_url_then_range_is_not_asked_again() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    for url in ["shopping_site_cart", "shopping_site_deals"] {
        let verdict = module
            .is_action_safe("shopping_site", &Action::new("goto", [url]))
            .await
            .expect("decision should succeed");
        assert!(verdict.is_safe());
    }

    assert_eq!(scripted.calls(OracleQueryKind::IsAlwaysSafe), 1);
    assert_eq!(scripted.calls(OracleQueryKind::UsualParamRange), 1);
    assert_eq!(scripted.calls(OracleQueryKind::IsParamWithinRange), 2);
}

#[tokio::test]
async fn given_action_without_arguments_when_checked_then_param_range_is_skipped() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let verdict = module
        .is_action_safe("shopping_site", &Action::new("go_back", Vec::<String>::new()))
        .await
        .expect("decision should succeed");

    assert!(verdict.is_safe());
    assert_eq!(scripted.calls(OracleQueryKind::UsualParamRange), 0);
    assert_eq!(scripted.calls(OracleQueryKind::IsParamWithinRange), 0);
}

#[tokio::test]
async fn given_always_safe_hover_when_checked_again_elsewhere_then_no_further_oracle_calls() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let first = module
        .is_action_safe("shopping_site", &Action::new("hover", ["product_image_id"]))
        .await
        .expect("first hover");
    let calls_after_first = scripted.total_calls();
    let second = module
        .is_action_safe("some_other_page", &Action::new("hover", ["banner_id"]))
        .await
        .expect("second hover");

    assert_eq!(first, Verdict::Safe);
    assert_eq!(second, Verdict::Safe);
    assert_eq!(scripted.calls(OracleQueryKind::IsAlwaysSafe), 1);
    assert_eq!(scripted.total_calls(), calls_after_first);
    assert_eq!(module.effective_state().await, INITIAL_STATE);
    assert!(module.world_model().await.is_always_safe("hover"));
}

#[tokio::test]
async fn given_safe_decision_when_same_state_and_action_repeat_then_answered_from_cache() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;
    let action = Action::new("click", ["add_to_cart_button"]);

    module
        .is_action_safe("shopping_site", &action)
        .await
        .expect("first decision");
    assert_eq!(module.effective_state().await, "cart");
    let calls_after_first = scripted.total_calls();

    let verdict = module
        .is_action_safe("shopping_site", &action)
        .await
        .expect("cached decision");

    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(scripted.total_calls(), calls_after_first);
    assert_eq!(module.effective_state().await, INITIAL_STATE);
}

#[tokio::test]
async fn given_transition_when_decided_then_world_model_grows_by_state_and_relation() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    walk_to_checkout(&module).await;

    let world = module.world_model().await;
    assert_eq!(world.node("cart"), Some(&NodeAttrs::State));
    assert_eq!(world.node("checkout"), Some(&NodeAttrs::State));
    let paths = world.paths_to_core_variables("shopping_site");
    assert_eq!(
        paths,
        vec![vec![
            "shopping_site".to_string(),
            "cart".to_string(),
            "checkout".to_string(),
            "money".to_string(),
        ]]
    );
    assert_eq!(scripted.calls(OracleQueryKind::StateAffectsCoreVariables), 2);
}

#[tokio::test]
async fn given_spending_beyond_budget_when_checked_then_core_variable_violated() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;
    walk_to_checkout(&module).await;

    let verdict = module
        .is_action_safe("checkout", &Action::new("click", ["place_order_button"]))
        .await
        .expect("decision should succeed");

    assert_eq!(
        verdict,
        Verdict::Unsafe(UnsafeReason::CoreVariableViolated {
            core_variable: "money".to_string()
        })
    );
    assert_eq!(scripted.calls(OracleQueryKind::ActualVariation), 1);
    assert_eq!(scripted.calls(OracleQueryKind::IsVariationBeyondBounds), 1);
}

#[tokio::test]
async fn given_violation_when_same_action_repeats_then_it_is_reasoned_again() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;
    walk_to_checkout(&module).await;
    let action = Action::new("click", ["place_order_button"]);

    module
        .is_action_safe("checkout", &action)
        .await
        .expect("first decision");
    let matches_before = scripted.calls(OracleQueryKind::MatchEffectiveState);
    let verdict = module
        .is_action_safe("checkout", &action)
        .await
        .expect("second decision");

    assert!(!verdict.is_safe());
    assert_eq!(scripted.calls(OracleQueryKind::ActualVariation), 2);
    assert_eq!(
        scripted.calls(OracleQueryKind::MatchEffectiveState),
        matches_before
    );
    assert_eq!(
        module
            .world_model()
            .await
            .query_cache("checkout", &action.signature()),
        None
    );
}

#[tokio::test]
async fn given_spending_within_budget_when_checked_then_safe_and_state_advances() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;
    walk_to_checkout(&module).await;

    let verdict = module
        .is_action_safe("checkout", &Action::new("click", ["buy_cheap_button"]))
        .await
        .expect("decision should succeed");

    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(scripted.calls(OracleQueryKind::IsVariationBeyondBounds), 1);
    assert_eq!(module.effective_state().await, "after_click");
}

#[tokio::test]
async fn given_no_analysis_when_checking_action_then_configuration_error_without_oracle_calls() {
    let scripted = shopping_oracle();
    let module = module(&scripted);

    let err = module
        .is_action_safe("shopping_site", &Action::new("click", ["add_to_cart_button"]))
        .await
        .expect_err("analysis is required first");

    assert!(
        matches!(&err, SafetyError::Configuration(message) if message.contains("analyze_core_variability"))
    );
    assert_eq!(scripted.total_calls(), 0);
}

#[tokio::test]
async fn given_action_outside_action_space_when_checked_then_configuration_error() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let err = module
        .is_action_safe("shopping_site", &Action::new("launch_missiles", ["now"]))
        .await
        .expect_err("unknown action must be rejected");

    assert!(matches!(err, SafetyError::Configuration(_)));
}

#[tokio::test]
async fn given_blank_core_variable_when_analyzing_then_configuration_error() {
    let scripted = shopping_oracle();
    let module = module(&scripted);

    let err = module
        .analyze_core_variability(vec!["money".to_string(), " ".to_string()], TASK)
        .await
        .expect_err("blank names must be rejected");

    assert!(matches!(err, SafetyError::Configuration(_)));
    assert_eq!(scripted.total_calls(), 0);
}

#[test]
fn given_blank_initial_state_when_building_module_then_configuration_error() {
    let scripted = ScriptedOracle::new();
    let err = match SafetyModule::new(
        "  ",
        Arc::new(web_action_space()),
        ReasoningOracle::new(Arc::new(scripted)),
    ) {
        Ok(_) => panic!("blank initial state should fail"),
        Err(err) => err,
    };

    assert!(matches!(err, SafetyError::Configuration(_)));
}

#[tokio::test]
async fn given_new_state_named_like_core_variable_when_advancing_then_graph_inconsistency() {
    let scripted =
        shopping_oracle().with_next_state(|_, _, _| StateChoice::new_state("money"));
    let module = analyzed_module(&scripted).await;

    let err = module
        .is_action_safe("shopping_site", &Action::new("click", ["add_to_cart_button"]))
        .await
        .expect_err("collision must be rejected");

    assert!(matches!(err, SafetyError::GraphInconsistency(_)));
    assert!(!err.is_retryable());
    assert_eq!(module.effective_state().await, INITIAL_STATE);
    assert!(!module.world_model().await.is_analyzed("click"));
}

#[tokio::test]
async fn given_blank_state_from_oracle_when_resolving_then_contract_violation() {
    let scripted = shopping_oracle().with_match_state(|_, _| StateChoice::new_state(""));
    let module = analyzed_module(&scripted).await;

    let err = module
        .is_action_safe("shopping_site", &Action::new("click", ["add_to_cart_button"]))
        .await
        .expect_err("blank state must be rejected");

    assert!(matches!(err, SafetyError::OracleContractViolation(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn given_observations_when_resolving_effective_state_then_matches_are_cached() {
    let scripted = shopping_oracle();
    let module = analyzed_module(&scripted).await;

    let first = module
        .resolve_effective_state("shopping_site")
        .await
        .expect("first resolution");
    let again = module
        .resolve_effective_state("shopping_site")
        .await
        .expect("cached resolution");
    assert_eq!(first, INITIAL_STATE);
    assert_eq!(again, INITIAL_STATE);
    assert_eq!(scripted.calls(OracleQueryKind::MatchEffectiveState), 1);

    let product = module
        .resolve_effective_state("product_page")
        .await
        .expect("new state resolution");
    assert_eq!(product, "product_page");
    assert_eq!(module.effective_state().await, "product_page");
    assert_eq!(
        module.world_model().await.node("product_page"),
        Some(&NodeAttrs::State)
    );
}

#[tokio::test]
async fn given_no_analysis_when_resolving_effective_state_then_configuration_error() {
    let scripted = shopping_oracle();
    let module = module(&scripted);

    let err = module
        .resolve_effective_state("shopping_site")
        .await
        .expect_err("analysis is required first");

    assert!(matches!(err, SafetyError::Configuration(_)));
}
