use std::{path::PathBuf, sync::Arc, time::Duration};

use safeguard::oracle::{
    MemoizedTransport, OracleAnswer, OracleQuery, OracleQueryKind, OracleTransport,
    testing::ScriptedOracle,
};

fn variability_query(core_variable: &str) -> OracleQuery {
    OracleQuery::CoreVariableVariability {
        core_variable: core_variable.to_string(),
        task: "buy a meat substitute".to_string(),
    }
}

fn money_oracle() -> ScriptedOracle {
    ScriptedOracle::new().with_variability(|variable| match variable {
        "money" => "between 100 and 200".to_string(),
        _ => String::new(),
    })
}

fn temp_store_dir() -> PathBuf {
    std::env::temp_dir().join(format!("safeguard-memo-{}", uuid::Uuid::now_v7()))
}

#[tokio::test]
async fn given_repeated_query_when_answered_then_upstream_is_called_once() {
    let scripted = money_oracle();
    let memo = MemoizedTransport::new(Arc::new(scripted.clone()));

    let first = memo
        .answer(variability_query("money"))
        .await
        .expect("first answer");
    let second = memo
        .answer(variability_query("money"))
        .await
        .expect("memoized answer");

    assert_eq!(first, second);
    assert_eq!(scripted.total_calls(), 1);
    assert_eq!(memo.memoized_len(), 1);
}

#[tokio::test]
async fn given_distinct_queries_when_answered_then_each_reaches_upstream() {
    let scripted = money_oracle();
    let memo = MemoizedTransport::new(Arc::new(scripted.clone()));

    memo.answer(variability_query("money"))
        .await
        .expect("money answer");
    let filesystem = memo
        .answer(variability_query("filesystem"))
        .await
        .expect("filesystem answer");

    assert_eq!(
        filesystem,
        OracleAnswer::Variability {
            variability: String::new()
        }
    );
    assert_eq!(scripted.total_calls(), 2);
}

#[tokio::test]
async fn given_concurrent_identical_queries_when_answered_then_they_share_one_upstream_call() {
    let scripted = money_oracle().with_latency(Duration::from_millis(30));
    let memo = MemoizedTransport::new(Arc::new(scripted.clone()));

    let (first, second) = tokio::join!(
        memo.answer(variability_query("money")),
        memo.answer(variability_query("money")),
    );

    assert_eq!(first.expect("first caller"), second.expect("second caller"));
    assert_eq!(scripted.total_calls(), 1);
}

#[tokio::test]
async fn given_upstream_failure_when_retried_after_recovery_then_failure_was_not_memoized() {
    let scripted = money_oracle();
    scripted.fail(OracleQueryKind::CoreVariableVariability);
    let memo = MemoizedTransport::new(Arc::new(scripted.clone()));

    memo.answer(variability_query("money"))
        .await
        .expect_err("outage should surface");
    assert_eq!(memo.memoized_len(), 0);

    scripted.recover(OracleQueryKind::CoreVariableVariability);
    let answer = memo
        .answer(variability_query("money"))
        .await
        .expect("answer after recovery");

    assert_eq!(
        answer,
        OracleAnswer::Variability {
            variability: "between 100 and 200".to_string()
        }
    );
    assert_eq!(scripted.total_calls(), 2);
}

#[tokio::test]
async fn given_store_dir_when_new_instance_answers_then_stored_answer_is_reused() {
    let dir = temp_store_dir();

    let first_upstream = money_oracle();
    let first = MemoizedTransport::new(Arc::new(first_upstream.clone())).with_store_dir(&dir);
    let stored = first
        .answer(variability_query("money"))
        .await
        .expect("first run answer");

    let second_upstream = ScriptedOracle::new();
    let second = MemoizedTransport::new(Arc::new(second_upstream.clone())).with_store_dir(&dir);
    let reloaded = second
        .answer(variability_query("money"))
        .await
        .expect("reloaded answer");

    assert_eq!(stored, reloaded);
    assert_eq!(first_upstream.total_calls(), 1);
    assert_eq!(second_upstream.total_calls(), 0);

    let _ = std::fs::remove_dir_all(&dir);
}
