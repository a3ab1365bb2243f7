use std::sync::{Arc, Mutex};

use safeguard::{
    action_space::ActionSchema,
    oracle::{
        OracleErrorKind, OracleQuery, OracleQueryKind, OracleTransport, ReasoningOracle,
        StateResolution,
        llm::{CredentialRef, LlmBackendConfig, LlmOracleTransport, ReliabilityConfig},
    },
};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

struct MockServer {
    endpoint: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Serves one canned response per accepted connection, in order.
    async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock server should bind");
        let addr = listener.local_addr().expect("mock server address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                seen.lock().expect("request log lock").push(request);

                let reason = match status {
                    200 => "OK",
                    400 => "Bad Request",
                    429 => "Too Many Requests",
                    _ => "Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            endpoint: format!("http://{addr}/v1"),
            requests,
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log lock").clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);

        if let Some(header_end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn completion(content: serde_json::Value) -> (u16, String) {
    let body = json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content.to_string()},
            "finish_reason": "stop",
        }],
    });
    (200, body.to_string())
}

fn transport(endpoint: &str) -> LlmOracleTransport {
    LlmOracleTransport::new(
        LlmBackendConfig {
            endpoint: Some(endpoint.to_string()),
            model: "test-model".to_string(),
            credential: CredentialRef::InlineToken {
                token: "test-token".to_string(),
            },
            temperature: 0.0,
        },
        ReliabilityConfig {
            request_timeout_ms: 5_000,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        },
    )
    .expect("transport should build")
}

fn hover() -> ActionSchema {
    ActionSchema {
        name: "hover".to_string(),
        argument_names: vec!["element_id".to_string()],
        description: "Hover over an element.".to_string(),
    }
}

#[tokio::test]
async fn given_chat_completion_when_asking_always_safe_then_verdict_is_decoded() {
    let server = MockServer::start(vec![completion(json!({
        "reasoning": "hovering changes nothing",
        "is_always_safe": true,
    }))])
    .await;
    let oracle = ReasoningOracle::new(Arc::new(transport(&server.endpoint)));

    let always_safe = oracle
        .is_always_safe(&hover(), "buy", "shopping_site", &["money".to_string()])
        .await
        .expect("verdict should decode");

    assert!(always_safe);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = requests[0].to_ascii_lowercase();
    assert!(request.starts_with("post /v1/chat/completions"));
    assert!(request.contains("authorization: bearer test-token"));
    assert!(request.contains("\"model\":\"test-model\""));
    assert!(request.contains("\"strict\":true"));
}

#[tokio::test]
async fn given_unmatched_observation_when_llm_names_new_state_then_new_state_is_resolved() {
    let server = MockServer::start(vec![completion(json!({
        "reasoning": "the page is a checkout form",
        "index": -1,
        "new_effective_state": "checkout_page",
    }))])
    .await;
    let oracle = ReasoningOracle::new(Arc::new(transport(&server.endpoint)));

    let resolution = oracle
        .match_effective_state(&["cart".to_string()], "<checkout form>", &[], "buy")
        .await
        .expect("state choice should decode");

    assert_eq!(resolution, StateResolution::New("checkout_page".to_string()));
}

#[tokio::test]
async fn given_rate_limit_then_success_when_answering_then_request_is_retried() {
    let server = MockServer::start(vec![
        (429, r#"{"error":"slow down"}"#.to_string()),
        completion(json!({
            "reasoning": "a cart total may move",
            "variability": "between 100 and 200",
        })),
    ])
    .await;
    let oracle = ReasoningOracle::new(Arc::new(transport(&server.endpoint)));

    let variability = oracle
        .core_variable_variability("money", "buy")
        .await
        .expect("retry should succeed");

    assert_eq!(variability, "between 100 and 200");
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn given_bad_request_when_answering_then_error_is_not_retried() {
    let server = MockServer::start(vec![(400, r#"{"error":"bad schema"}"#.to_string())]).await;
    let transport = transport(&server.endpoint);

    let err = transport
        .answer(OracleQuery::CoreVariableVariability {
            core_variable: "money".to_string(),
            task: "buy".to_string(),
        })
        .await
        .expect_err("400 should fail");

    assert_eq!(err.kind, OracleErrorKind::Unavailable);
    assert!(!err.retryable);
    assert_eq!(err.query, Some(OracleQueryKind::CoreVariableVariability));
    assert!(err.message.contains("bad schema"));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn given_reply_that_is_not_json_when_answering_then_contract_violation() {
    let server = MockServer::start(vec![(
        200,
        json!({"choices": [{"message": {"role": "assistant", "content": "I think it is safe."}}]})
            .to_string(),
    )])
    .await;
    let oracle = ReasoningOracle::new(Arc::new(transport(&server.endpoint)));

    let err = oracle
        .is_always_safe(&hover(), "buy", "shopping_site", &[])
        .await
        .expect_err("prose reply must be rejected");

    assert_eq!(err.kind, OracleErrorKind::ContractViolation);
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn given_no_endpoint_when_building_transport_then_non_retryable_unavailable() {
    let err = match LlmOracleTransport::new(
        LlmBackendConfig::default(),
        ReliabilityConfig::default(),
    ) {
        Ok(_) => panic!("missing endpoint should fail"),
        Err(err) => err,
    };

    assert_eq!(err.kind, OracleErrorKind::Unavailable);
    assert!(!err.retryable);
}
