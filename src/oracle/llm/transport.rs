use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Value, json};

use crate::oracle::{
    error::{OracleError, OracleErrorKind, oracle_unavailable},
    llm::{
        config::{CredentialRef, LlmBackendConfig, ReliabilityConfig},
        output::decode_answer,
        prompts::{Prompt, render},
        reliability::{backoff_delay, can_retry},
    },
    ports::OracleTransport,
    types::{OracleAnswer, OracleQuery, OracleQueryKind},
};

/// Answers oracle queries with one chat-completions request each, asking for a JSON reply that
/// follows the query's schema.
pub struct LlmOracleTransport {
    client: Client,
    url: String,
    backend: LlmBackendConfig,
    reliability: ReliabilityConfig,
}

impl LlmOracleTransport {
    pub fn new(
        backend: LlmBackendConfig,
        reliability: ReliabilityConfig,
    ) -> Result<Self, OracleError> {
        let endpoint = backend
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .ok_or_else(|| {
                oracle_unavailable("openai-compatible oracle backend requires endpoint")
                    .with_retryable(false)
            })?;
        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                oracle_unavailable(format!("failed to build http client: {err}"))
                    .with_retryable(false)
            })?;

        Ok(Self {
            client,
            url,
            backend,
            reliability,
        })
    }

    fn auth_header(&self) -> Result<Option<String>, OracleError> {
        match &self.backend.credential {
            CredentialRef::Env { var } => {
                let token = env::var(var).map_err(|_| {
                    oracle_unavailable(format!(
                        "missing credential environment variable {var} for oracle backend"
                    ))
                    .with_retryable(false)
                })?;
                Ok(Some(format!("Bearer {token}")))
            }
            CredentialRef::InlineToken { token } => {
                if token.trim().is_empty() {
                    return Err(oracle_unavailable("inline credential token cannot be empty")
                        .with_retryable(false));
                }
                Ok(Some(format!("Bearer {token}")))
            }
            CredentialRef::None => Ok(None),
        }
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.backend.model,
            "temperature": self.backend.temperature,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": prompt.schema_name,
                    "strict": true,
                    "schema": prompt.schema,
                }
            },
        })
    }

    async fn send_once(
        &self,
        kind: OracleQueryKind,
        body: &Value,
        auth_header: Option<&str>,
    ) -> Result<OracleAnswer, OracleError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.reliability.request_timeout())
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(auth_header) = auth_header {
            request = request.header(header::AUTHORIZATION, auth_header);
        }

        let response = request.send().await.map_err(|err| {
            let reason = if err.is_timeout() {
                "timed out"
            } else {
                "failed"
            };
            oracle_unavailable(format!("oracle request {reason}: {err}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let payload: Value = response.json().await.map_err(|err| {
            OracleError::new(
                OracleErrorKind::ContractViolation,
                format!("oracle response is not valid JSON: {err}"),
            )
            .with_retryable(false)
        })?;

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OracleError::new(
                    OracleErrorKind::ContractViolation,
                    "oracle response has no message content",
                )
                .with_retryable(false)
            })?;

        decode_answer(kind, content)
    }
}

#[async_trait]
impl OracleTransport for LlmOracleTransport {
    #[tracing::instrument(
        name = "llm_oracle_answer",
        target = "oracle.llm",
        skip_all,
        fields(query = %query.kind(), model = %self.backend.model)
    )]
    async fn answer(&self, query: OracleQuery) -> Result<OracleAnswer, OracleError> {
        let kind = query.kind();
        let auth_header = self.auth_header()?;
        let body = self.request_body(&render(&query));

        let mut attempt = 0u32;
        loop {
            match self.send_once(kind, &body, auth_header.as_deref()).await {
                Ok(answer) => {
                    tracing::debug!(
                        target: "oracle.llm",
                        query = %kind,
                        attempt = attempt,
                        "llm_answer_received"
                    );
                    return Ok(answer);
                }
                Err(err) if can_retry(&self.reliability, &err, attempt) => {
                    let delay = backoff_delay(&self.reliability, attempt);
                    tracing::warn!(
                        target: "oracle.llm",
                        query = %kind,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "llm_request_retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.with_query(kind)),
            }
        }
    }
}

/// Maps a non-success HTTP status to an oracle error, keeping a short prefix of the body.
pub fn map_http_error(status: u16, body: &str) -> OracleError {
    let normalized_body = body.chars().take(240).collect::<String>();

    let mut err = match status {
        401 => oracle_unavailable("oracle authentication failed").with_retryable(false),
        403 => oracle_unavailable("oracle authorization failed").with_retryable(false),
        408 | 429 => oracle_unavailable(format!("oracle backend returned status {status}")),
        400..=499 => oracle_unavailable(format!("oracle backend returned status {status}"))
            .with_retryable(false),
        _ => oracle_unavailable(format!("oracle backend returned status {status}")),
    };

    if !normalized_body.is_empty() {
        err.message = format!("{}: {}", err.message, normalized_body);
    }

    err
}
