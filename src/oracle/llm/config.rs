use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialRef {
    Env { var: String },
    InlineToken { token: String },
    None,
}

impl Default for CredentialRef {
    fn default() -> Self {
        Self::Env {
            var: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// OpenAI-compatible chat-completions backend answering oracle queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmBackendConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub credential: CredentialRef,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            credential: CredentialRef::default(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReliabilityConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl ReliabilityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_max_ms() -> u64 {
    2_000
}
