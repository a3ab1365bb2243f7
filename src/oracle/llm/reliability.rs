use std::time::Duration;

use crate::oracle::{error::OracleError, llm::config::ReliabilityConfig};

/// Exponential delay before retry `attempt` (0-based), capped and lightly jittered.
pub fn backoff_delay(config: &ReliabilityConfig, attempt: u32) -> Duration {
    let base = config.backoff_base_ms.max(1) as f64;
    let max = config.backoff_max_ms.max(1) as f64;
    let exp = attempt.min(30) as i32;
    let without_jitter = (base * 2f64.powi(exp)).min(max);
    let jitter_factor = 0.9 + (attempt as f64 % 3.0) * 0.05;
    Duration::from_millis((without_jitter * jitter_factor) as u64)
}

pub fn can_retry(config: &ReliabilityConfig, err: &OracleError, attempt: u32) -> bool {
    err.retryable && attempt < config.max_retries
}
