use thiserror::Error;

use crate::{
    oracle::{OracleError, OracleErrorKind},
    world_model::{WorldModelError, WorldModelErrorKind},
};

pub type SafetyResult<T> = Result<T, SafetyError>;

/// Outcomes of a safety check that are neither `Safe` nor `Unsafe`.
///
/// None of these commit any session state, so a caller may retry the whole decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("oracle contract violation: {0}")]
    OracleContractViolation(String),
}

impl SafetyError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OracleUnavailable(_))
    }
}

impl From<WorldModelError> for SafetyError {
    fn from(err: WorldModelError) -> Self {
        match err.kind {
            WorldModelErrorKind::ArityMismatch => Self::Configuration(err.message),
            WorldModelErrorKind::GraphInconsistency | WorldModelErrorKind::UnknownNode => {
                Self::GraphInconsistency(err.message)
            }
        }
    }
}

impl From<OracleError> for SafetyError {
    fn from(err: OracleError) -> Self {
        let message = err.to_string();
        match err.kind {
            OracleErrorKind::Unavailable => Self::OracleUnavailable(message),
            OracleErrorKind::ContractViolation => Self::OracleContractViolation(message),
        }
    }
}
