use std::fmt;

use crate::oracle::types::OracleQueryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    /// Transport failure, timeout, or a backend that refused the request.
    Unavailable,
    /// The oracle answered, but the answer breaks the query's contract.
    ContractViolation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleError {
    pub kind: OracleErrorKind,
    pub query: Option<OracleQueryKind>,
    pub message: String,
    pub retryable: bool,
}

impl OracleError {
    pub fn new(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            query: None,
            message: message.into(),
            retryable: matches!(kind, OracleErrorKind::Unavailable),
        }
    }

    pub fn with_query(mut self, query: OracleQueryKind) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query {
            Some(query) => write!(f, "{} (query={})", self.message, query),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for OracleError {}

pub fn oracle_unavailable(message: impl Into<String>) -> OracleError {
    OracleError::new(OracleErrorKind::Unavailable, message)
}

pub fn contract_violation(query: OracleQueryKind, message: impl Into<String>) -> OracleError {
    OracleError::new(OracleErrorKind::ContractViolation, message)
        .with_query(query)
        .with_retryable(false)
}
