use async_trait::async_trait;

use crate::oracle::{
    error::OracleError,
    types::{OracleAnswer, OracleQuery},
};

/// Transport to the external reasoning service. Stateless per call.
#[async_trait]
pub trait OracleTransport: Send + Sync {
    async fn answer(&self, query: OracleQuery) -> Result<OracleAnswer, OracleError>;
}
