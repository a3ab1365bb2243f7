use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::oracle::{
    error::{OracleError, oracle_unavailable},
    ports::OracleTransport,
    single_flight::SingleFlight,
    types::{OracleAnswer, OracleQuery},
};

/// Process-wide answer memo around another transport.
///
/// Queries are keyed by the SHA-256 of their JSON form. Identical queries in flight at the same
/// time share one upstream call. Errors are never stored. With a store directory, answers are
/// also written as `<digest>.json` and reloaded on a later run.
pub struct MemoizedTransport {
    inner: Arc<dyn OracleTransport>,
    answers: RwLock<HashMap<String, OracleAnswer>>,
    flights: SingleFlight<String, Result<OracleAnswer, OracleError>>,
    store_dir: Option<PathBuf>,
}

impl MemoizedTransport {
    pub fn new(inner: Arc<dyn OracleTransport>) -> Self {
        Self {
            inner,
            answers: RwLock::new(HashMap::new()),
            flights: SingleFlight::new(),
            store_dir: None,
        }
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    pub fn memoized_len(&self) -> usize {
        self.answers
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    fn lookup(&self, digest: &str) -> Option<OracleAnswer> {
        self.answers
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .get(digest)
            .cloned()
    }

    fn remember(&self, digest: String, answer: OracleAnswer) {
        self.answers
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .insert(digest, answer);
    }
}

#[async_trait]
impl OracleTransport for MemoizedTransport {
    async fn answer(&self, query: OracleQuery) -> Result<OracleAnswer, OracleError> {
        let digest = query_digest(&query)?;
        if let Some(answer) = self.lookup(&digest) {
            tracing::trace!(target: "oracle.memo", query = %query.kind(), "memo_hit");
            return Ok(answer);
        }

        if let Some(dir) = &self.store_dir
            && let Some(answer) = load_stored(dir, &digest).await
        {
            tracing::trace!(target: "oracle.memo", query = %query.kind(), "memo_store_hit");
            self.remember(digest, answer.clone());
            return Ok(answer);
        }

        let inner = Arc::clone(&self.inner);
        let result = self
            .flights
            .run(digest.clone(), move || async move { inner.answer(query).await })
            .await;

        if let Ok(answer) = &result {
            if let Some(dir) = &self.store_dir
                && let Err(err) = save_stored(dir, &digest, answer).await
            {
                tracing::warn!(
                    target: "oracle.memo",
                    digest = %digest,
                    error = %err,
                    "memo_store_write_failed"
                );
            }
            self.remember(digest, answer.clone());
        }

        result
    }
}

pub fn query_digest(query: &OracleQuery) -> Result<String, OracleError> {
    let encoded = serde_json::to_vec(query)
        .map_err(|err| oracle_unavailable(format!("failed to encode query: {err}")))?;
    let digest = Sha256::digest(&encoded);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

async fn load_stored(dir: &Path, digest: &str) -> Option<OracleAnswer> {
    let bytes = tokio::fs::read(dir.join(format!("{digest}.json"))).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(answer) => Some(answer),
        Err(err) => {
            tracing::warn!(
                target: "oracle.memo",
                digest = %digest,
                error = %err,
                "memo_store_entry_unreadable"
            );
            None
        }
    }
}

async fn save_stored(dir: &Path, digest: &str, answer: &OracleAnswer) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let bytes = serde_json::to_vec_pretty(answer)?;
    tokio::fs::write(dir.join(format!("{digest}.json")), bytes).await
}
