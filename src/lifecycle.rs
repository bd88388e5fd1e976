//! Lifecycle Aggregator
//!
//! Fans close/destroy out to every backend concurrently and folds the
//! outcomes into one result:
//! - no failures  → `Ok(())`
//! - one failure  → that error, unwrapped
//! - several      → `ChunkError::Multiple`, in backend order

use std::sync::Arc;

use futures::future::join_all;

use crate::backend::ChunkStore;
use crate::error::{ChunkError, Result};

/// Lifecycle operation to fan out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Close,
    Destroy,
}

/// Run `op` on every backend concurrently and aggregate the outcomes
pub async fn fan_out(backends: &[Arc<dyn ChunkStore>], op: LifecycleOp) -> Result<()> {
    let outcomes = join_all(backends.iter().map(|backend| async move {
        match op {
            LifecycleOp::Close => backend.close().await,
            LifecycleOp::Destroy => backend.destroy().await,
        }
    }))
    .await;

    let result = aggregate(outcomes);
    if let Err(e) = &result {
        tracing::error!(?op, error = %e, "backend lifecycle failure");
    }
    result
}

/// Fold per-backend outcomes, dropping successes
pub fn aggregate(outcomes: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut errors: Vec<ChunkError> = outcomes.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ChunkError::Multiple(errors)),
    }
}
