use std::future::Future;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{error, info};
use uuid::Uuid;

use followgraph_common::{FollowGraphError, RunMode};

use crate::store::GraphStore;

/// Advisory lock keeping ingestion, scoring and pruning from overlapping.
#[derive(Debug, Clone)]
pub struct RunLock {
    pub owner: Uuid,
    pub mode: RunMode,
    /// Locks older than this are assumed to belong to a killed process.
    pub stale_after: Duration,
}

impl RunLock {
    pub fn new(mode: RunMode, stale_after: Duration) -> Self {
        Self {
            owner: Uuid::new_v4(),
            mode,
            stale_after,
        }
    }
}

/// Run `pass` while holding the run lock. The lock is always released,
/// whether `pass` succeeds or fails.
pub async fn run_exclusive<S, T, F>(store: &S, lock: RunLock, pass: F) -> Result<T>
where
    S: GraphStore + ?Sized,
    F: Future<Output = Result<T>>,
{
    if !store
        .try_acquire_run_lock(&lock)
        .await
        .context("Failed to check run lock")?
    {
        return Err(FollowGraphError::RunLockConflict(lock.mode).into());
    }
    info!(mode = %lock.mode, owner = %lock.owner, "Run lock acquired");

    let result = pass.await;

    if let Err(e) = store.release_run_lock(&lock).await {
        error!(mode = %lock.mode, "Failed to release run lock: {e}");
    }

    result
}
