//! Daily quota reset scheduler.
//!
//! One instance is started at process boot and owns its background task:
//! catch up a reset missed during downtime, then fire at every local
//! midnight. A failed reset is logged and retried at the next tick.

use crate::db::now_epoch;
use crate::services::quota_service;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct QuotaScheduler {
    handle: JoinHandle<()>,
}

impl QuotaScheduler {
    pub fn start(pool: SqlitePool) -> Self {
        let handle = tokio::spawn(async move {
            match quota_service::reset_if_stale(&pool).await {
                Ok(0) => {}
                Ok(n) => info!(identities = n, "startup quota catch-up reset"),
                Err(e) => warn!(error = %e, "startup quota catch-up failed"),
            }
            loop {
                let wait = until_next_local_midnight();
                info!(minutes = wait.as_secs() / 60, "next quota reset scheduled");
                tokio::time::sleep(wait).await;
                match quota_service::reset_all(&pool).await {
                    Ok(n) => info!(identities = n, "daily quota reset"),
                    Err(e) => warn!(error = %e, "quota reset failed, retrying next tick"),
                }
            }
        });
        Self { handle }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for QuotaScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn until_next_local_midnight() -> Duration {
    let secs = (quota_service::next_local_midnight() - now_epoch()).max(1);
    Duration::from_secs(secs as u64)
}
