//! Cooperative cancellation for in-flight send jobs.
//!
//! A token is a once-settable flag polled by the dispatcher at batch
//! boundaries only; an in-flight batch always runs to completion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared map of job id -> token so an HTTP caller can stop a job that a
/// concurrent request is driving.
#[derive(Clone, Default)]
pub struct CancelRegistry(Arc<RwLock<HashMap<String, CancelToken>>>);

impl CancelRegistry {
    pub async fn register(&self, job_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.0.write().await.insert(job_id.to_string(), token.clone());
        token
    }

    /// Set the token for a job. Returns false when no such job is in flight.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.0.read().await.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, job_id: &str) {
        self.0.write().await.remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_flips_registered_token_only() {
        let reg = CancelRegistry::default();
        let token = reg.register("job-1").await;
        assert!(!token.is_canceled());
        assert!(!reg.cancel("job-2").await);
        assert!(reg.cancel("job-1").await);
        assert!(token.is_canceled());
        reg.remove("job-1").await;
        assert!(!reg.cancel("job-1").await);
    }
}
