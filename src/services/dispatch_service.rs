//! Batched, rate-limited, cancelable bulk-send pipeline.
//!
//! One job is one sequential flow: batches run one at a time, the inter-batch
//! delay is an await point, and cancellation is only observed between
//! batches. Per-recipient transport failures are isolated into their own
//! result entries; bookkeeping failures are logged and swallowed so they
//! never change the reported send outcome.

use crate::models::identity::SenderIdentity;
use crate::models::job::{JobStatus, SendResult};
use crate::models::recipient::RecipientFields;
use crate::render::render;
use crate::services::cancel::{CancelRegistry, CancelToken};
use crate::services::{job_service, quota_service};
use crate::smtp::Mailer;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
}

fn default_batch_size() -> usize {
    50
}

fn default_delay_seconds() -> u64 {
    10
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: default_batch_size(),
            delay_seconds: default_delay_seconds(),
        }
    }
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub results: Vec<SendResult>,
    pub trimmed: bool,
    pub status: JobStatus,
}

/// Partition recipients into consecutive chunks. Disabled delay means one
/// chunk with everything; the last chunk may be smaller.
fn batches<'a>(
    recipients: &'a [RecipientFields],
    delay: &DelayConfig,
) -> Vec<&'a [RecipientFields]> {
    let size = if delay.enabled {
        delay.batch_size.max(1)
    } else {
        recipients.len().max(1)
    };
    recipients.chunks(size).collect()
}

/// Drive one send job to completion. The caller has already created the job
/// row and registered `token`; this appends results batch by batch and
/// reports the final aggregate.
pub async fn run(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    identity: &SenderIdentity,
    recipients: &[RecipientFields],
    subject_template: &str,
    body_template: &str,
    delay: &DelayConfig,
    token: &CancelToken,
    job_id: &str,
) -> DispatchOutcome {
    let batches = batches(recipients, delay);
    let batch_count = batches.len();
    let mut results: Vec<SendResult> = Vec::with_capacity(recipients.len());
    let mut trimmed = false;
    let mut canceled = false;
    let mut quota_unavailable = false;

    for (i, batch) in batches.into_iter().enumerate() {
        if token.is_canceled() {
            canceled = true;
            break;
        }

        let reservation =
            match quota_service::check_and_reserve(pool, &identity.id, batch.len()).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(job = %job_id, identity = %identity.id, error = %e,
                          "quota check failed, stopping job");
                    quota_unavailable = true;
                    break;
                }
            };
        if reservation.trimmed {
            trimmed = true;
        }
        if reservation.allowed == 0 {
            break;
        }
        let slice = &batch[..reservation.allowed];

        let mut batch_results = Vec::with_capacity(slice.len());
        for fields in slice {
            let Some(to) = fields.address().map(str::to_string) else {
                batch_results.push(SendResult::error(
                    String::new(),
                    "recipient has no email address",
                ));
                continue;
            };
            let subject = render(subject_template, fields);
            let body = render(body_template, fields);
            match mailer.send_mail(identity, &to, &subject, &body).await {
                Ok(message_id) => {
                    if let Err(e) =
                        quota_service::record_sent(pool, &identity.id, 1).await
                    {
                        warn!(identity = %identity.id, error = %e, "quota increment failed");
                    }
                    batch_results.push(SendResult::success(to, message_id));
                }
                Err(e) => {
                    batch_results.push(SendResult::error(to, e.to_string()));
                }
            }
        }

        if let Err(e) = job_service::append_batch_results(pool, job_id, &batch_results).await {
            warn!(job = %job_id, error = %e, "failed to persist batch results");
        }
        results.extend(batch_results);

        if trimmed {
            break;
        }
        if delay.enabled && i + 1 < batch_count {
            tokio::time::sleep(Duration::from_secs(delay.delay_seconds)).await;
        }
    }

    let status = if canceled {
        JobStatus::Canceled
    } else if quota_unavailable && results.is_empty() {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };

    DispatchOutcome {
        results,
        trimmed,
        status,
    }
}

/// Full orchestration for one HTTP-level send: create the job, register a
/// cancellation token, dispatch, finalize, and record the history entry.
pub async fn send_bulk(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    cancels: &CancelRegistry,
    owner_id: &str,
    identity: &SenderIdentity,
    recipients: &[RecipientFields],
    subject_template: &str,
    body_template: &str,
    delay: &DelayConfig,
) -> (String, DispatchOutcome) {
    let job_id = match job_service::create_job(
        pool,
        owner_id,
        &identity.id,
        subject_template,
        body_template,
        recipients.len(),
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            // Job bookkeeping must not block the send itself; fall back to a
            // transient id that simply won't resolve in the job store.
            warn!(owner = %owner_id, error = %e, "failed to create job record");
            uuid::Uuid::new_v4().to_string()
        }
    };

    let token = cancels.register(&job_id).await;
    let outcome = run(
        pool,
        mailer,
        identity,
        recipients,
        subject_template,
        body_template,
        delay,
        &token,
        &job_id,
    )
    .await;
    cancels.remove(&job_id).await;

    if let Err(e) = job_service::finalize(pool, &job_id, outcome.status).await {
        warn!(job = %job_id, error = %e, "failed to finalize job");
    }
    if let Err(e) = job_service::record_history(pool, owner_id, &outcome.results).await {
        warn!(owner = %owner_id, error = %e, "failed to record history entry");
    }

    info!(
        job = %job_id,
        total = outcome.results.len(),
        succeeded = outcome.results.iter().filter(|r| r.is_success()).count(),
        trimmed = outcome.trimmed,
        status = ?outcome.status,
        "bulk send finished"
    );

    (job_id, outcome)
}
