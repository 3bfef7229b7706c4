//! Send-job persistence and the write-once history log.
//!
//! Jobs back resume-after-reload in the UI; history entries are the durable
//! audit trail. Both are bookkeeping: callers log and swallow failures here
//! rather than letting them change the reported send outcome.

use crate::db::now_epoch;
use crate::models::history::HistoryEntry;
use crate::models::job::{JobStatus, ResultStatus, SendJob, SendResult};
use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Most recent jobs returned to the UI for resume-after-reload.
const JOB_LIST_LIMIT: i64 = 20;

pub async fn create_job(
    pool: &SqlitePool,
    owner_id: &str,
    identity_id: &str,
    subject: &str,
    body_template: &str,
    total: usize,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_epoch();
    sqlx::query(
        "INSERT INTO send_jobs (id, owner_id, identity_id, subject, body_template,
                                status, total, processed, success_count, failed_count,
                                created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(identity_id)
    .bind(subject)
    .bind(body_template)
    .bind(JobStatus::Running)
    .bind(total as i64)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Append one batch worth of results and bump the counters in a single
/// transaction. Result rows keep their dispatch order via `position`.
pub async fn append_batch_results(
    pool: &SqlitePool,
    job_id: &str,
    results: &[SendResult],
) -> Result<()> {
    if results.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;

    let (processed,): (i64,) = sqlx::query_as("SELECT processed FROM send_jobs WHERE id = ?")
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

    for (i, r) in results.iter().enumerate() {
        sqlx::query(
            "INSERT INTO send_job_results (job_id, position, email, status, message_id, error)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(job_id)
        .bind(processed + i as i64)
        .bind(&r.email)
        .bind(r.status)
        .bind(r.message_id.as_deref())
        .bind(r.error.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count() as i64;
    let failed = results.len() as i64 - succeeded;
    sqlx::query(
        "UPDATE send_jobs
         SET processed = processed + ?, success_count = success_count + ?,
             failed_count = failed_count + ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(results.len() as i64)
    .bind(succeeded)
    .bind(failed)
    .bind(now_epoch())
    .bind(job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn finalize(pool: &SqlitePool, job_id: &str, status: JobStatus) -> Result<()> {
    sqlx::query("UPDATE send_jobs SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now_epoch())
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn job_owner(pool: &SqlitePool, job_id: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT owner_id FROM send_jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(owner,)| owner))
}

pub async fn get_job(pool: &SqlitePool, owner_id: &str, job_id: &str) -> Result<Option<SendJob>> {
    let job: Option<SendJob> =
        sqlx::query_as("SELECT * FROM send_jobs WHERE id = ? AND owner_id = ?")
            .bind(job_id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;
    match job {
        Some(mut job) => {
            job.results = job_results(pool, &job.id).await?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Most recent jobs for the owner, newest first, results attached.
pub async fn list_jobs(pool: &SqlitePool, owner_id: &str) -> Result<Vec<SendJob>> {
    let mut jobs: Vec<SendJob> = sqlx::query_as(
        "SELECT * FROM send_jobs WHERE owner_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(owner_id)
    .bind(JOB_LIST_LIMIT)
    .fetch_all(pool)
    .await?;
    for job in &mut jobs {
        job.results = job_results(pool, &job.id).await?;
    }
    Ok(jobs)
}

async fn job_results(pool: &SqlitePool, job_id: &str) -> Result<Vec<SendResult>> {
    let rows: Vec<(String, ResultStatus, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT email, status, message_id, error FROM send_job_results
         WHERE job_id = ? ORDER BY position",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(email, status, message_id, error)| SendResult {
            email,
            status,
            message_id,
            error,
        })
        .collect())
}

/// Write the immutable aggregate record for one send invocation.
pub async fn record_history(
    pool: &SqlitePool,
    owner_id: &str,
    results: &[SendResult],
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let succeeded = results.iter().filter(|r| r.is_success()).count() as i64;
    let failed = results.len() as i64 - succeeded;
    sqlx::query(
        "INSERT INTO send_history (id, owner_id, timestamp, total, success_count, failed_count, results)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(now_epoch())
    .bind(results.len() as i64)
    .bind(succeeded)
    .bind(failed)
    .bind(serde_json::to_string(results)?)
    .execute(pool)
    .await?;
    Ok(id)
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryEntry>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// History entries for one local calendar day, newest first, paginated.
///
/// `tz_offset_min` follows the JS `getTimezoneOffset` convention: minutes
/// behind UTC (UTC+7 is -420), so the caller's day boundaries line up with
/// its locale. `date` is yyyy-mm-dd in that locale, defaulting to today.
pub async fn list_history(
    pool: &SqlitePool,
    owner_id: &str,
    date: Option<chrono::NaiveDate>,
    tz_offset_min: i32,
    page: i64,
    page_size: i64,
) -> Result<HistoryPage> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);

    let offset_secs = i64::from(tz_offset_min) * 60;
    let date = date.unwrap_or_else(|| {
        (chrono::Utc::now() - chrono::Duration::seconds(offset_secs))
            .date_naive()
    });
    // Local midnight expressed in UTC seconds
    let day_start = date
        .and_hms_opt(0, 0, 0)
        .expect("00:00:00 is valid")
        .and_utc()
        .timestamp()
        + offset_secs;
    let day_end = day_start + 86_400;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM send_history
         WHERE owner_id = ? AND timestamp >= ? AND timestamp < ?",
    )
    .bind(owner_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(pool)
    .await?;

    let items: Vec<HistoryEntry> = sqlx::query_as(
        "SELECT * FROM send_history
         WHERE owner_id = ? AND timestamp >= ? AND timestamp < ?
         ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(owner_id)
    .bind(day_start)
    .bind(day_end)
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(pool)
    .await?;

    Ok(HistoryPage {
        items,
        total,
        page,
        page_size,
    })
}
