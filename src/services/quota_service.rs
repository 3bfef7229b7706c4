//! Per-identity daily send quota ledger.
//!
//! `daily_sent` only grows within a calendar day; increments are clamped to
//! `daily_limit` in a single UPDATE so concurrent jobs on the same identity
//! cannot overcount. Resets happen at local midnight (scheduler), on boot
//! when the last reset predates today, or manually per owner.

use crate::db::now_epoch;
use anyhow::Result;
use chrono::{Days, Local, TimeZone};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// How many of the requested sends fit under the remaining quota.
    pub allowed: usize,
    /// True when fewer than requested remain; the caller must not exceed
    /// `allowed` and should surface the trim to the user.
    pub trimmed: bool,
}

pub async fn check_and_reserve(
    pool: &SqlitePool,
    identity_id: &str,
    count: usize,
) -> Result<Reservation> {
    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT daily_limit, daily_sent FROM sender_identities WHERE id = ?")
            .bind(identity_id)
            .fetch_optional(pool)
            .await?;
    let (limit, sent) = row
        .ok_or_else(|| anyhow::anyhow!("sender identity not found: {identity_id}"))?;
    let remaining = (limit - sent).max(0) as usize;
    let allowed = remaining.min(count);
    Ok(Reservation {
        allowed,
        trimmed: allowed < count,
    })
}

/// Record `count` sends against the identity, clamped to its daily limit.
pub async fn record_sent(pool: &SqlitePool, identity_id: &str, count: i64) -> Result<()> {
    let now = now_epoch();
    sqlx::query(
        "UPDATE sender_identities
         SET daily_sent = MIN(daily_limit, daily_sent + ?), updated_at = ?
         WHERE id = ?",
    )
    .bind(count)
    .bind(now)
    .bind(identity_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn usage(pool: &SqlitePool, identity_id: &str) -> Result<(i64, i64)> {
    let (limit, used): (i64, i64) =
        sqlx::query_as("SELECT daily_limit, daily_sent FROM sender_identities WHERE id = ?")
            .bind(identity_id)
            .fetch_one(pool)
            .await?;
    Ok((limit, used))
}

/// Zero `daily_sent` for every identity. Idempotent; returns how many rows
/// were touched.
pub async fn reset_all(pool: &SqlitePool) -> Result<u64> {
    let now = now_epoch();
    let result = sqlx::query(
        "UPDATE sender_identities SET daily_sent = 0, last_reset_at = ?, updated_at = ?",
    )
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Manual reset, scoped to one owner's identities.
pub async fn reset_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<u64> {
    let now = now_epoch();
    let result = sqlx::query(
        "UPDATE sender_identities SET daily_sent = 0, last_reset_at = ?, updated_at = ?
         WHERE owner_id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Epoch second of today's local midnight.
pub fn local_day_start() -> i64 {
    let today = Local::now().date_naive();
    let midnight = today.and_hms_opt(0, 0, 0).expect("00:00:00 is valid");
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp(),
        None => now_epoch() - 86_400,
    }
}

/// Epoch second of the next local midnight.
pub fn next_local_midnight() -> i64 {
    let tomorrow = Local::now().date_naive() + Days::new(1);
    let midnight = tomorrow.and_hms_opt(0, 0, 0).expect("00:00:00 is valid");
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp(),
        None => now_epoch() + 86_400,
    }
}

/// Catch-up reset after downtime spanning midnight: if any identity still
/// carries a count from before today's local day start, zero everything.
pub async fn reset_if_stale(pool: &SqlitePool) -> Result<u64> {
    let day_start = local_day_start();
    let (stale,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sender_identities WHERE daily_sent > 0 AND last_reset_at < ?",
    )
    .bind(day_start)
    .fetch_one(pool)
    .await?;
    if stale == 0 {
        return Ok(0);
    }
    tracing::info!(stale, "detected pre-midnight quota counts, resetting");
    reset_all(pool).await
}
