//! Sender identity management.

use crate::db::now_epoch;
use crate::models::identity::{Provider, SenderIdentity};
use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct NewIdentity {
    pub provider: Provider,
    pub email: String,
    pub secret: String,
    pub display_name: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub is_default: bool,
    pub daily_limit: i64,
}

pub struct IdentityPatch {
    pub secret: Option<String>,
    pub display_name: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
    pub daily_limit: Option<i64>,
}

pub async fn create(
    pool: &SqlitePool,
    owner_id: &str,
    new: NewIdentity,
) -> Result<SenderIdentity> {
    let id = Uuid::new_v4().to_string();
    let now = now_epoch();
    let credentials = SenderIdentity::encode_credentials(&new.email, &new.secret);

    let mut tx = pool.begin().await?;
    if new.is_default {
        // at most one default per owner
        sqlx::query("UPDATE sender_identities SET is_default = 0 WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "INSERT INTO sender_identities (id, owner_id, provider, email, credentials,
                                        display_name, smtp_host, smtp_port, is_default,
                                        is_active, daily_limit, daily_sent, last_reset_at,
                                        created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, 0, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(new.provider)
    .bind(&new.email)
    .bind(&credentials)
    .bind(&new.display_name)
    .bind(new.smtp_host.as_deref())
    .bind(new.smtp_port)
    .bind(new.is_default)
    .bind(new.daily_limit)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get(pool, owner_id, &id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("identity vanished after insert"))
}

pub async fn list(pool: &SqlitePool, owner_id: &str) -> Result<Vec<SenderIdentity>> {
    let rows = sqlx::query_as(
        "SELECT * FROM sender_identities WHERE owner_id = ?
         ORDER BY is_default DESC, created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(
    pool: &SqlitePool,
    owner_id: &str,
    identity_id: &str,
) -> Result<Option<SenderIdentity>> {
    let row = sqlx::query_as("SELECT * FROM sender_identities WHERE id = ? AND owner_id = ?")
        .bind(identity_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// The identity a send uses when none is named explicitly.
pub async fn get_default(pool: &SqlitePool, owner_id: &str) -> Result<Option<SenderIdentity>> {
    let row = sqlx::query_as(
        "SELECT * FROM sender_identities
         WHERE owner_id = ? AND is_default = 1 AND is_active = 1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update(
    pool: &SqlitePool,
    owner_id: &str,
    identity_id: &str,
    patch: IdentityPatch,
) -> Result<Option<SenderIdentity>> {
    let Some(current) = get(pool, owner_id, identity_id).await? else {
        return Ok(None);
    };

    let credentials = match patch.secret {
        Some(secret) => SenderIdentity::encode_credentials(&current.email, &secret),
        None => current.credentials.clone(),
    };
    let display_name = patch.display_name.unwrap_or(current.display_name);
    let smtp_host = patch.smtp_host.or(current.smtp_host);
    let smtp_port = patch.smtp_port.or(current.smtp_port);
    let is_default = patch.is_default.unwrap_or(current.is_default);
    let is_active = patch.is_active.unwrap_or(current.is_active);
    let daily_limit = patch.daily_limit.unwrap_or(current.daily_limit);

    let mut tx = pool.begin().await?;
    if is_default && !current.is_default {
        sqlx::query("UPDATE sender_identities SET is_default = 0 WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "UPDATE sender_identities
         SET credentials = ?, display_name = ?, smtp_host = ?, smtp_port = ?,
             is_default = ?, is_active = ?, daily_limit = ?, updated_at = ?
         WHERE id = ? AND owner_id = ?",
    )
    .bind(&credentials)
    .bind(&display_name)
    .bind(smtp_host.as_deref())
    .bind(smtp_port)
    .bind(is_default)
    .bind(is_active)
    .bind(daily_limit)
    .bind(now_epoch())
    .bind(identity_id)
    .bind(owner_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get(pool, owner_id, identity_id).await
}

pub async fn delete(pool: &SqlitePool, owner_id: &str, identity_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sender_identities WHERE id = ? AND owner_id = ?")
        .bind(identity_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
