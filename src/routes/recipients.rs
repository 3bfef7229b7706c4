use crate::db::now_epoch;
use crate::error::ApiError;
use crate::models::recipient::{Recipient, RecipientFields};
use crate::routes::Owner;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

pub async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Recipient>>, ApiError> {
    let rows: Vec<Recipient> =
        sqlx::query_as("SELECT * FROM recipients WHERE owner_id = ? ORDER BY created_at DESC, id")
            .bind(&owner)
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub recipients: Vec<RecipientFields>,
}

/// Store rows produced by the sheet importer. Parsing happens client-side;
/// this endpoint accepts ready field records.
pub async fn import(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<ImportRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.recipients.is_empty() {
        return Err(ApiError::BadRequest("recipient list is empty".into()));
    }
    let now = now_epoch();
    let mut tx = state.pool.begin().await?;
    for fields in &req.recipients {
        sqlx::query(
            "INSERT INTO recipients (id, owner_id, xxx, yyy, mail, ttt, zzz, www, uuu, vvv, rrr, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&owner)
        .bind(fields.xxx.as_deref())
        .bind(fields.yyy.as_deref())
        .bind(fields.mail.as_deref())
        .bind(fields.ttt.as_deref())
        .bind(fields.zzz.as_deref())
        .bind(fields.www.as_deref())
        .bind(fields.uuu.as_deref())
        .bind(fields.vvv.as_deref())
        .bind(fields.rrr.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "inserted": req.recipients.len() })),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM recipients WHERE id = ? AND owner_id = ?")
        .bind(&id)
        .bind(&owner)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("recipient not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

/// Remove many recipients at once, e.g. after a successful send.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.ids.is_empty() {
        return Err(ApiError::BadRequest("ids is empty".into()));
    }
    let mut deleted = 0u64;
    let mut tx = state.pool.begin().await?;
    for id in &req.ids {
        let result = sqlx::query("DELETE FROM recipients WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(&owner)
            .execute(&mut *tx)
            .await?;
        deleted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
