use crate::error::ApiError;
use crate::models::identity::{Provider, SenderIdentity};
use crate::routes::Owner;
use crate::services::{identity_service, quota_service};
use crate::services::identity_service::{IdentityPatch, NewIdentity};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct CreateIdentityRequest {
    pub provider: Provider,
    pub email: String,
    pub secret: String,
    #[serde(default)]
    pub display_name: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,
}

fn default_daily_limit() -> i64 {
    500
}

#[derive(Deserialize, Default)]
pub struct UpdateIdentityRequest {
    pub secret: Option<String>,
    pub display_name: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
    pub daily_limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<SenderIdentity>>, ApiError> {
    let identities = identity_service::list(&state.pool, &owner)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(identities))
}

pub async fn create(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<CreateIdentityRequest>,
) -> Result<(StatusCode, Json<SenderIdentity>), ApiError> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".into()));
    }
    if req.secret.is_empty() {
        return Err(ApiError::BadRequest("secret is required".into()));
    }
    if req.daily_limit <= 0 {
        return Err(ApiError::BadRequest("daily_limit must be positive".into()));
    }
    let identity = identity_service::create(
        &state.pool,
        &owner,
        NewIdentity {
            provider: req.provider,
            email: req.email.trim().to_lowercase(),
            secret: req.secret,
            display_name: req.display_name,
            smtp_host: req.smtp_host,
            smtp_port: req.smtp_port,
            is_default: req.is_default,
            daily_limit: req.daily_limit,
        },
    )
    .await
    .map_err(ApiError::Internal)?;
    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn update(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(req): Json<UpdateIdentityRequest>,
) -> Result<Json<SenderIdentity>, ApiError> {
    if let Some(limit) = req.daily_limit {
        if limit <= 0 {
            return Err(ApiError::BadRequest("daily_limit must be positive".into()));
        }
    }
    let updated = identity_service::update(
        &state.pool,
        &owner,
        &id,
        IdentityPatch {
            secret: req.secret,
            display_name: req.display_name,
            smtp_host: req.smtp_host,
            smtp_port: req.smtp_port,
            is_default: req.is_default,
            is_active: req.is_active,
            daily_limit: req.daily_limit,
        },
    )
    .await
    .map_err(ApiError::Internal)?;
    updated
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("identity not found: {id}")))
}

pub async fn remove(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = identity_service::delete(&state.pool, &owner, &id)
        .await
        .map_err(ApiError::Internal)?;
    if !deleted {
        return Err(ApiError::NotFound(format!("identity not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Serialize)]
pub struct IdentityQuota {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub daily_limit: i64,
    pub daily_sent: i64,
    pub remaining: i64,
    pub usage_percent: i64,
    pub needs_reset: bool,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct QuotaStatus {
    pub total_configs: usize,
    pub active_configs: usize,
    pub total_daily_limit: i64,
    pub total_daily_sent: i64,
    pub remaining_quota: i64,
    pub configs: Vec<IdentityQuota>,
}

pub async fn quota_status(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<QuotaStatus>, ApiError> {
    let identities = identity_service::list(&state.pool, &owner)
        .await
        .map_err(ApiError::Internal)?;
    let active: Vec<_> = identities.iter().filter(|i| i.is_active).collect();
    let total_daily_limit: i64 = active.iter().map(|i| i.daily_limit).sum();
    let total_daily_sent: i64 = active.iter().map(|i| i.daily_sent).sum();
    let day_start = quota_service::local_day_start();
    let configs = identities
        .iter()
        .map(|i| IdentityQuota {
            id: i.id.clone(),
            email: i.email.clone(),
            display_name: i.display_name.clone(),
            daily_limit: i.daily_limit,
            daily_sent: i.daily_sent,
            remaining: i.remaining_quota(),
            usage_percent: if i.daily_limit > 0 {
                i.daily_sent * 100 / i.daily_limit
            } else {
                0
            },
            needs_reset: i.daily_sent > 0 && i.last_reset_at < day_start,
            is_active: i.is_active,
        })
        .collect();
    Ok(Json(QuotaStatus {
        total_configs: identities.len(),
        active_configs: active.len(),
        total_daily_limit,
        total_daily_sent,
        remaining_quota: (total_daily_limit - total_daily_sent).max(0),
        configs,
    }))
}

pub async fn reset_quota(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reset_count = quota_service::reset_for_owner(&state.pool, &owner)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "reset_count": reset_count })))
}
