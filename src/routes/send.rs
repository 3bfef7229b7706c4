use crate::error::ApiError;
use crate::models::identity::Provider;
use crate::models::job::{JobStatus, SendResult};
use crate::models::recipient::RecipientFields;
use crate::routes::Owner;
use crate::services::{dispatch_service, identity_service, job_service, quota_service};
use crate::services::dispatch_service::DelayConfig;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct SendRequest {
    pub identity_id: Option<String>,
    pub recipients: Vec<RecipientFields>,
    pub subject: String,
    pub template: String,
    #[serde(default)]
    pub delay: DelayConfig,
}

#[derive(Serialize)]
pub struct QuotaInfo {
    pub limit: i64,
    pub used: i64,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub trimmed: bool,
    pub results: Vec<SendResult>,
    pub quota: Option<QuotaInfo>,
}

pub async fn send(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if req.recipients.is_empty() {
        return Err(ApiError::BadRequest("recipient list is empty".into()));
    }
    if req.subject.trim().is_empty() {
        return Err(ApiError::BadRequest("subject is required".into()));
    }
    if req.template.trim().is_empty() {
        return Err(ApiError::BadRequest("template is required".into()));
    }

    // Resolve the sender identity before anything is attempted; a disabled
    // or unsupported identity aborts the whole send.
    let identity = match &req.identity_id {
        Some(id) => identity_service::get(&state.pool, &owner, id)
            .await
            .map_err(ApiError::Internal)?
            .filter(|i| i.is_active),
        None => identity_service::get_default(&state.pool, &owner)
            .await
            .map_err(ApiError::Internal)?,
    };
    let Some(identity) = identity else {
        return Err(ApiError::BadRequest(
            "no usable sender identity; configure one first".into(),
        ));
    };
    if identity.provider == Provider::Outlook {
        return Err(ApiError::Maintenance(
            "sending via Outlook is under maintenance; pick a Gmail identity".into(),
        ));
    }
    if identity.provider == Provider::Custom {
        // fail fast on a misconfigured custom identity
        identity
            .smtp_endpoint()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    let (job_id, outcome) = dispatch_service::send_bulk(
        &state.pool,
        state.mailer.as_ref(),
        &state.cancels,
        &owner,
        &identity,
        &req.recipients,
        &req.subject,
        &req.template,
        &req.delay,
    )
    .await;

    let quota = quota_service::usage(&state.pool, &identity.id)
        .await
        .ok()
        .map(|(limit, used)| QuotaInfo { limit, used });

    Ok(Json(SendResponse {
        job_id,
        status: outcome.status,
        trimmed: outcome.trimmed,
        results: outcome.results,
        quota,
    }))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match job_service::job_owner(&state.pool, &job_id)
        .await
        .map_err(ApiError::Internal)?
    {
        Some(job_owner) if job_owner == owner => {}
        _ => return Err(ApiError::NotFound(format!("job not found: {job_id}"))),
    }
    let canceled = state.cancels.cancel(&job_id).await;
    Ok(Json(serde_json::json!({ "canceled": canceled })))
}
