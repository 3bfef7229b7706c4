use crate::error::ApiError;
use crate::routes::Owner;
use crate::services::job_service;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

/// Most recent jobs for the owner, for resume-after-reload in the UI.
pub async fn list_jobs(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = job_service::list_jobs(&state.pool, &owner)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "jobs": jobs })))
}
