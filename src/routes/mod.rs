use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, post, put};
use axum::Router;

pub mod history;
pub mod identities;
pub mod jobs;
pub mod recipients;
pub mod send;
pub mod templates;

/// The authenticated caller. Token issuance lives in front of this service;
/// here the owner id arrives as an opaque `x-user-id` header.
pub struct Owner(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| Owner(s.to_string()))
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/email/send", post(send::send))
        .route("/api/email/jobs", get(jobs::list_jobs))
        .route("/api/email/jobs/:id/cancel", post(send::cancel_job))
        .route("/api/email/history", get(history::list_history))
        .route(
            "/api/email-config",
            get(identities::list).post(identities::create),
        )
        .route(
            "/api/email-config/:id",
            put(identities::update).delete(identities::remove),
        )
        .route("/api/email-config/quota", get(identities::quota_status))
        .route(
            "/api/email-config/reset-quota",
            post(identities::reset_quota),
        )
        .route(
            "/api/recipients",
            get(recipients::list).post(recipients::import),
        )
        .route("/api/recipients/:id", delete(recipients::remove))
        .route("/api/recipients/bulk-delete", post(recipients::bulk_delete))
        .route(
            "/api/templates",
            get(templates::list).post(templates::create),
        )
        .route(
            "/api/templates/:id",
            put(templates::update).delete(templates::remove),
        )
}
