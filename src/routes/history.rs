use crate::error::ApiError;
use crate::routes::Owner;
use crate::services::job_service;
use crate::services::job_service::HistoryPage;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct HistoryQuery {
    /// yyyy-mm-dd in the caller's locale; defaults to its current day.
    pub date: Option<String>,
    /// Minutes behind UTC, JS getTimezoneOffset convention.
    #[serde(default)]
    pub tz: i32,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size", rename = "pageSize")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

pub async fn list_history(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let date = match &q.date {
        Some(s) => Some(
            s.parse::<chrono::NaiveDate>()
                .map_err(|_| ApiError::BadRequest(format!("invalid date: {s}")))?,
        ),
        None => None,
    };
    let page = job_service::list_history(&state.pool, &owner, date, q.tz, q.page, q.page_size)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(page))
}
