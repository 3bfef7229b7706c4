use crate::db::now_epoch;
use crate::error::ApiError;
use crate::models::template::Template;
use crate::routes::Owner;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub subject: String,
    pub body_html: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub body_html: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Own templates plus everyone's public ones.
pub async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Template>>, ApiError> {
    let rows: Vec<Template> = sqlx::query_as(
        "SELECT * FROM templates WHERE owner_id = ? OR is_public = 1
         ORDER BY created_at DESC, id",
    )
    .bind(&owner)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    if req.subject.trim().is_empty() || req.body_html.trim().is_empty() {
        return Err(ApiError::BadRequest("subject and body_html are required".into()));
    }
    let id = Uuid::new_v4().to_string();
    let now = now_epoch();
    let tags: Vec<String> = req
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    sqlx::query(
        "INSERT INTO templates (id, owner_id, name, description, subject, body_html,
                                is_public, tags, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&owner)
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.subject)
    .bind(&req.body_html)
    .bind(req.is_public)
    .bind(serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into()))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let template: Template = sqlx::query_as("SELECT * FROM templates WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.pool)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    // Only the owner may mutate, public or not.
    let current: Option<Template> =
        sqlx::query_as("SELECT * FROM templates WHERE id = ? AND owner_id = ?")
            .bind(&id)
            .bind(&owner)
            .fetch_optional(&state.pool)
            .await?;
    let Some(current) = current else {
        return Err(ApiError::NotFound(format!("template not found: {id}")));
    };

    let name = req.name.unwrap_or(current.name);
    let description = req.description.unwrap_or(current.description);
    let subject = req.subject.unwrap_or(current.subject);
    let body_html = req.body_html.unwrap_or(current.body_html);
    let is_public = req.is_public.unwrap_or(current.is_public);
    let tags = match req.tags {
        Some(tags) => tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        None => current.tags.0,
    };

    sqlx::query(
        "UPDATE templates
         SET name = ?, description = ?, subject = ?, body_html = ?, is_public = ?,
             tags = ?, updated_at = ?
         WHERE id = ? AND owner_id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(&subject)
    .bind(&body_html)
    .bind(is_public)
    .bind(serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into()))
    .bind(now_epoch())
    .bind(&id)
    .bind(&owner)
    .execute(&state.pool)
    .await?;

    let template: Template = sqlx::query_as("SELECT * FROM templates WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(template))
}

pub async fn remove(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM templates WHERE id = ? AND owner_id = ?")
        .bind(&id)
        .bind(&owner)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("template not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
