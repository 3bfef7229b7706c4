use serde::Serialize;

/// A saved message template. Visible to its owner or, when public, to all
/// users; only the owner may change it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Template {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub subject: String,
    pub body_html: String,
    pub is_public: bool,
    pub tags: sqlx::types::Json<Vec<String>>,
    pub created_at: i64,
    pub updated_at: i64,
}
