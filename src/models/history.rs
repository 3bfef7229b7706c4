use crate::models::job::SendResult;
use serde::Serialize;

/// Immutable audit record of one send invocation. Written once, never
/// appended to afterwards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: String,
    pub owner_id: String,
    pub timestamp: i64,
    pub total: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub results: sqlx::types::Json<Vec<SendResult>>,
}
