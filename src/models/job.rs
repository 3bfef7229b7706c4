use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Outcome of one send attempt for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub email: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn success(email: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status: ResultStatus::Success,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn error(email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status: ResultStatus::Error,
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// One bulk-send invocation, tracked for progress, resume and cancel.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SendJob {
    pub id: String,
    pub owner_id: String,
    pub identity_id: String,
    pub subject: String,
    pub body_template: String,
    pub status: JobStatus,
    pub total: i64,
    pub processed: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
    #[sqlx(skip)]
    pub results: Vec<SendResult>,
}
