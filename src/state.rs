use crate::services::cancel::CancelRegistry;
use crate::smtp::Mailer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub mailer: Arc<dyn Mailer>,
    pub cancels: CancelRegistry,
}
