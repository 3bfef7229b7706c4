#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use mailbatch::models::identity::{Provider, SenderIdentity};
use mailbatch::models::recipient::RecipientFields;
use mailbatch::services::identity_service::{self, NewIdentity};
use mailbatch::smtp::Mailer;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect memory sqlite");
    mailbatch::db::run_migrations(&pool, concat!(env!("CARGO_MANIFEST_DIR"), "/migrations"))
        .await
        .expect("migrate");
    pool
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transport double: records every accepted message, rejects addresses that
/// were marked as failing.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_mail(
        &self,
        _identity: &SenderIdentity,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<String> {
        if self.failing.lock().unwrap().contains(to) {
            anyhow::bail!("mock transport rejected {to}");
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html.to_string(),
        });
        Ok(format!("{}@mock.test", Uuid::new_v4()))
    }
}

pub async fn insert_identity(
    pool: &SqlitePool,
    owner: &str,
    daily_limit: i64,
    daily_sent: i64,
) -> SenderIdentity {
    let identity = identity_service::create(
        pool,
        owner,
        NewIdentity {
            provider: Provider::Gmail,
            email: format!("{}@example.test", Uuid::new_v4()),
            secret: "app-password".into(),
            display_name: "Test Sender".into(),
            smtp_host: None,
            smtp_port: None,
            is_default: true,
            daily_limit,
        },
    )
    .await
    .expect("create identity");
    if daily_sent > 0 {
        sqlx::query("UPDATE sender_identities SET daily_sent = ? WHERE id = ?")
            .bind(daily_sent)
            .bind(&identity.id)
            .execute(pool)
            .await
            .expect("seed daily_sent");
    }
    identity_service::get(pool, owner, &identity.id)
        .await
        .expect("reload identity")
        .expect("identity exists")
}

pub fn recipient(address: &str, name: &str) -> RecipientFields {
    RecipientFields {
        mail: Some(address.to_string()),
        yyy: Some(name.to_string()),
        ..Default::default()
    }
}
