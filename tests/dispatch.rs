mod common;

use common::{insert_identity, recipient, setup_pool, MockMailer};
use mailbatch::models::job::{JobStatus, ResultStatus};
use mailbatch::models::recipient::RecipientFields;
use mailbatch::services::cancel::{CancelRegistry, CancelToken};
use mailbatch::services::dispatch_service::{self, DelayConfig};
use mailbatch::services::{job_service, quota_service};
use std::sync::Arc;
use std::time::Duration;

fn no_delay() -> DelayConfig {
    DelayConfig::default()
}

fn delay(batch_size: usize, delay_seconds: u64) -> DelayConfig {
    DelayConfig {
        enabled: true,
        batch_size,
        delay_seconds,
    }
}

#[tokio::test]
async fn single_batch_sends_all_in_order() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = MockMailer::new();
    let recipients: Vec<_> = (0..3)
        .map(|i| recipient(&format!("r{i}@x.test"), &format!("Name{i}")))
        .collect();

    let (job_id, outcome) = dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &recipients,
        "Hello {yyy}",
        "<p>Hi {yyy}</p>",
        &no_delay(),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(!outcome.trimmed);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results.iter().all(|r| r.is_success()));

    // recipient list order preserved, placeholders personalized
    let sent = mailer.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].to, "r0@x.test");
    assert_eq!(sent[2].to, "r2@x.test");
    assert_eq!(sent[1].subject, "Hello Name1");
    assert_eq!(sent[1].body, "<p>Hi Name1</p>");

    let job = job_service::get_job(&pool, "u1", &job_id)
        .await
        .unwrap()
        .expect("job persisted");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed, 3);
    assert_eq!(job.success_count, 3);
    assert_eq!(job.failed_count, 0);
    assert_eq!(job.results.len(), 3);

    let (limit, used) = quota_service::usage(&pool, &identity.id).await.unwrap();
    assert_eq!(limit, 500);
    assert_eq!(used, 3);
}

#[tokio::test]
async fn quota_trims_batch_to_remaining_capacity() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 10, 8).await;
    let mailer = MockMailer::new();
    let recipients: Vec<_> = (0..5)
        .map(|i| recipient(&format!("r{i}@x.test"), "N"))
        .collect();

    let (_job_id, outcome) = dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &recipients,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    assert!(outcome.trimmed);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(mailer.sent_count(), 2);
    assert_eq!(mailer.sent()[1].to, "r1@x.test");

    let (_, used) = quota_service::usage(&pool, &identity.id).await.unwrap();
    assert_eq!(used, 10);
}

#[tokio::test]
async fn exhausted_quota_attempts_nothing() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 10, 10).await;
    let mailer = MockMailer::new();
    let recipients = vec![recipient("r@x.test", "N")];

    let (_job_id, outcome) = dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &recipients,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    assert!(outcome.trimmed);
    assert!(outcome.results.is_empty());
    assert_eq!(mailer.sent_count(), 0);
}

#[tokio::test]
async fn transport_failure_is_isolated_per_recipient() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = MockMailer::new();
    mailer.fail_for("r1@x.test");
    let recipients: Vec<_> = (0..3)
        .map(|i| recipient(&format!("r{i}@x.test"), "N"))
        .collect();

    let (job_id, outcome) = dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &recipients,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.results[0].status, ResultStatus::Success);
    assert_eq!(outcome.results[1].status, ResultStatus::Error);
    assert!(outcome.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("rejected"));
    assert_eq!(outcome.results[2].status, ResultStatus::Success);
    // the failure did not stop the rest of the batch
    assert_eq!(mailer.sent_count(), 2);
    // failed sends do not consume quota
    let (_, used) = quota_service::usage(&pool, &identity.id).await.unwrap();
    assert_eq!(used, 2);

    let job = job_service::get_job(&pool, "u1", &job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.success_count, 2);
    assert_eq!(job.failed_count, 1);
}

#[tokio::test]
async fn recipient_without_address_is_an_error_entry() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = MockMailer::new();
    let recipients = vec![
        recipient("ok@x.test", "N"),
        RecipientFields::default(),
        // legacy sheets put the address in the name column
        RecipientFields {
            yyy: Some("fallback@x.test".into()),
            ..Default::default()
        },
    ];

    let (_job_id, outcome) = dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &recipients,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.results[0].status, ResultStatus::Success);
    assert_eq!(outcome.results[1].status, ResultStatus::Error);
    assert_eq!(outcome.results[2].status, ResultStatus::Success);
    assert_eq!(mailer.sent()[1].to, "fallback@x.test");
}

#[tokio::test]
async fn cancellation_during_delay_stops_remaining_batches() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = Arc::new(MockMailer::new());
    let cancels = CancelRegistry::default();
    let recipients: Vec<_> = (0..6)
        .map(|i| recipient(&format!("r{i}@x.test"), "N"))
        .collect();

    let task = {
        let pool = pool.clone();
        let mailer = mailer.clone();
        let cancels = cancels.clone();
        let identity = identity.clone();
        tokio::spawn(async move {
            dispatch_service::send_bulk(
                &pool,
                mailer.as_ref(),
                &cancels,
                "u1",
                &identity,
                &recipients,
                "s",
                "b",
                &delay(2, 1),
            )
            .await
        })
    };

    // wait for batch 1 (2 sends), then cancel inside the inter-batch delay
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while mailer.sent_count() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "batch 1 never ran");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let jobs = job_service::list_jobs(&pool, "u1").await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(cancels.cancel(&jobs[0].id).await);

    let (job_id, outcome) = task.await.unwrap();
    assert_eq!(outcome.status, JobStatus::Canceled);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(mailer.sent_count(), 2);

    let job = job_service::get_job(&pool, "u1", &job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert_eq!(job.processed, 2);
}

#[tokio::test]
async fn cancel_before_first_batch_sends_nothing() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = MockMailer::new();
    let token = CancelToken::new();
    token.cancel();
    let job_id = job_service::create_job(&pool, "u1", &identity.id, "s", "b", 2)
        .await
        .unwrap();

    let outcome = dispatch_service::run(
        &pool,
        &mailer,
        &identity,
        &[recipient("a@x.test", "N"), recipient("b@x.test", "N")],
        "s",
        "b",
        &no_delay(),
        &token,
        &job_id,
    )
    .await;

    assert_eq!(outcome.status, JobStatus::Canceled);
    assert!(outcome.results.is_empty());
    assert_eq!(mailer.sent_count(), 0);
}

#[tokio::test]
async fn record_sent_clamps_at_daily_limit() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 10, 9).await;
    quota_service::record_sent(&pool, &identity.id, 100)
        .await
        .unwrap();
    let (_, used) = quota_service::usage(&pool, &identity.id).await.unwrap();
    assert_eq!(used, 10);
}

#[tokio::test]
async fn reset_all_zeroes_every_identity() {
    let pool = setup_pool().await;
    let a = insert_identity(&pool, "u1", 100, 42).await;
    let b = insert_identity(&pool, "u2", 200, 199).await;

    let touched = quota_service::reset_all(&pool).await.unwrap();
    assert_eq!(touched, 2);
    for id in [&a.id, &b.id] {
        let (_, used) = quota_service::usage(&pool, id).await.unwrap();
        assert_eq!(used, 0);
    }
}

#[tokio::test]
async fn reset_for_owner_only_touches_that_owner() {
    let pool = setup_pool().await;
    let mine = insert_identity(&pool, "u1", 100, 5).await;
    let theirs = insert_identity(&pool, "u2", 100, 7).await;

    let count = quota_service::reset_for_owner(&pool, "u1").await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(quota_service::usage(&pool, &mine.id).await.unwrap().1, 0);
    assert_eq!(quota_service::usage(&pool, &theirs.id).await.unwrap().1, 7);
}

#[tokio::test]
async fn stale_counts_reset_on_startup_check() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 100, 5).await;
    // pretend the last reset happened long before today's local midnight
    sqlx::query("UPDATE sender_identities SET last_reset_at = 0 WHERE id = ?")
        .bind(&identity.id)
        .execute(&pool)
        .await
        .unwrap();

    quota_service::reset_if_stale(&pool).await.unwrap();
    assert_eq!(quota_service::usage(&pool, &identity.id).await.unwrap().1, 0);

    // fresh counts from today are left alone
    quota_service::record_sent(&pool, &identity.id, 3).await.unwrap();
    sqlx::query("UPDATE sender_identities SET last_reset_at = ? WHERE id = ?")
        .bind(mailbatch::db::now_epoch())
        .bind(&identity.id)
        .execute(&pool)
        .await
        .unwrap();
    quota_service::reset_if_stale(&pool).await.unwrap();
    assert_eq!(quota_service::usage(&pool, &identity.id).await.unwrap().1, 3);
}

#[tokio::test]
async fn history_is_one_immutable_entry_per_invocation() {
    let pool = setup_pool().await;
    let identity = insert_identity(&pool, "u1", 500, 0).await;
    let mailer = MockMailer::new();

    let first = vec![recipient("one@x.test", "N")];
    dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &first,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    let rows: Vec<(String, i64, String)> = sqlx::query_as(
        "SELECT id, total, results FROM send_history WHERE owner_id = ? ORDER BY timestamp",
    )
    .bind("u1")
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    let (first_id, first_total, first_results) = rows[0].clone();
    assert_eq!(first_total, 1);

    let second = vec![recipient("two@x.test", "N"), recipient("three@x.test", "N")];
    dispatch_service::send_bulk(
        &pool,
        &mailer,
        &CancelRegistry::default(),
        "u1",
        &identity,
        &second,
        "s",
        "b",
        &no_delay(),
    )
    .await;

    let rows: Vec<(String, i64, String)> = sqlx::query_as(
        "SELECT id, total, results FROM send_history WHERE owner_id = ? ORDER BY timestamp, id",
    )
    .bind("u1")
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    let untouched = rows.iter().find(|(id, _, _)| *id == first_id).unwrap();
    assert_eq!(untouched.1, first_total);
    assert_eq!(untouched.2, first_results);
}
