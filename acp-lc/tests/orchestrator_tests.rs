//! Integration tests for lead reconciliation and the fallback chain
//!
//! Exercises the orchestrator against the real sqlite backend and the
//! local fallback store.

mod helpers;

use acp_common::db::{init_database, Attribution};
use acp_lc::orchestrator::{LeadOrchestrator, LeadSubmission, SubmitError};
use acp_lc::storage::{FallbackStore, SqliteBackend, StorageBackend};
use acp_lc::tracker::QualificationTracker;
use helpers::{FailingBackend, SlowBackend};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

async fn sqlite_setup(
    dir: &tempfile::TempDir,
) -> (SqlitePool, Arc<QualificationTracker>, LeadOrchestrator) {
    let pool = init_database(&dir.path().join("acp.db")).await.unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> =
        vec![Arc::new(SqliteBackend::new(pool.clone()))];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker.clone(),
        Duration::from_secs(5),
    );
    (pool, tracker, orchestrator)
}

fn submission(session_id: Option<&str>, email: &str, phone: &str, flag: bool) -> LeadSubmission {
    LeadSubmission {
        session_id: session_id.map(str::to_string),
        email: email.to_string(),
        phone: phone.to_string(),
        fallback_is_programmer: flag,
        attribution: Attribution::default(),
    }
}

#[tokio::test]
async fn test_resubmission_updates_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _tracker, orchestrator) = sqlite_setup(&dir).await;

    let mut first = submission(None, "a@x.com", "111", false);
    first.attribution.utm_source = Some("ads".to_string());
    orchestrator.submit(first).await.unwrap();

    let mut second = submission(None, "a@x.com", "222", true);
    second.attribution.utm_source = Some("newsletter".to_string());
    orchestrator.submit(second).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Attribution and phone from the second submission win
    let (phone, utm_source, is_programmer): (String, String, bool) = sqlx::query_as(
        "SELECT phone, utm_source, is_programmer FROM leads WHERE email = 'a@x.com'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(phone, "222");
    assert_eq!(utm_source, "newsletter");
    assert!(is_programmer);
}

#[tokio::test]
async fn test_recorded_qualification_wins_over_form_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, tracker, orchestrator) = sqlite_setup(&dir).await;

    tracker.record("s1", true, Attribution::default()).await.unwrap();

    let outcome = orchestrator
        .submit(submission(Some("s1"), "a@x.com", "123", false))
        .await
        .unwrap();
    assert!(!outcome.used_fallback);

    let is_programmer: bool =
        sqlx::query_scalar("SELECT is_programmer FROM leads WHERE email = 'a@x.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(is_programmer);
}

#[tokio::test]
async fn test_absent_session_falls_back_to_form_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _tracker, orchestrator) = sqlite_setup(&dir).await;

    orchestrator
        .submit(submission(Some("never-recorded"), "a@x.com", "123", true))
        .await
        .unwrap();

    let is_programmer: bool =
        sqlx::query_scalar("SELECT is_programmer FROM leads WHERE email = 'a@x.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(is_programmer);
}

#[tokio::test]
async fn test_stale_qualification_falls_back_to_form_flag() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("acp.db")).await.unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> =
        vec![Arc::new(SqliteBackend::new(pool.clone()))];

    // ttl of zero hours: everything recorded is immediately stale
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 0));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker.clone(),
        Duration::from_secs(5),
    );

    tracker.record("s1", true, Attribution::default()).await.unwrap();
    orchestrator
        .submit(submission(Some("s1"), "a@x.com", "123", false))
        .await
        .unwrap();

    let is_programmer: bool =
        sqlx::query_scalar("SELECT is_programmer FROM leads WHERE email = 'a@x.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!is_programmer);
}

#[tokio::test]
async fn test_failing_backend_lands_lead_in_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(FailingBackend)];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker,
        Duration::from_secs(5),
    );

    let outcome = orchestrator
        .submit(submission(None, "a@x.com", "123", true))
        .await
        .unwrap();
    assert!(outcome.used_fallback);
    assert_eq!(outcome.backend, "fallback");

    let records = orchestrator.fallback_store().read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].email, "a@x.com");
    assert!(records[0].is_programmer);
    assert!(records[0].reason.contains("failing"));
}

#[tokio::test]
async fn test_slow_backend_times_out_into_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(SlowBackend)];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker,
        Duration::from_millis(100),
    );

    let outcome = orchestrator
        .submit(submission(None, "a@x.com", "123", false))
        .await
        .unwrap();
    assert!(outcome.used_fallback);

    let records = orchestrator.fallback_store().read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_second_backend_takes_over_when_first_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("acp.db")).await.unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![
        Arc::new(FailingBackend),
        Arc::new(SqliteBackend::new(pool.clone())),
    ];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker,
        Duration::from_secs(5),
    );

    let outcome = orchestrator
        .submit(submission(None, "a@x.com", "123", false))
        .await
        .unwrap();
    assert!(!outcome.used_fallback);
    assert_eq!(outcome.backend, "sqlite");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_exhausted_when_fallback_also_fails() {
    let dir = tempfile::tempdir().unwrap();

    // Parent of the fallback path is a plain file, so appends cannot land
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(FailingBackend)];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = LeadOrchestrator::new(
        backends,
        FallbackStore::new(blocker.join("fallback_leads.json")),
        tracker,
        Duration::from_secs(5),
    );

    let result = orchestrator
        .submit(submission(None, "a@x.com", "123", false))
        .await;

    match result {
        Err(SubmitError::Exhausted { remote, fallback }) => {
            assert!(remote.contains("failing"));
            assert!(!fallback.is_empty());
        }
        other => panic!("Expected Exhausted, got {:?}", other),
    }

    // No partial or corrupt record left behind
    assert!(!blocker.join("fallback_leads.json").exists());
}

#[tokio::test]
async fn test_concurrent_fallback_appends_keep_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(FailingBackend)];
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = Arc::new(LeadOrchestrator::new(
        backends,
        FallbackStore::new(dir.path().join("fallback_leads.json")),
        tracker,
        Duration::from_secs(5),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .submit(submission(None, &format!("user{}@x.com", i), "123", false))
                .await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.used_fallback);
    }

    let records = orchestrator.fallback_store().read_all().await.unwrap();
    assert_eq!(records.len(), 8);

    let mut emails: Vec<String> = records.iter().map(|r| r.email.clone()).collect();
    emails.sort();
    emails.dedup();
    assert_eq!(emails.len(), 8, "No record may be dropped or duplicated");
}
