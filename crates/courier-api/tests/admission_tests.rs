//! Admission policy tests against in-memory store and publisher doubles.

mod common;

use std::sync::Arc;

use chrono::Utc;

use common::{FakePublisher, FakeStore};
use courier_api::{AdmissionService, ApiMetrics};
use courier_core::{MessageId, MessageState};

fn service(store: Arc<FakeStore>, publisher: Arc<FakePublisher>, max_per_day: i32) -> AdmissionService {
    AdmissionService::new(
        store,
        publisher,
        Arc::new(ApiMetrics::unregistered()),
        max_per_day,
    )
}

fn request(idem: &str) -> courier_api::SmsRequest {
    courier_api::SmsRequest {
        tenant_id: "t1".into(),
        idempotency_key: idem.into(),
        to: "+1 555 010 0000".into(),
        template_id: "txn_confirm_v1".into(),
        vars: Default::default(),
        campaign_id: None,
    }
}

#[tokio::test]
async fn test_happy_path_creates_queued_and_enqueues() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    let outcome = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.state, MessageState::Queued);
    assert_eq!(store.message_count(), 1);

    let jobs = publisher.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].message_id, outcome.message_id);
    // The destination reaches the queue normalized.
    assert_eq!(jobs[0].to, "+15550100000");
}

#[tokio::test]
async fn test_suppressed_destination_short_circuits() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    store.suppress("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    let outcome = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.state, MessageState::Suppressed);
    assert_eq!(
        store.last_error_of(&outcome.message_id).as_deref(),
        Some("suppressed")
    );
    assert!(publisher.jobs().is_empty());
}

#[tokio::test]
async fn test_absent_consent_counts_as_opted_out() {
    let store = Arc::new(FakeStore::default());
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    let outcome = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.state, MessageState::Suppressed);
    assert_eq!(
        store.last_error_of(&outcome.message_id).as_deref(),
        Some("not_opted_in")
    );
    assert!(publisher.jobs().is_empty());
}

#[tokio::test]
async fn test_daily_cap_allows_up_to_limit_then_rolls_back() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 2);
    let now = Utc::now();

    for (idem, expected) in [
        ("idem-1", MessageState::Queued),
        ("idem-2", MessageState::Queued),
        ("idem-3", MessageState::Suppressed),
    ] {
        let outcome = svc
            .create_and_enqueue(request(idem), MessageId::new(), now)
            .await
            .unwrap();
        assert_eq!(outcome.state, expected, "{idem}");
    }

    // The over-cap attempt left no allowance consumed.
    assert_eq!(store.cap_count("t1", "+15550100000", now), 2);
    assert_eq!(publisher.jobs().len(), 2);

    let suppressed: Vec<_> = store.states_with_last_error("cap_exceeded");
    assert_eq!(suppressed, vec![MessageState::Suppressed]);
}

#[tokio::test]
async fn test_duplicate_idempotency_key_returns_existing_row() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    let first = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();
    let second = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();

    assert_eq!(first.message_id, second.message_id);
    assert_eq!(second.state, MessageState::Queued);
    // One row, one enqueue across both creates.
    assert_eq!(store.message_count(), 1);
    assert_eq!(publisher.jobs().len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_falls_back_to_lookup_on_unique_violation() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    // Seed the winner's row, but hide it from the first lookup so the
    // service goes down the insert path and hits the unique constraint.
    let winner = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();
    store.hide_from_next_lookup();

    let loser = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap();

    assert_eq!(loser.message_id, winner.message_id);
    assert_eq!(store.message_count(), 1);
    assert_eq!(publisher.jobs().len(), 1);
}

#[tokio::test]
async fn test_enqueue_failure_marks_failed_and_propagates() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::failing());
    let svc = service(store.clone(), publisher.clone(), 10);

    let err = svc
        .create_and_enqueue(request("idem-1"), MessageId::new(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, courier_api::ApiError::Queue(_)));

    let states = store.states_with_last_error("enqueue_failed");
    assert_eq!(states, vec![MessageState::Failed]);
}

#[tokio::test]
async fn test_policy_checks_use_normalized_destination() {
    let store = Arc::new(FakeStore::default());
    // Opt-in recorded against the normalized number only.
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let svc = service(store.clone(), publisher.clone(), 10);

    let mut req = request("idem-1");
    req.to = "  +1 555 010 0000  ".into();

    let outcome = svc
        .create_and_enqueue(req, MessageId::new(), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.state, MessageState::Queued);
}
