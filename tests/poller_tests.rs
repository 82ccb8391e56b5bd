/// Table state poller tests
///
/// Describe-and-wait loops driven by scripted statuses on a paused clock, and
/// the create/drop table workflows built on them.
use std::time::Duration;

use dynamo_bulk::poller::{PollPolicy, Poller};
use dynamo_bulk::setup::TableDefinition;
use dynamo_bulk::{
    Engine, EngineOptions, Error, MemoryStore, NoProgress, Operation, ResourceState, StoreError,
    TargetState,
};

mod helpers;
use helpers::*;

#[tokio::test(start_paused = true)]
async fn test_wait_until_absent() {
    // three DELETING answers, then not found
    let store = StubStore::new().with_statuses(["DELETING"; 3]);
    let progress = RecordingProgress::new();
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let state = poller
        .wait_for_state("orders", &TargetState::Absent)
        .await
        .unwrap();

    assert_eq!(state, ResourceState::Absent);
    let calls = store.calls_of(CallKind::Describe);
    assert_eq!(calls.len(), 4);
    assert_eq!(
        progress.messages(),
        vec![
            "Table orders: DELETING",
            "Table orders: DELETING",
            "Table orders: DELETING",
            "Table orders: ABSENT",
        ]
    );

    let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(2000),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_status() {
    let store = StubStore::new().with_statuses(["CREATING", "CREATING", "ACTIVE", "UPDATING"]);
    let progress = RecordingProgress::new();
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let state = poller
        .wait_for_state("orders", &TargetState::active())
        .await
        .unwrap();

    assert_eq!(state, ResourceState::Observed("ACTIVE".to_string()));
    assert_eq!(store.call_count(), 3);
    assert_eq!(progress.messages().len(), 3);
}

#[tokio::test]
async fn test_describe_error_is_fatal() {
    let store = StubStore::new().with_describe_error(StoreError::other("access denied"));
    let progress = RecordingProgress::new();
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let err = poller
        .wait_for_state("orders", &TargetState::Absent)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Store(_)));
    assert_eq!(store.call_count(), 1);
    assert!(progress.messages().is_empty());
}

#[tokio::test]
async fn test_absent_while_waiting_for_status() {
    let store = StubStore::new();
    let progress = RecordingProgress::new();
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let err = poller
        .wait_for_state("orders", &TargetState::active())
        .await
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert_eq!(progress.messages(), vec!["Table orders: ABSENT"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_poll() {
    let progress = RecordingProgress::new();
    let store = StubStore::new()
        .with_statuses(["CREATING"; 10])
        .cancel_on_call(2, progress.token());
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let err = poller
        .wait_for_state("orders", &TargetState::active())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.call_count(), 2);
    assert_eq!(progress.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_cuts_poll_wait_short() {
    let progress = RecordingProgress::new();
    let store = StubStore::new().with_statuses(["CREATING"; 20]);
    let poller = Poller::new(&store, PollPolicy::default(), &progress);

    let started = tokio::time::Instant::now();
    let token = progress.token();
    let _ = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        token.cancel();
    });

    let err = poller
        .wait_for_state("orders", &TargetState::active())
        .await
        .unwrap_err();

    // polls at 0s .. 31.5s, then the 32s wait is interrupted
    assert!(err.is_cancelled());
    assert_eq!(store.call_count(), 7);
    assert_eq!(progress.messages().len(), 7);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn test_poll_limit() {
    let store = StubStore::new().with_statuses(["CREATING"; 10]);
    let policy = PollPolicy {
        max_polls: Some(4),
        ..PollPolicy::default()
    };
    let poller = Poller::new(&store, policy, &NoProgress);

    let err = poller
        .wait_for_state("orders", &TargetState::active())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PollExhausted { polls: 4, ref last, .. } if last == "CREATING"
    ));
    assert_eq!(store.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_drop_table_waits_until_gone() {
    let engine = Engine::new(StubStore::new().with_statuses(["DELETING"]), "orders");
    let progress = RecordingProgress::new();

    let state = engine.drop_table("orders", &progress).await.unwrap();

    assert_eq!(state, ResourceState::Absent);
    let kinds: Vec<CallKind> = engine.store().calls().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![CallKind::DeleteTable, CallKind::Describe, CallKind::Describe]
    );
    assert_eq!(progress.messages().len(), 2);
}

#[tokio::test]
async fn test_drop_table_cancelled_makes_no_calls() {
    let engine = Engine::new(StubStore::new(), "orders");
    let progress = RecordingProgress::new();
    progress.token().cancel();

    let err = engine.drop_table("orders", &progress).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(engine.store().call_count(), 0);
}

#[tokio::test]
async fn test_create_then_drop_in_memory() {
    let options = EngineOptions {
        poll: PollPolicy {
            max_polls: Some(1),
            ..PollPolicy::default()
        },
        ..EngineOptions::default()
    };
    let engine = Engine::new(MemoryStore::new(), "users").with_options(options);
    let definition = TableDefinition::for_key_spec("users", &key_spec(), &user_schema()).unwrap();

    let state = engine.create_table(&definition, &NoProgress).await.unwrap();
    assert_eq!(state, ResourceState::Observed("ACTIVE".to_string()));
    assert!(engine.store().has_table("users"));

    let summary = engine
        .run(user_source(5), &key_spec(), 25, Operation::Write, &NoProgress)
        .await
        .unwrap();
    assert_eq!(summary.records, 5);

    let state = engine.drop_table("users", &NoProgress).await.unwrap();
    assert_eq!(state, ResourceState::Absent);
    assert!(!engine.store().has_table("users"));
}
