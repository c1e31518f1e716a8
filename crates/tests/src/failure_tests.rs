//! Backpressure, retries, cancellation and metric edge cases across crates

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use consumer::{ConsumerError, PullState, PushConsumer};
use contracts::{
    BackpressurePolicy, CancellationToken, ContractError, DispatchConfig, DispatchMode,
    EventHandler,
};
use dispatcher::{DispatchCore, DispatchError, SubmitOutcome};
use observability::{throughput, ModeReport};
use tempfile::TempDir;

use crate::support::{create_store, db_path, generate, settings, spawn_pull, stored_ids, ProbeSink};

fn bounded(capacity: usize, backpressure: BackpressurePolicy) -> DispatchConfig {
    DispatchConfig {
        queue_capacity: capacity,
        backpressure,
        ..Default::default()
    }
}

#[test]
fn test_bounded_queue_blocks_producer_without_loss() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = Arc::new(DispatchCore::new(
        DispatchMode::Pull,
        &bounded(100, BackpressurePolicy::Block),
    ));
    let sink = ProbeSink::new(create_store(&path)).slow(Duration::from_millis(5));
    let worker = spawn_pull("slow", &core, sink, settings(50), CancellationToken::new());

    let summary = core.submit_batch(generate(1000)).unwrap();
    core.close().unwrap();
    let report = worker.join().unwrap().unwrap();

    let metrics = core.metrics();
    assert_eq!(summary.accepted, 1000);
    assert!(metrics.backpressure_waits > 0);
    assert!(metrics.queue_high_water <= 100);
    assert_eq!(metrics.dropped, 0);
    assert_eq!(report.stats.persisted, 1000);
    assert_eq!(stored_ids(&path).len(), 1000);
}

#[test]
fn test_fail_fast_surfaces_capacity_error() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = Arc::new(DispatchCore::new(
        DispatchMode::Pull,
        &bounded(100, BackpressurePolicy::FailFast),
    ));

    let mut events = generate(101).into_iter();
    let accepted = core.submit_batch(events.by_ref().take(100)).unwrap();
    assert_eq!(accepted.accepted, 100);

    let Some(overflow) = events.next() else {
        panic!("generator produced fewer than 101 events");
    };
    match core.submit(overflow) {
        Err(DispatchError::Capacity(ContractError::Capacity { capacity, event_id })) => {
            assert_eq!(capacity, 100);
            assert_eq!(event_id, 101);
        }
        other => panic!("expected capacity error, got {other:?}"),
    }

    // Everything accepted before the error is still delivered.
    core.close().unwrap();
    let report = spawn_pull("late", &core, create_store(&path), settings(40), CancellationToken::new())
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(report.stats.persisted, 100);
    assert_eq!(core.total_submitted(), 100);
}

#[test]
fn test_drop_newest_counts_every_drop() {
    let core = DispatchCore::new(DispatchMode::Pull, &bounded(10, BackpressurePolicy::DropNewest));
    let mut dropped = 0;
    for event in generate(25) {
        if core.submit(event).unwrap() == SubmitOutcome::Dropped {
            dropped += 1;
        }
    }
    let metrics = core.metrics();
    assert_eq!(dropped, 15);
    assert_eq!(metrics.dropped, 15);
    assert_eq!(metrics.submitted, 10);
    assert_eq!(metrics.submitted + metrics.dropped, 25);
}

#[test]
fn test_transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = Arc::new(DispatchCore::new(DispatchMode::Pull, &DispatchConfig::default()));
    // max_attempts = 3: two failures per batch still succeed
    let sink = ProbeSink::new(create_store(&path)).failing(2);
    let worker = spawn_pull("flaky", &core, sink, settings(500), CancellationToken::new());

    core.submit_batch(generate(1200)).unwrap();
    core.close().unwrap();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(report.stats.persisted, 1200);
    assert_eq!(report.stats.bulk_writes, 3);
    assert_eq!(report.stats.retries, 6);
    assert_eq!(stored_ids(&path).len(), 1200);
}

#[test]
fn test_close_failure_after_commit_keeps_pull_consumer_drained() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = Arc::new(DispatchCore::new(DispatchMode::Pull, &DispatchConfig::default()));
    let sink = ProbeSink::new(create_store(&path)).failing_close();
    let worker = spawn_pull("pull-0", &core, sink, settings(400), CancellationToken::new());

    core.submit_batch(generate(1000)).unwrap();
    core.close().unwrap();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(report.final_state, Some(PullState::Drained));
    assert_eq!(report.stats.persisted, 1000);
    assert_eq!(stored_ids(&path).len(), 1000);
}

#[test]
fn test_pull_retries_exhausted_ends_the_mode() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = Arc::new(DispatchCore::new(DispatchMode::Pull, &DispatchConfig::default()));
    let sink = ProbeSink::new(create_store(&path)).failing(u32::MAX);
    let worker = spawn_pull("broken", &core, sink, settings(100), CancellationToken::new());

    core.submit_batch(generate(300)).unwrap();
    core.close().unwrap();

    match worker.join().unwrap() {
        Err(ConsumerError::RetriesExhausted {
            attempts,
            persisted,
            pending,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(persisted, 0);
            assert_eq!(pending, 100);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(stored_ids(&path).is_empty());
}

#[test]
fn test_push_failure_stops_producer_and_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "push.db");
    let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
    let sink = ProbeSink::new(create_store(&path)).failing(u32::MAX);
    let consumer = Arc::new(PushConsumer::new("push-0", sink, &settings(100)));
    core.register("push-0", consumer.clone() as Arc<dyn EventHandler>);

    let err = core.submit_batch(generate(500)).unwrap_err();
    match err {
        DispatchError::Handler {
            handle, event_id, ..
        } => {
            assert_eq!(handle, "push-0");
            assert_eq!(event_id, 100);
        }
        other => panic!("expected handler error, got {other:?}"),
    }
    // The event whose callback failed was never accepted.
    assert_eq!(core.total_submitted(), 99);

    let failure = consumer.finish().unwrap_err();
    assert!(matches!(failure, ConsumerError::RetriesExhausted { .. }));
    assert_eq!(failure.persisted(), Some(0));
}

#[test]
fn test_cancelled_pull_flushes_partial_batch() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let cancel = CancellationToken::new();
    let core = Arc::new(DispatchCore::with_cancellation(
        DispatchMode::Pull,
        &DispatchConfig::default(),
        cancel.clone(),
    ));
    let worker = spawn_pull("pull-0", &core, create_store(&path), settings(1000), cancel.clone());

    core.submit_batch(generate(300)).unwrap();
    while core.queue_len() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
    cancel.cancel();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(report.final_state, Some(PullState::Cancelled));
    assert_eq!(report.stats.persisted, 300);
    assert_eq!(report.stats.bulk_writes, 1);
    assert_eq!(stored_ids(&path).len(), 300);
}

#[test]
fn test_cancelled_push_stops_callbacks_and_keeps_accepted_events() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "push.db");
    let cancel = CancellationToken::new();
    let core = DispatchCore::with_cancellation(
        DispatchMode::Push,
        &DispatchConfig::default(),
        cancel.child_token(),
    );
    let consumer = Arc::new(PushConsumer::new("push-0", create_store(&path), &settings(1000)));
    core.register("push-0", consumer.clone() as Arc<dyn EventHandler>);

    let mut events = generate(5300).into_iter();
    core.submit_batch(events.by_ref().take(300)).unwrap();
    cancel.cancel();

    match core.submit_batch(events) {
        Err(DispatchError::Cancelled { event_id }) => assert_eq!(event_id, 301),
        other => panic!("expected cancellation, got {other:?}"),
    }
    core.close().unwrap();
    let report = consumer.finish().unwrap();

    assert_eq!(report.invocations, 300);
    assert_eq!(report.stats.persisted, 300);
    assert_eq!(core.total_submitted(), 300);
    assert_eq!(stored_ids(&path), (1..=300).collect::<Vec<_>>());
}

#[test]
fn test_cancellation_releases_blocked_producer() {
    let cancel = CancellationToken::new();
    let core = DispatchCore::with_cancellation(
        DispatchMode::Pull,
        &bounded(10, BackpressurePolicy::Block),
        cancel.child_token(),
    );
    core.submit_batch(generate(10)).unwrap();

    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            cancel.cancel();
        })
    };
    let err = core.submit_batch(generate(1)).unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, DispatchError::Cancelled { .. }));
}

#[test]
fn test_throughput_never_undefined() {
    assert_eq!(throughput(0, Duration::ZERO), 0.0);
    assert!(throughput(1, Duration::ZERO).is_infinite());
    assert!(throughput(1000, Duration::from_millis(500)) > 0.0);

    let report = ModeReport::new(DispatchMode::Pull);
    assert_eq!(report.end_to_end_throughput(), 0.0);
    assert!(!report.processing_throughput().is_nan());
}
