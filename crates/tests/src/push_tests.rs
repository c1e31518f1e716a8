//! Push mode end to end: generator -> registered callbacks -> SQLite

use std::sync::Arc;

use consumer::PushConsumer;
use contracts::{DispatchConfig, DispatchMode, EventHandler};
use dispatcher::DispatchCore;
use tempfile::TempDir;

use crate::support::{create_store, db_path, generate, settings, stored_ids, ProbeSink};

fn push_core(config: &DispatchConfig) -> DispatchCore {
    DispatchCore::new(DispatchMode::Push, config)
}

#[test]
fn test_push_persists_final_partial_batch() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "push.db");
    let sink = ProbeSink::new(create_store(&path));
    let sizes = sink.batch_sizes();

    let core = push_core(&DispatchConfig::default());
    let consumer = Arc::new(PushConsumer::new("push-0", sink, &settings(5000)));
    let handler: Arc<dyn EventHandler> = consumer.clone();
    core.register("push-0", handler);

    let events = generate(12_000);
    let expected: Vec<u64> = events.iter().map(|e| e.id).collect();
    core.submit_batch(events).unwrap();
    core.close().unwrap();

    // Two thresholds reached during generation, the rest waits for finish.
    assert_eq!(consumer.pending(), 2000);
    let report = consumer.finish().unwrap();

    assert_eq!(report.stats.persisted, 12_000);
    assert_eq!(report.stats.bulk_writes, 3);
    assert_eq!(report.invocations, 12_000);
    assert_eq!(*sizes.lock().unwrap(), vec![5000, 5000, 2000]);
    assert_eq!(stored_ids(&path), expected);
}

#[test]
fn test_push_exact_threshold_final_flush_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "push.db");
    let sink = ProbeSink::new(create_store(&path));
    let sizes = sink.batch_sizes();

    let core = push_core(&DispatchConfig::default());
    let consumer = Arc::new(PushConsumer::new("push-0", sink, &settings(5000)));
    core.register("push-0", consumer.clone() as Arc<dyn EventHandler>);

    core.submit_batch(generate(5000)).unwrap();
    core.close().unwrap();
    assert_eq!(consumer.pending(), 0);

    let report = consumer.finish().unwrap();
    assert_eq!(report.stats.bulk_writes, 1);
    assert_eq!(*sizes.lock().unwrap(), vec![5000]);
    assert_eq!(stored_ids(&path).len(), 5000);
}

#[test]
fn test_push_micro_batches_reach_every_handler_in_order() {
    let dir = TempDir::new().unwrap();
    let core = push_core(&DispatchConfig {
        push_batch_size: 64,
        ..Default::default()
    });

    let first = Arc::new(PushConsumer::new(
        "audit",
        create_store(&db_path(&dir, "audit.db")),
        &settings(1000),
    ));
    let second = Arc::new(PushConsumer::new(
        "ledger",
        create_store(&db_path(&dir, "ledger.db")),
        &settings(1000),
    ));
    core.register("audit", first.clone() as Arc<dyn EventHandler>);
    core.register("ledger", second.clone() as Arc<dyn EventHandler>);
    assert_eq!(core.handler_count(), 2);

    core.submit_batch(generate(2500)).unwrap();
    // close delivers the last partial micro-batch (2500 = 39 * 64 + 4)
    core.close().unwrap();

    let a = first.finish().unwrap();
    let b = second.finish().unwrap();
    assert_eq!(a.stats.persisted, 2500);
    assert_eq!(b.stats.persisted, 2500);
    assert_eq!(a.invocations, 40);
    assert_eq!(core.metrics().handler_calls, 80);
    assert_eq!(
        stored_ids(&db_path(&dir, "audit.db")),
        stored_ids(&db_path(&dir, "ledger.db"))
    );
}

#[test]
fn test_unregistered_handler_stops_receiving() {
    let dir = TempDir::new().unwrap();
    let core = push_core(&DispatchConfig::default());
    let consumer = Arc::new(PushConsumer::new(
        "push-0",
        create_store(&db_path(&dir, "push.db")),
        &settings(100),
    ));
    core.register("push-0", consumer.clone() as Arc<dyn EventHandler>);

    let mut events = generate(200).into_iter();
    core.submit_batch(events.by_ref().take(100)).unwrap();
    assert!(core.unregister(consumer.handle()));
    core.submit_batch(events).unwrap();
    core.close().unwrap();

    let report = consumer.finish().unwrap();
    assert_eq!(report.stats.persisted, 100);
    assert_eq!(core.total_submitted(), 200);
}
