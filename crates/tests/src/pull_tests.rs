//! Pull mode end to end: generator -> queue -> polling consumers -> SQLite

use std::collections::HashSet;
use std::sync::Arc;

use consumer::{ConsumerTotals, PullState};
use contracts::{CancellationToken, DispatchConfig, DispatchMode, EventSink};
use dispatcher::DispatchCore;
use persister::{PersisterMetrics, SqliteStore, StoreOptions};
use tempfile::TempDir;

use crate::support::{create_store, db_path, generate, settings, spawn_pull, stored_ids, ProbeSink};

fn pull_core(config: &DispatchConfig) -> Arc<DispatchCore> {
    Arc::new(DispatchCore::new(DispatchMode::Pull, config))
}

#[test]
fn test_pull_persists_everything_in_generation_order() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let sink = ProbeSink::new(create_store(&path));
    let sizes = sink.batch_sizes();

    let core = pull_core(&DispatchConfig::default());
    let worker = spawn_pull("pull-0", &core, sink, settings(5000), CancellationToken::new());

    let events = generate(12_000);
    let expected: Vec<u64> = events.iter().map(|e| e.id).collect();
    let submitted = core.submit_batch(events).unwrap();
    core.close().unwrap();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(submitted.accepted, 12_000);
    assert_eq!(report.final_state, Some(PullState::Drained));
    assert_eq!(report.stats.persisted, 12_000);
    assert_eq!(report.stats.bulk_writes, 3);
    assert_eq!(*sizes.lock().unwrap(), vec![5000, 5000, 2000]);

    // FIFO: insertion order is generation order, no gaps, no duplicates.
    assert_eq!(stored_ids(&path), expected);
}

#[test]
fn test_pull_exact_threshold_is_one_write() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let sink = ProbeSink::new(create_store(&path));
    let sizes = sink.batch_sizes();

    let core = pull_core(&DispatchConfig::default());
    let worker = spawn_pull("pull-0", &core, sink, settings(5000), CancellationToken::new());
    core.submit_batch(generate(5000)).unwrap();
    core.close().unwrap();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(report.stats.bulk_writes, 1);
    assert_eq!(*sizes.lock().unwrap(), vec![5000]);
    assert_eq!(stored_ids(&path).len(), 5000);
}

#[test]
fn test_pull_consumer_started_late_still_drains() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let core = pull_core(&DispatchConfig::default());

    core.submit_batch(generate(1500)).unwrap();
    core.close().unwrap();

    let report = spawn_pull(
        "pull-late",
        &core,
        create_store(&path),
        settings(1000),
        CancellationToken::new(),
    )
    .join()
    .unwrap()
    .unwrap();
    assert_eq!(report.stats.persisted, 1500);
    assert_eq!(report.stats.bulk_writes, 2);
}

#[test]
fn test_multiple_pull_consumers_split_the_stream() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let metrics = Arc::new(PersisterMetrics::new());
    let core = pull_core(&DispatchConfig {
        queue_capacity: 1000,
        ..Default::default()
    });

    let mut workers = Vec::new();
    for i in 0..3 {
        let store = if i == 0 {
            SqliteStore::create(&path, StoreOptions::default()).unwrap()
        } else {
            SqliteStore::open(&path, StoreOptions::default()).unwrap()
        };
        let store = store.with_metrics(metrics.clone());
        workers.push(spawn_pull(
            &format!("pull-{i}"),
            &core,
            store,
            settings(400),
            CancellationToken::new(),
        ));
    }

    core.submit_batch(generate(9000)).unwrap();
    core.close().unwrap();
    let reports: Vec<_> = workers
        .into_iter()
        .map(|w| w.join().unwrap().unwrap())
        .collect();

    let totals: ConsumerTotals = reports.iter().collect();
    assert_eq!(totals.persisted, 9000);
    assert!(reports.iter().all(|r| r.final_state == Some(PullState::Drained)));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.rows_written, 9000);
    assert_eq!(snapshot.duplicates_ignored, 0);
    assert_eq!(snapshot.bulk_writes, totals.bulk_writes);

    let ids: HashSet<u64> = stored_ids(&path).into_iter().collect();
    assert_eq!(ids, (1..=9000).collect());
}

#[test]
fn test_replayed_batch_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let mut store = create_store(&path);
    let batch = generate(250);

    store.persist(&batch).unwrap();
    store.persist(&batch).unwrap();

    assert_eq!(store.count().unwrap(), 250);
    let snapshot = store.metrics().snapshot();
    assert_eq!(snapshot.bulk_writes, 2);
    assert_eq!(snapshot.rows_written, 250);
    assert_eq!(snapshot.duplicates_ignored, 250);
}

#[test]
fn test_stored_rows_match_generated_events() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir, "pull.db");
    let events = generate(50);
    let mut store = create_store(&path);
    store.persist(&events).unwrap();

    let account = events[0].account_id;
    let expected_net: f64 = events
        .iter()
        .filter(|e| e.account_id == account)
        .map(|e| e.amount)
        .sum();
    let totals = store.account_totals(account).unwrap();
    assert!((totals.net_amount - expected_net).abs() < 1e-6);

    let row = store.load(events[7].id).unwrap().unwrap();
    assert_eq!(row.event_type, events[7].event_type.as_str());
    assert_eq!(row.channel, events[7].channel.as_str());
    assert_eq!(row.amount, events[7].amount);
}
