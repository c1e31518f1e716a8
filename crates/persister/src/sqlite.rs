//! SqliteStore - bulk persistence of event batches

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use contracts::{ContractError, Event, EventSink};
use metrics::{counter, histogram};
use rusqlite::{params, Connection, OpenFlags, TransactionBehavior};
use tracing::{debug, error, info, instrument};

use crate::metrics::PersisterMetrics;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS banking_events (
    row_seq       INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id      INTEGER NOT NULL UNIQUE,
    event_type    TEXT NOT NULL,
    account_id    INTEGER NOT NULL,
    amount        REAL NOT NULL,
    timestamp     INTEGER NOT NULL,
    channel       TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    processed_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_banking_events_account_id ON banking_events(account_id);
";

const INSERT: &str = "
INSERT OR IGNORE INTO banking_events
    (event_id, event_type, account_id, amount, timestamp, channel, metadata_json, processed_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";

/// Connection settings
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a writer waits on another connection's lock
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Per-account aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountTotals {
    pub events: u64,
    pub net_amount: f64,
}

/// SQLite-backed event sink
///
/// Each consumer owns its own store; several stores may point at the same
/// file, SQLite's locking and the busy timeout serialize their writes.
pub struct SqliteStore {
    name: String,
    path: Option<PathBuf>,
    conn: Connection,
    metrics: Arc<PersisterMetrics>,
}

impl SqliteStore {
    /// Recreate the database file at `path` and open it
    ///
    /// Any previous run's file (and its WAL side files) is removed first.
    #[instrument(
        name = "sqlite_store_create",
        skip(path, options),
        fields(path = %path.as_ref().display())
    )]
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, ContractError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        for suffix in ["", "-wal", "-shm"] {
            let file = PathBuf::from(format!("{}{suffix}", path.display()));
            if file.exists() {
                fs::remove_file(&file)?;
            }
        }
        Self::open(path, options)
    }

    /// Open (or create) the database at `path` without discarding data
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sqlite".to_string());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| ContractError::persistence(&name, e.to_string()))?;
        let store = Self::configure(name, Some(path.to_path_buf()), conn, options)?;
        debug!(store = %store.name, "sqlite store opened");
        Ok(store)
    }

    /// Private in-memory database
    pub fn in_memory(name: impl Into<String>) -> Result<Self, ContractError> {
        let name = name.into();
        let conn = Connection::open_in_memory()
            .map_err(|e| ContractError::persistence(&name, e.to_string()))?;
        Self::configure(name, None, conn, StoreOptions::default())
    }

    fn configure(
        name: String,
        path: Option<PathBuf>,
        conn: Connection,
        options: StoreOptions,
    ) -> Result<Self, ContractError> {
        let fail = |e: rusqlite::Error| ContractError::persistence(&name, e.to_string());
        conn.busy_timeout(options.busy_timeout).map_err(fail)?;
        if path.is_some() {
            // journal_mode returns a row; query it rather than execute.
            let _mode: String = conn
                .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
                .map_err(fail)?;
            conn.execute_batch("PRAGMA synchronous=NORMAL;").map_err(fail)?;
        }
        conn.execute_batch(SCHEMA).map_err(fail)?;
        Ok(Self {
            name,
            path,
            conn,
            metrics: Arc::new(PersisterMetrics::new()),
        })
    }

    /// Share counters with other stores (one set per mode)
    pub fn with_metrics(mut self, metrics: Arc<PersisterMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PersisterMetrics> {
        &self.metrics
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn err(&self, e: impl ToString) -> ContractError {
        ContractError::persistence(&self.name, e.to_string())
    }

    /// Rows stored
    pub fn count(&self) -> Result<u64, ContractError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM banking_events", [], |row| row.get(0))
            .map_err(|e| self.err(e))?;
        Ok(count as u64)
    }

    /// Event ids ordered by insertion
    pub fn event_ids_in_insertion_order(&self) -> Result<Vec<u64>, ContractError> {
        let mut stmt = self
            .conn
            .prepare("SELECT event_id FROM banking_events ORDER BY row_seq")
            .map_err(|e| self.err(e))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| self.err(e))?
            .map(|id| id.map(|id| id as u64))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.err(e))?;
        Ok(ids)
    }

    /// Event count and net amount for one account
    pub fn account_totals(&self, account_id: u32) -> Result<AccountTotals, ContractError> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(amount), 0.0)
                 FROM banking_events WHERE account_id = ?1",
                params![account_id],
                |row| {
                    Ok(AccountTotals {
                        events: row.get::<_, i64>(0)? as u64,
                        net_amount: row.get(1)?,
                    })
                },
            )
            .map_err(|e| self.err(e))
    }

    /// Fetch one stored event back, metadata included
    pub fn load(&self, event_id: u64) -> Result<Option<StoredEvent>, ContractError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT event_id, event_type, account_id, amount, timestamp, channel, metadata_json
                 FROM banking_events WHERE event_id = ?1",
            )
            .map_err(|e| self.err(e))?;
        let mut rows = stmt
            .query(params![event_id as i64])
            .map_err(|e| self.err(e))?;
        let Some(row) = rows.next().map_err(|e| self.err(e))? else {
            return Ok(None);
        };
        let stored = StoredEvent {
            event_id: row.get::<_, i64>(0).map_err(|e| self.err(e))? as u64,
            event_type: row.get(1).map_err(|e| self.err(e))?,
            account_id: row.get(2).map_err(|e| self.err(e))?,
            amount: row.get(3).map_err(|e| self.err(e))?,
            timestamp_us: row.get(4).map_err(|e| self.err(e))?,
            channel: row.get(5).map_err(|e| self.err(e))?,
            metadata_json: row.get(6).map_err(|e| self.err(e))?,
        };
        Ok(Some(stored))
    }

    fn insert_batch(&mut self, batch: &[Event]) -> Result<usize, ContractError> {
        let processed_at = Utc::now().timestamp_micros();
        let name = self.name.clone();
        let fail = |e: rusqlite::Error| ContractError::persistence(&name, e.to_string());

        // Take the write lock up front so concurrent writers wait in busy_timeout.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(fail)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT).map_err(fail)?;
            for event in batch {
                let metadata = serde_json::to_string(&event.metadata)
                    .map_err(|e| ContractError::persistence(&name, e.to_string()))?;
                inserted += stmt
                    .execute(params![
                        event.id as i64,
                        event.event_type.as_str(),
                        event.account_id,
                        event.amount,
                        event.timestamp_us,
                        event.channel.as_str(),
                        metadata,
                        processed_at,
                    ])
                    .map_err(fail)?;
            }
        }
        tx.commit().map_err(fail)?;
        Ok(inserted)
    }
}

/// Row read back from `banking_events`
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: u64,
    pub event_type: String,
    pub account_id: u32,
    pub amount: f64,
    pub timestamp_us: i64,
    pub channel: String,
    pub metadata_json: String,
}

impl EventSink for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn persist(&mut self, batch: &[Event]) -> Result<(), ContractError> {
        if batch.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        match self.insert_batch(batch) {
            Ok(inserted) => {
                self.metrics.record_write(batch.len(), inserted);
                let store = self.name.clone();
                counter!("dispatch_bench_bulk_writes_total", "store" => store.clone())
                    .increment(1);
                counter!("dispatch_bench_rows_written_total", "store" => store.clone())
                    .increment(inserted as u64);
                histogram!("dispatch_bench_bulk_write_ms", "store" => store)
                    .record(start.elapsed().as_secs_f64() * 1000.0);
                debug!(
                    store = %self.name,
                    rows = batch.len(),
                    inserted,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "batch persisted"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(store = %self.name, rows = batch.len(), error = %e, "batch rolled back");
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), ContractError> {
        if self.path.is_some() {
            self.conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .map_err(|e| ContractError::persistence(&self.name, e.to_string()))?;
        }
        let snapshot = self.metrics.snapshot();
        info!(
            store = %self.name,
            bulk_writes = snapshot.bulk_writes,
            rows = snapshot.rows_written,
            "sqlite store closed"
        );
        Ok(())
    }
}
