//! # Persister
//!
//! Bulk persistence of event batches into an embedded SQLite database.
//!
//! One transaction and one prepared statement per batch. `INSERT OR IGNORE`
//! on the unique `event_id` makes retried batches idempotent.

mod metrics;
mod sqlite;

pub use metrics::{PersisterMetrics, PersisterSnapshot};
pub use sqlite::{AccountTotals, SqliteStore, StoreOptions, StoredEvent};
