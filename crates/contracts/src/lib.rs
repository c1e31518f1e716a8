//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are wall-clock microseconds since the Unix epoch
//! - Ordering is carried by `Event::id`, which is strictly increasing per generator

mod blueprint;
mod consumer_handle;
mod error;
mod event;
mod handler;
mod sink;

pub use blueprint::*;
pub use consumer_handle::ConsumerHandle;
pub use error::*;
pub use event::*;
pub use handler::{EventConsumer, EventHandler};
pub use sink::EventSink;

/// Cooperative stop signal shared by the producer and consumers
///
/// The harness hands each mode pass a `child_token()` of the run token, so a
/// failing consumer stops its own pass while Ctrl+C stops every pass.
/// Only the synchronous half (`cancel` / `is_cancelled`) is used.
pub use tokio_util::sync::CancellationToken;
