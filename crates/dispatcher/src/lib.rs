//! # Dispatcher
//!
//! Dispatch core shared by both delivery disciplines.
//!
//! Responsibilities:
//! - Pull: thread-safe FIFO with explicit backpressure and an end-of-stream marker
//! - Push: registration-ordered handler list invoked synchronously on `submit`
//! - Count submissions, drops and queue depth

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod registry;

pub use contracts::{DispatchMode, Event, EventHandler};
pub use dispatcher::{BatchSubmission, DispatchCore};
pub use error::DispatchError;
pub use metrics::{DispatchMetrics, DispatchSnapshot};
pub use queue::{Drained, EventQueue, SubmitOutcome};
pub use registry::{HandlerRegistry, Registration};
