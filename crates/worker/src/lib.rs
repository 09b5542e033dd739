//! Background execution of import runs.
//!
//! Creating a run publishes an [`ImportJob`](ledgerbridge_core::import::ImportJob)
//! on the [`ImportQueue`]. The [`WorkerPool`] drains the queue, executes
//! jobs with bounded concurrency and reschedules rate-limited jobs with
//! exponential backoff.
//!
//! # Modules
//!
//! - `queue` - Unbounded job channel
//! - `retry` - Backoff policy for rate-limited jobs
//! - `pool` - Job executor seam and the worker loop

pub mod pool;
pub mod queue;
pub mod retry;

pub use pool::{JobExecutor, WorkerPool};
pub use queue::{ImportQueue, JobReceiver};
pub use retry::RetryPolicy;
