//! Import job channel.

use ledgerbridge_core::import::ImportJob;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

/// Receiving half, consumed by [`WorkerPool::run`](crate::WorkerPool::run).
pub type JobReceiver = UnboundedReceiver<ImportJob>;

/// Publishing half of the import job channel.
#[derive(Debug, Clone)]
pub struct ImportQueue {
    tx: UnboundedSender<ImportJob>,
}

impl ImportQueue {
    /// Creates a queue and its receiver.
    #[must_use]
    pub fn channel() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes a job without waiting for it to run.
    ///
    /// Returns false if the pool has shut down. The run stays `queued`.
    pub fn dispatch(&self, job: ImportJob) -> bool {
        match self.tx.send(job) {
            Ok(()) => {
                debug!(run_id = %job.run_id, attempt = job.attempt, "Import job queued");
                true
            }
            Err(_) => {
                error!(
                    run_id = %job.run_id,
                    tenant_id = %job.tenant_id,
                    "Import queue closed, job dropped"
                );
                false
            }
        }
    }
}
