//! Worker loop.
//!
//! Each job runs on its own task while holding a semaphore permit. Results
//! come back to the loop, which publishes rate-limited jobs again after the
//! backoff delay. On shutdown the loop stops taking jobs and waits for the
//! running ones. Pending retries are dropped; their runs stay `running` and
//! are dispatched again by startup recovery.

use std::sync::Arc;

use async_trait::async_trait;
use ledgerbridge_core::import::{ImportError, ImportJob, ImportOrchestrator, ImportOutcome};
use ledgerbridge_shared::config::WorkerConfig;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::queue::{ImportQueue, JobReceiver};
use crate::retry::RetryPolicy;

/// Executes one import job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Runs the job to a decision, or returns the error that stopped it.
    async fn execute(&self, job: ImportJob) -> Result<ImportOutcome, ImportError>;
}

#[async_trait]
impl JobExecutor for ImportOrchestrator {
    async fn execute(&self, job: ImportJob) -> Result<ImportOutcome, ImportError> {
        ImportOrchestrator::execute(self, job).await
    }
}

type JobResult = (ImportJob, Result<ImportOutcome, ImportError>);

/// Bounded pool draining the import queue.
#[derive(Clone)]
pub struct WorkerPool {
    executor: Arc<dyn JobExecutor>,
    queue: ImportQueue,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Creates a pool. `queue` is used to publish retries.
    #[must_use]
    pub fn new(
        executor: Arc<dyn JobExecutor>,
        queue: ImportQueue,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            executor,
            queue,
            policy,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Creates a pool from worker configuration.
    #[must_use]
    pub fn from_config(
        executor: Arc<dyn JobExecutor>,
        queue: ImportQueue,
        config: &WorkerConfig,
    ) -> Self {
        Self::new(
            executor,
            queue,
            RetryPolicy::from_config(config),
            config.concurrency,
        )
    }

    /// Spawns [`run`](Self::run) onto the runtime.
    pub fn spawn(self, jobs: JobReceiver, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(jobs, shutdown))
    }

    /// Drains `jobs` until the channel closes or `shutdown` flips to true,
    /// then waits for every job already started.
    pub async fn run(self, mut jobs: JobReceiver, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.permits.available_permits(),
            max_attempts = self.policy.max_attempts,
            "Import worker pool started"
        );

        let mut running: JoinSet<JobResult> = JoinSet::new();
        let mut retries: JoinSet<ImportJob> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                job = jobs.recv() => {
                    let Some(job) = job else {
                        break;
                    };
                    let Ok(permit) = self.permits.clone().acquire_owned().await else {
                        break;
                    };
                    let executor = self.executor.clone();
                    running.spawn(async move {
                        let result = executor.execute(job).await;
                        drop(permit);
                        (job, result)
                    });
                }
                Some(done) = running.join_next(), if !running.is_empty() => {
                    if let Some((job, delay)) = self.handle_result(done) {
                        retries.spawn(async move {
                            tokio::time::sleep(delay).await;
                            job
                        });
                    }
                }
                Some(due) = retries.join_next(), if !retries.is_empty() => {
                    if let Ok(job) = due {
                        self.queue.dispatch(job);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if !retries.is_empty() {
            warn!(
                pending = retries.len(),
                "Dropping scheduled retries, runs are recovered on next start"
            );
            retries.abort_all();
        }
        if !running.is_empty() {
            info!(in_flight = running.len(), "Waiting for running import jobs");
        }
        while let Some(done) = running.join_next().await {
            if let Some((job, _)) = self.handle_result(done) {
                warn!(
                    run_id = %job.run_id,
                    tenant_id = %job.tenant_id,
                    "Retry not scheduled during shutdown, run is recovered on next start"
                );
            }
        }

        info!("Import worker pool stopped");
    }

    /// Logs a finished job. Returns the next attempt and its delay when the
    /// job should be retried.
    fn handle_result(
        &self,
        done: Result<JobResult, JoinError>,
    ) -> Option<(ImportJob, std::time::Duration)> {
        let (job, result) = match done {
            Ok(done) => done,
            Err(err) => {
                error!(error = %err, "Import job task aborted");
                return None;
            }
        };

        match result {
            Ok(ImportOutcome::Succeeded {
                snapshot_id,
                line_count,
            }) => {
                info!(
                    run_id = %job.run_id,
                    tenant_id = %job.tenant_id,
                    %snapshot_id,
                    line_count,
                    "Import job completed"
                );
                None
            }
            Ok(ImportOutcome::Failed { reason }) => {
                warn!(run_id = %job.run_id, tenant_id = %job.tenant_id, %reason, "Import job failed");
                None
            }
            Ok(ImportOutcome::Skipped(status)) => {
                info!(run_id = %job.run_id, %status, "Import job skipped");
                None
            }
            Err(err) if err.is_retryable() => self.retry_for(job, &err),
            Err(err) => {
                error!(
                    run_id = %job.run_id,
                    tenant_id = %job.tenant_id,
                    attempt = job.attempt,
                    error = %err,
                    "Import job errored"
                );
                None
            }
        }
    }

    fn retry_for(
        &self,
        job: ImportJob,
        err: &ImportError,
    ) -> Option<(ImportJob, std::time::Duration)> {
        if !self.policy.allows_retry(job.attempt) {
            error!(
                run_id = %job.run_id,
                tenant_id = %job.tenant_id,
                attempt = job.attempt,
                error = %err,
                "Import job retries exhausted, run left running"
            );
            return None;
        }

        let delay = self.policy.delay_for(job.attempt);
        warn!(
            run_id = %job.run_id,
            tenant_id = %job.tenant_id,
            attempt = job.attempt,
            delay_secs = delay.as_secs(),
            "Import job rate limited, retry scheduled"
        );
        Some((job.next_attempt(), delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ledgerbridge_core::qbo::ProviderError;
    use ledgerbridge_shared::types::{ImportRunId, SnapshotId, TenantId};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    /// Rate limits the first `throttled` attempts of every job, then succeeds.
    struct ScriptedExecutor {
        throttled: u32,
        calls: mpsc::UnboundedSender<(ImportJob, Instant)>,
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn execute(&self, job: ImportJob) -> Result<ImportOutcome, ImportError> {
            let _ = self.calls.send((job, Instant::now()));
            if job.attempt <= self.throttled {
                return Err(ImportError::Provider(ProviderError::RateLimited));
            }
            Ok(ImportOutcome::Succeeded {
                snapshot_id: SnapshotId::new(),
                line_count: 2,
            })
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
        }
    }

    fn start(
        executor: Arc<dyn JobExecutor>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> (ImportQueue, watch::Sender<bool>) {
        let (queue, rx) = ImportQueue::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        WorkerPool::new(executor, queue.clone(), policy, concurrency).spawn(rx, shutdown_rx);
        (queue, shutdown_tx)
    }

    fn job() -> ImportJob {
        ImportJob::first(ImportRunId::new(), TenantId::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_job_is_retried_with_backoff() {
        let (calls_tx, mut calls) = mpsc::unbounded_channel();
        let executor = Arc::new(ScriptedExecutor {
            throttled: 2,
            calls: calls_tx,
        });
        let (queue, _shutdown) = start(executor, policy(5), 2);

        queue.dispatch(job());

        let (first, t1) = calls.recv().await.unwrap();
        let (second, t2) = calls.recv().await.unwrap();
        let (third, t3) = calls.recv().await.unwrap();

        assert_eq!(
            [first.attempt, second.attempt, third.attempt],
            [1, 2, 3]
        );
        assert!(t2 - t1 >= Duration::from_secs(60));
        assert!(t2 - t1 < Duration::from_secs(61));
        assert!(t3 - t2 >= Duration::from_secs(120));
        assert!(t3 - t2 < Duration::from_secs(121));
        assert_eq!(first.run_id, third.run_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_after_max_attempts() {
        let (calls_tx, mut calls) = mpsc::unbounded_channel();
        let executor = Arc::new(ScriptedExecutor {
            throttled: u32::MAX,
            calls: calls_tx,
        });
        let (queue, _shutdown) = start(executor, policy(3), 1);

        queue.dispatch(job());

        for expected in 1..=3 {
            let (seen, _) = calls.recv().await.unwrap();
            assert_eq!(seen.attempt, expected);
        }
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert!(calls.try_recv().is_err());
    }

    struct FailingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobExecutor for FailingExecutor {
        async fn execute(&self, _job: ImportJob) -> Result<ImportOutcome, ImportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ImportError::Store("connection reset".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_errors_are_not_retried() {
        let executor = Arc::new(FailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let (queue, _shutdown) = start(executor.clone(), policy(5), 1);

        queue.dispatch(job());
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    struct SlowExecutor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        done: Mutex<Vec<ImportJob>>,
    }

    #[async_trait]
    impl JobExecutor for SlowExecutor {
        async fn execute(&self, job: ImportJob) -> Result<ImportOutcome, ImportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.done.lock().unwrap().push(job);
            Ok(ImportOutcome::Failed {
                reason: "done".into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let executor = Arc::new(SlowExecutor {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            done: Mutex::new(Vec::new()),
        });
        let (queue, _shutdown) = start(executor.clone(), policy(5), 2);

        for _ in 0..5 {
            queue.dispatch(job());
        }
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(executor.done.lock().unwrap().len(), 5);
        assert_eq!(executor.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_running_jobs() {
        let executor = Arc::new(SlowExecutor {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            done: Mutex::new(Vec::new()),
        });
        let (queue, rx) = ImportQueue::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            WorkerPool::new(executor.clone(), queue.clone(), policy(5), 2).spawn(rx, shutdown_rx);

        queue.dispatch(job());
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(executor.done.lock().unwrap().len(), 1);
        assert_eq!(executor.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending_retries() {
        let (calls_tx, mut calls) = mpsc::unbounded_channel();
        let executor = Arc::new(ScriptedExecutor {
            throttled: 1,
            calls: calls_tx,
        });
        let (queue, rx) = ImportQueue::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            WorkerPool::new(executor, queue.clone(), policy(5), 1).spawn(rx, shutdown_rx);

        queue.dispatch(job());
        let (first, _) = calls.recv().await.unwrap();
        assert_eq!(first.attempt, 1);
        tokio::time::sleep(Duration::from_secs(1)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(calls.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let executor = Arc::new(FailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let (queue, rx) = ImportQueue::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            WorkerPool::new(executor.clone(), queue.clone(), policy(5), 1).spawn(rx, shutdown_rx);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(!queue.dispatch(job()));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
