//! Bounded execution of pipeline runs on blocking workers.
//!
//! A pipeline run is CPU-bound and synchronous. [`PipelineExecutor`] moves
//! each run onto tokio's blocking pool and caps how many run at once, so a
//! burst of uploads cannot starve the tasks that handle requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::core::pipeline::InsightPipeline;
use crate::error::{InsightError, Result};
use crate::insight::Insight;
use crate::table::RawTable;

/// What to do with a submission when every slot is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for a slot to free up
    #[default]
    Queue,
    /// Fail immediately with [`InsightError::CapacityExceeded`]
    Reject,
}

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of concurrent runs (default: number of CPUs)
    pub max_concurrent_runs: usize,
    /// Behavior when the limit is reached (default: queue)
    pub overflow_policy: OverflowPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: num_cpus::get().max(1),
            overflow_policy: OverflowPolicy::Queue,
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_concurrent_runs(mut self, limit: usize) -> Self {
        self.max_concurrent_runs = limit;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

/// Point-in-time view of the executor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Runs pipelines concurrently under a fixed limit.
///
/// Cloning is cheap; clones share the limit and the counters.
///
/// # Example
///
/// ```rust
/// use insight_core::config::PipelineConfig;
/// use insight_core::core::{ExecutorConfig, InsightPipeline, PipelineExecutor};
/// use insight_core::table::RawTable;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = InsightPipeline::new(PipelineConfig::default()).unwrap();
/// let executor = PipelineExecutor::new(pipeline, ExecutorConfig::default()).unwrap();
///
/// let mut builder = RawTable::builder(["amount"]);
/// for i in 0..20 {
///     builder = builder.row([i as f64]);
/// }
/// let insight = executor.submit(builder.build().unwrap()).await.unwrap();
/// assert_eq!(insight.total_records, 20);
/// assert_eq!(executor.stats().completed, 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    pipeline: Arc<InsightPipeline>,
    permits: Arc<Semaphore>,
    config: ExecutorConfig,
    counters: Arc<Counters>,
}

impl PipelineExecutor {
    pub fn new(pipeline: InsightPipeline, config: ExecutorConfig) -> Result<Self> {
        if config.max_concurrent_runs == 0 {
            return Err(InsightError::invalid_config(
                "max_concurrent_runs must be at least 1",
            ));
        }
        Ok(Self {
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            config,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Number of free slots right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.counters.snapshot()
    }

    /// Runs the pipeline over `table` on a blocking worker.
    pub async fn submit(&self, table: RawTable) -> Result<Insight> {
        let (_keep_open, never) = watch::channel(false);
        self.submit_with_cancel(table, never).await
    }

    /// Like [`submit`](Self::submit), but gives up with
    /// [`InsightError::Cancelled`] as soon as `cancel` turns `true`.
    ///
    /// A cancelled run may still finish on its worker; its result is dropped.
    #[instrument(skip_all, fields(rows = table.row_count()))]
    pub async fn submit_with_cancel(
        &self,
        table: RawTable,
        cancel: watch::Receiver<bool>,
    ) -> Result<Insight> {
        self.submit_deferred(move || Ok(table), cancel).await
    }

    /// Runs the pipeline over the table produced by `load`.
    ///
    /// `load` runs on the blocking worker after a slot is acquired, so at most
    /// `max_concurrent_runs` uploads are decoded and held in memory at once.
    /// A load failure counts as a failed run. Cancellation behaves as in
    /// [`submit_with_cancel`](Self::submit_with_cancel).
    #[instrument(skip_all)]
    pub async fn submit_deferred<F>(
        &self,
        load: F,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Insight>
    where
        F: FnOnce() -> Result<RawTable> + Send + 'static,
    {
        Counters::bump(&self.counters.submitted);

        if *cancel.borrow() {
            Counters::bump(&self.counters.cancelled);
            return Err(InsightError::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancel) => {
                Counters::bump(&self.counters.cancelled);
                return Err(InsightError::Cancelled);
            }
            permit = self.acquire() => permit?,
        };

        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let table = load()?;
            debug!(rows = table.row_count(), "Loaded upload");
            pipeline.run(&table)
        });

        let outcome = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancel) => {
                debug!("Run cancelled while in flight");
                Counters::bump(&self.counters.cancelled);
                return Err(InsightError::Cancelled);
            }
            joined = handle => joined
                .map_err(|e| InsightError::internal(format!("pipeline worker failed: {e}")))
                .and_then(|result| result),
        };

        match &outcome {
            Ok(_) => Counters::bump(&self.counters.completed),
            Err(e) => {
                debug!(error = %e, "Run failed");
                Counters::bump(&self.counters.failed);
            }
        }
        outcome
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        match self.config.overflow_policy {
            OverflowPolicy::Queue => Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| InsightError::internal("executor semaphore closed")),
            OverflowPolicy::Reject => {
                Arc::clone(&self.permits).try_acquire_owned().map_err(|_| {
                    warn!(
                        limit = self.config.max_concurrent_runs,
                        "Rejecting run at capacity"
                    );
                    Counters::bump(&self.counters.rejected);
                    InsightError::CapacityExceeded {
                        limit: self.config.max_concurrent_runs,
                    }
                })
            }
        }
    }
}

/// Resolves once the flag turns `true`. Pends forever if the sender is
/// dropped without cancelling.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
