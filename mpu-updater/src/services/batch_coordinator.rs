//! Batch coordinator
//!
//! Drives one run: `Starting → LoadingLookup → Processing → Completed | Error`.
//!
//! Rows are read in chunks; each chunk is finished before the next is read.
//! Inside a chunk a fixed number of worker slots is kept busy: `workers`
//! tasks are seeded and a new one is spawned each time one completes.
//! Outcomes are collected in completion order, not input order.

use crate::models::{
    LookupTable, ProgressSnapshot, RunStatistics, StatisticsRecorder, UpdateKind, UpdateOutcome,
    UpdateRow,
};
use crate::services::adaptive_delay::AdaptiveDelay;
use crate::services::input_reader::{count_rows, InputReader, InputRecord};
use crate::services::lookup_loader::load_lookup_table;
use crate::services::product_api::ProductApi;
use crate::services::update_executor::{ExecutorSettings, UpdateExecutor};
use futures::stream::{FuturesUnordered, StreamExt};
use mpu_common::events::RunStatus;
use mpu_common::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rows between periodic progress log lines
const PROGRESS_LOG_INTERVAL: usize = 100;

/// Tunables for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Concurrent worker slots (at least 1)
    pub workers: usize,
    /// Rows read per chunk; `None` reads the whole file as one chunk
    pub chunk_size: Option<usize>,
    /// Starting inter-request delay
    pub initial_delay: Duration,
    /// Let rate-limit/success feedback move the delay
    pub adaptive_delay: bool,
    pub executor: ExecutorSettings,
}

impl BatchSettings {
    pub fn for_kind(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Price => Self {
                workers: 50,
                chunk_size: Some(10_000),
                initial_delay: Duration::from_millis(10),
                adaptive_delay: true,
                executor: ExecutorSettings::for_kind(kind),
            },
            UpdateKind::Inventory => Self {
                workers: 10,
                chunk_size: None,
                initial_delay: Duration::ZERO,
                adaptive_delay: false,
                executor: ExecutorSettings::for_kind(kind),
            },
        }
    }
}

/// Progress hooks, called synchronously from the coordinator task
pub trait ProgressObserver: Send + Sync {
    fn on_status_changed(&self, _status: RunStatus, _detail: Option<&str>) {}

    /// Called exactly once per finished row, after statistics are updated
    fn on_row_completed(&self, _snapshot: &ProgressSnapshot, _outcome: &UpdateOutcome) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub update_kind: UpdateKind,
    /// Completion order
    pub outcomes: Vec<UpdateOutcome>,
    pub statistics: RunStatistics,
    pub total_rows: usize,
    pub elapsed: Duration,
}

struct RunContext {
    executor: Arc<UpdateExecutor>,
    stats: Arc<StatisticsRecorder>,
    delay: Arc<AdaptiveDelay>,
    total: usize,
    started: Instant,
}

/// Runs batches of one update kind against a [`ProductApi`]
pub struct BatchCoordinator {
    kind: UpdateKind,
    api: Arc<dyn ProductApi>,
    settings: BatchSettings,
    observer: Arc<dyn ProgressObserver>,
}

impl BatchCoordinator {
    pub fn new(kind: UpdateKind, api: Arc<dyn ProductApi>, settings: BatchSettings) -> Self {
        Self {
            kind,
            api,
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    fn set_status(&self, status: RunStatus, detail: Option<&str>) {
        tracing::debug!(kind = %self.kind, status = %status, "Run status changed");
        self.observer.on_status_changed(status, detail);
    }

    fn fail<T>(&self, error: Error) -> Result<T> {
        let message = error.to_string();
        tracing::error!(kind = %self.kind, error = %message, "Batch run failed");
        self.set_status(RunStatus::Error, Some(&message));
        Err(error)
    }

    /// Load the lookup file, then process every row of `input_path`
    pub async fn run(&self, lookup_path: &Path, input_path: &Path) -> Result<BatchRun> {
        self.set_status(RunStatus::Starting, None);
        self.set_status(RunStatus::LoadingLookup, None);

        let path = lookup_path.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || load_lookup_table(&path))
            .await
            .map_err(|e| Error::Internal(format!("Lookup loading task failed: {}", e)));

        match loaded {
            Ok(Ok(lookup)) => self.process(Arc::new(lookup), input_path).await,
            Ok(Err(e)) | Err(e) => self.fail(e),
        }
    }

    /// Process `input_path` against an already loaded lookup table
    pub async fn run_with_lookup(
        &self,
        lookup: Arc<LookupTable>,
        input_path: &Path,
    ) -> Result<BatchRun> {
        self.set_status(RunStatus::Starting, None);
        self.process(lookup, input_path).await
    }

    async fn process(&self, lookup: Arc<LookupTable>, input_path: &Path) -> Result<BatchRun> {
        let input = input_path.to_path_buf();
        let counted = tokio::task::spawn_blocking(move || count_rows(&input))
            .await
            .map_err(|e| Error::Internal(format!("Row counting task failed: {}", e)));
        let total = match counted {
            Ok(Ok(total)) => total,
            Ok(Err(e)) | Err(e) => return self.fail(e),
        };

        let mut reader = match InputReader::open(input_path, self.kind) {
            Ok(reader) => reader,
            Err(e) => return self.fail(e),
        };

        self.set_status(RunStatus::Processing, None);
        tracing::info!(
            kind = %self.kind,
            total,
            workers = self.settings.workers,
            chunk_size = ?self.settings.chunk_size,
            lookup_entries = lookup.len(),
            "Starting batch update"
        );

        let stats = Arc::new(StatisticsRecorder::new());
        let delay = Arc::new(AdaptiveDelay::new(
            self.settings.initial_delay,
            self.settings.adaptive_delay,
        ));
        let executor = Arc::new(UpdateExecutor::new(
            self.kind,
            Arc::clone(&self.api),
            lookup,
            Arc::clone(&delay),
            Arc::clone(&stats),
            self.settings.executor.clone(),
        ));
        let ctx = RunContext {
            executor,
            stats,
            delay,
            total,
            started: Instant::now(),
        };

        let chunk_size = self.settings.chunk_size.unwrap_or(usize::MAX).max(1);
        let mut outcomes = Vec::with_capacity(total);
        let mut chunk_index = 0usize;

        loop {
            let read = tokio::task::spawn_blocking(move || {
                let chunk = reader.next_chunk(chunk_size);
                (reader, chunk)
            })
            .await;
            let chunk = match read {
                Ok((returned, chunk)) => {
                    reader = returned;
                    chunk
                }
                Err(e) => {
                    return self.fail(Error::Internal(format!("Input reading task failed: {}", e)))
                }
            };
            if chunk.is_empty() {
                break;
            }

            chunk_index += 1;
            tracing::debug!(chunk = chunk_index, rows = chunk.len(), "Processing chunk");
            self.process_chunk(chunk, &ctx, &mut outcomes).await;
        }

        let statistics = ctx.stats.snapshot();
        let elapsed = ctx.started.elapsed();
        tracing::info!(
            kind = %self.kind,
            processed = statistics.total_processed,
            successful = statistics.successful,
            failed = statistics.failed,
            success_rate = %statistics.success_rate_display(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Batch update completed"
        );
        self.set_status(RunStatus::Completed, None);

        Ok(BatchRun {
            update_kind: self.kind,
            outcomes,
            statistics,
            total_rows: total,
            elapsed,
        })
    }

    async fn process_chunk(
        &self,
        chunk: Vec<InputRecord>,
        ctx: &RunContext,
        outcomes: &mut Vec<UpdateOutcome>,
    ) {
        let workers = self.settings.workers.max(1);

        let spawn_row = |row: UpdateRow| {
            let executor = Arc::clone(&ctx.executor);
            let row_number = row.row_number;
            let spu_id = row.spu_id.clone();
            let handle = tokio::spawn(async move { executor.execute(&row).await });
            async move { (row_number, spu_id, handle.await) }
        };

        let mut records = chunk.into_iter();
        let mut tasks = FuturesUnordered::new();

        loop {
            while tasks.len() < workers {
                match records.next() {
                    Some(Ok(row)) => tasks.push(spawn_row(row)),
                    Some(Err(unreadable)) => {
                        tracing::warn!(row = unreadable.row_number, error = %unreadable.message, "Unreadable input row");
                        let outcome = UpdateOutcome::validation_failure(
                            unreadable.row_number,
                            "",
                            self.kind,
                            "",
                            unreadable.message,
                        );
                        self.complete(ctx, outcome, outcomes);
                    }
                    None => break,
                }
            }

            let Some((row_number, spu_id, joined)) = tasks.next().await else {
                break;
            };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(row = row_number, spu_id = %spu_id, error = %e, "Worker task failed");
                    UpdateOutcome::processing_failure(
                        row_number,
                        &spu_id,
                        self.kind,
                        format!("Processing error: {}", e),
                    )
                }
            };
            self.complete(ctx, outcome, outcomes);
        }
    }

    fn complete(&self, ctx: &RunContext, outcome: UpdateOutcome, outcomes: &mut Vec<UpdateOutcome>) {
        let stats = ctx.stats.record_outcome(&outcome);
        let snapshot = ProgressSnapshot::compute(
            &stats,
            ctx.total,
            ctx.started.elapsed(),
            ctx.delay.current(),
        );

        if snapshot.processed % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(
                processed = snapshot.processed,
                total = snapshot.total,
                successful = snapshot.successful,
                failed = snapshot.failed,
                rows_per_sec = snapshot.current_rate,
                eta_minutes = snapshot.eta_minutes(),
                delay_ms = snapshot.current_delay_ms,
                "Progress"
            );
        }

        self.observer.on_row_completed(&snapshot, &outcome);
        outcomes.push(outcome);
    }
}
