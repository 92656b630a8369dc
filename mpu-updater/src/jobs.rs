//! Background update jobs
//!
//! A job is one batch run started through the HTTP API. Its
//! [`ProgressState`] lives in the [`JobRegistry`] and is fed by a
//! [`JobObserver`] attached to the coordinator; the same observer
//! publishes [`UpdaterEvent`]s on the event bus for SSE clients.
//!
//! `Completed` is recorded by the job runner once the reports are written,
//! so a completed job always carries its report paths.

use crate::config::UpdaterConfig;
use crate::models::{ProgressSnapshot, ProgressState, UpdateKind, UpdateOutcome};
use crate::services::{BatchCoordinator, ProductApi, ProgressObserver, ReportGenerator};
use chrono::Utc;
use mpu_common::events::{EventBus, RunStatus, UpdaterEvent};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Rows between progress events on the bus
const PROGRESS_EVENT_INTERVAL: usize = 10;

/// Job id → progress
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, ProgressState>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: ProgressState) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.job_id, state);
    }

    pub fn get(&self, job_id: &Uuid) -> Option<ProgressState> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Apply `f` to a job's state; returns false if the job is unknown
    pub fn update<F>(&self, job_id: &Uuid, f: F) -> bool
    where
        F: FnOnce(&mut ProgressState),
    {
        match self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(job_id)
        {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, job_id: &Uuid) -> Option<ProgressState> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<ProgressState> {
        let mut jobs: Vec<ProgressState> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    pub fn active_count(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|job| !job.is_terminal())
            .count()
    }
}

/// Feeds one job's registry entry and the event bus
pub struct JobObserver {
    job_id: Uuid,
    registry: Arc<JobRegistry>,
    event_bus: EventBus,
}

impl JobObserver {
    pub fn new(job_id: Uuid, registry: Arc<JobRegistry>, event_bus: EventBus) -> Self {
        Self {
            job_id,
            registry,
            event_bus,
        }
    }
}

impl ProgressObserver for JobObserver {
    fn on_status_changed(&self, status: RunStatus, detail: Option<&str>) {
        if status == RunStatus::Completed {
            return;
        }

        self.registry.update(&self.job_id, |state| {
            state.set_status(status);
            if status == RunStatus::Error {
                state.error = detail.map(str::to_string);
            }
        });

        self.event_bus.emit_lossy(UpdaterEvent::JobStatusChanged {
            job_id: self.job_id,
            status,
            timestamp: Utc::now(),
        });
        if status == RunStatus::Error {
            self.event_bus.emit_lossy(UpdaterEvent::JobFailed {
                job_id: self.job_id,
                error: detail.unwrap_or("unknown error").to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn on_row_completed(&self, snapshot: &ProgressSnapshot, _outcome: &UpdateOutcome) {
        self.registry
            .update(&self.job_id, |state| state.apply_snapshot(snapshot));

        if snapshot.processed % PROGRESS_EVENT_INTERVAL == 0 || snapshot.processed == snapshot.total {
            self.event_bus.emit_lossy(UpdaterEvent::JobProgress {
                job_id: self.job_id,
                processed: snapshot.processed,
                total: snapshot.total,
                successful: snapshot.successful,
                failed: snapshot.failed,
                current_rate: snapshot.current_rate,
                eta_minutes: snapshot.eta_minutes(),
                timestamp: Utc::now(),
            });
        }
    }
}

/// Register a job and run it in the background
pub fn start_job(
    config: &UpdaterConfig,
    api: Arc<dyn ProductApi>,
    registry: Arc<JobRegistry>,
    event_bus: EventBus,
    kind: UpdateKind,
    input_file: PathBuf,
) -> Uuid {
    let job_id = Uuid::new_v4();
    registry.insert(ProgressState::new(job_id, kind, input_file.clone()));

    let observer = Arc::new(JobObserver::new(
        job_id,
        Arc::clone(&registry),
        event_bus.clone(),
    ));
    let coordinator =
        BatchCoordinator::new(kind, api, config.batch_settings(kind)).with_observer(observer);
    let lookup_file = config.lookup_file.clone();
    let reports = ReportGenerator::new(config.output_dir.clone()).with_prefix(job_id.to_string());

    tracing::info!(job_id = %job_id, kind = %kind, input = %input_file.display(), "Starting update job");

    tokio::spawn(async move {
        let run = match coordinator.run(&lookup_file, &input_file).await {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Update job failed");
                return;
            }
        };

        let written = tokio::task::spawn_blocking(move || {
            reports.generate(&run).map(|report| (run.statistics, report))
        })
        .await;

        match written {
            Ok(Ok((statistics, report))) => {
                tracing::info!(job_id = %job_id, "\n{}", report.summary);
                registry.update(&job_id, |state| {
                    state.report_file = Some(report.detail_path);
                    state.stats_file = Some(report.stats_path);
                    state.final_stats = Some(statistics.clone());
                    state.set_status(RunStatus::Completed);
                });
                event_bus.emit_lossy(UpdaterEvent::JobStatusChanged {
                    job_id,
                    status: RunStatus::Completed,
                    timestamp: Utc::now(),
                });
                event_bus.emit_lossy(UpdaterEvent::JobCompleted {
                    job_id,
                    total_processed: statistics.total_processed,
                    successful: statistics.successful,
                    failed: statistics.failed,
                    success_rate: statistics.success_rate(),
                    timestamp: Utc::now(),
                });
            }
            Ok(Err(e)) => fail_job(&registry, &event_bus, job_id, format!("Report generation failed: {}", e)),
            Err(e) => fail_job(&registry, &event_bus, job_id, format!("Report task failed: {}", e)),
        }
    });

    job_id
}

fn fail_job(registry: &JobRegistry, event_bus: &EventBus, job_id: Uuid, error: String) {
    tracing::error!(job_id = %job_id, error = %error, "Update job failed");
    registry.update(&job_id, |state| {
        state.error = Some(error.clone());
        state.set_status(RunStatus::Error);
    });
    event_bus.emit_lossy(UpdaterEvent::JobFailed {
        job_id,
        error,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatistics;
    use std::time::Duration;

    fn registry_with_job() -> (Arc<JobRegistry>, Uuid) {
        let registry = Arc::new(JobRegistry::new());
        let job_id = Uuid::new_v4();
        registry.insert(ProgressState::new(job_id, UpdateKind::Price, PathBuf::from("in.csv")));
        (registry, job_id)
    }

    #[test]
    fn test_registry_update_and_remove() {
        let (registry, job_id) = registry_with_job();
        assert_eq!(registry.active_count(), 1);

        assert!(registry.update(&job_id, |s| s.set_status(RunStatus::Completed)));
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.list().len(), 1);

        assert!(registry.remove(&job_id).is_some());
        assert!(registry.get(&job_id).is_none());
        assert!(!registry.update(&job_id, |_| {}));
    }

    #[tokio::test]
    async fn test_observer_updates_state_and_emits() {
        let (registry, job_id) = registry_with_job();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let observer = JobObserver::new(job_id, Arc::clone(&registry), bus.clone());

        observer.on_status_changed(RunStatus::Processing, None);
        let stats = RunStatistics {
            total_processed: 10,
            successful: 9,
            failed: 1,
            ..Default::default()
        };
        let snapshot =
            ProgressSnapshot::compute(&stats, 20, Duration::from_secs(5), Duration::ZERO);
        let outcome = UpdateOutcome::processing_failure(1, "x", UpdateKind::Price, "x".to_string());
        observer.on_row_completed(&snapshot, &outcome);

        let state = registry.get(&job_id).unwrap();
        assert_eq!(state.status, RunStatus::Processing);
        assert_eq!(state.processed, 10);
        assert_eq!(state.progress, 50.0);
        assert_eq!(state.current_rate, 2.0);

        assert_eq!(rx.recv().await.unwrap().event_type(), "JobStatusChanged");
        assert_eq!(rx.recv().await.unwrap().event_type(), "JobProgress");
    }

    #[test]
    fn test_observer_error_records_detail() {
        let (registry, job_id) = registry_with_job();
        let observer = JobObserver::new(job_id, Arc::clone(&registry), EventBus::new(4));

        observer.on_status_changed(RunStatus::Error, Some("lookup missing"));

        let state = registry.get(&job_id).unwrap();
        assert_eq!(state.status, RunStatus::Error);
        assert_eq!(state.error.as_deref(), Some("lookup missing"));
        assert!(state.ended_at.is_some());
    }

    #[test]
    fn test_observer_leaves_completion_to_runner() {
        let (registry, job_id) = registry_with_job();
        let observer = JobObserver::new(job_id, Arc::clone(&registry), EventBus::new(4));

        observer.on_status_changed(RunStatus::Completed, None);

        assert_eq!(registry.get(&job_id).unwrap().status, RunStatus::Starting);
    }
}
