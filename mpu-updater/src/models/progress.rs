//! Progress tracking
//!
//! [`ProgressSnapshot`] is computed by the coordinator after every finished
//! row. [`ProgressState`] is the job-level view kept by the job registry.

use super::{RunStatistics, UpdateKind};
use chrono::{DateTime, Utc};
use mpu_common::events::RunStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Point-in-time progress of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    /// Rows per second since the run started
    pub current_rate: f64,
    /// Estimated time remaining; 0.0 when the rate is unknown
    pub eta_seconds: f64,
    /// Adaptive inter-request delay currently in effect
    pub current_delay_ms: f64,
}

impl ProgressSnapshot {
    /// Derive rate and ETA from counters and the fixed run start
    pub fn compute(
        stats: &RunStatistics,
        total: usize,
        elapsed: Duration,
        current_delay: Duration,
    ) -> Self {
        let processed = stats.total_processed;
        let elapsed_seconds = elapsed.as_secs_f64();
        let current_rate = if elapsed_seconds > 0.0 {
            processed as f64 / elapsed_seconds
        } else {
            0.0
        };
        let remaining = total.saturating_sub(processed);
        let eta_seconds = if current_rate > 0.0 {
            remaining as f64 / current_rate
        } else {
            0.0
        };

        Self {
            processed,
            total,
            successful: stats.successful,
            failed: stats.failed,
            elapsed_seconds,
            current_rate,
            eta_seconds,
            current_delay_ms: current_delay.as_secs_f64() * 1000.0,
        }
    }

    /// Percentage complete (0.0 - 100.0)
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            (self.processed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn eta_minutes(&self) -> f64 {
        self.eta_seconds / 60.0
    }
}

/// Job status as exposed by the job-status API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    pub job_id: Uuid,
    pub status: RunStatus,
    pub update_type: UpdateKind,
    pub input_file: PathBuf,
    /// Percentage complete (0.0 - 100.0)
    pub progress: f64,
    pub processed: usize,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub current_rate: f64,
    pub eta_minutes: f64,
    pub current_delay_ms: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_stats: Option<RunStatistics>,
}

impl ProgressState {
    pub fn new(job_id: Uuid, update_type: UpdateKind, input_file: PathBuf) -> Self {
        Self {
            job_id,
            status: RunStatus::Starting,
            update_type,
            input_file,
            progress: 0.0,
            processed: 0,
            total: 0,
            successful: 0,
            failed: 0,
            current_rate: 0.0,
            eta_minutes: 0.0,
            current_delay_ms: 0.0,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            report_file: None,
            stats_file: None,
            final_stats: None,
        }
    }

    /// Transition to a new status; terminal states stamp `ended_at`
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        if status.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &ProgressSnapshot) {
        self.processed = snapshot.processed;
        self.total = snapshot.total;
        self.successful = snapshot.successful;
        self.failed = snapshot.failed;
        self.progress = snapshot.percent();
        self.current_rate = snapshot.current_rate;
        self.eta_minutes = snapshot.eta_minutes();
        self.current_delay_ms = snapshot.current_delay_ms;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
