//! Run statistics
//!
//! One [`StatisticsRecorder`] per run, shared by `Arc`. Every counter lives
//! behind the same mutex so `successful + failed == total_processed` holds
//! whenever the lock is released.

use super::{OperationKind, UpdateOutcome};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters for one run (also the JSON statistics snapshot format)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Rows with a recorded outcome
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful per-variant updates
    pub sku_updates: usize,
    /// Successful whole-item updates
    pub direct_updates: usize,
    /// Update calls that ended in a non-success response or transport fault
    pub remote_failures: usize,
    pub lookup_failures: usize,
    pub validation_failures: usize,
    pub processing_failures: usize,
    /// Sum of `retry_count` over all outcomes
    pub total_retries: usize,
    /// Individual attempts answered with a rate-limit response
    pub rate_limited_attempts: usize,
}

impl RunStatistics {
    /// Success rate in percent; 0.0 when nothing was processed
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_processed as f64 * 100.0
        }
    }

    /// Success rate for display: `"97.5%"`, or `"0%"` for an empty run
    pub fn success_rate_display(&self) -> String {
        if self.total_processed == 0 {
            "0%".to_string()
        } else {
            format!("{:.1}%", self.success_rate())
        }
    }

    fn apply(&mut self, outcome: &UpdateOutcome) {
        self.total_processed += 1;
        self.total_retries += outcome.retry_count as usize;

        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }

        match (outcome.operation, outcome.success) {
            (OperationKind::VariantUpdate, true) => self.sku_updates += 1,
            (OperationKind::WholeItemUpdate, true) => self.direct_updates += 1,
            (OperationKind::VariantUpdate | OperationKind::WholeItemUpdate, false) => {
                self.remote_failures += 1
            }
            (OperationKind::LookupFailure, _) => self.lookup_failures += 1,
            (OperationKind::ValidationFailure, _) => self.validation_failures += 1,
            (OperationKind::ProcessingFailure, _) => self.processing_failures += 1,
        }
    }
}

/// Thread-safe statistics container for one run
#[derive(Debug, Default)]
pub struct StatisticsRecorder {
    inner: Mutex<RunStatistics>,
}

impl StatisticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunStatistics> {
        // Counters stay meaningful even if a holder panicked mid-update
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one finished row; returns the counters right after the update
    pub fn record_outcome(&self, outcome: &UpdateOutcome) -> RunStatistics {
        let mut stats = self.lock();
        stats.apply(outcome);
        stats.clone()
    }

    /// Count one rate-limited attempt (called from workers mid-retry)
    pub fn record_rate_limited(&self) {
        self.lock().rate_limited_attempts += 1;
    }

    /// Rows with a recorded outcome so far
    pub fn processed_count(&self) -> usize {
        self.lock().total_processed
    }

    /// Immutable copy of the current counters
    pub fn snapshot(&self) -> RunStatistics {
        self.lock().clone()
    }
}
