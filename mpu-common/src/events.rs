//! Event types for the updater event system
//!
//! Batch runs publish status and progress changes on an [`EventBus`]. The
//! job-status service forwards them to SSE clients; nothing in the batch
//! engine depends on anyone listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle status of one batch run
///
/// `Starting → LoadingLookup → Processing → {Completed | Error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run accepted, nothing loaded yet
    Starting,
    /// Reading the lookup table
    LoadingLookup,
    /// Rows are being dispatched to workers
    Processing,
    /// All rows have an outcome and reports are written
    Completed,
    /// Run aborted by a fatal error (missing file, bad header, ...)
    Error,
}

impl RunStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Starting => "starting",
            RunStatus::LoadingLookup => "loading_lookup",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Updater event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdaterEvent {
    /// A job moved to a new lifecycle status
    JobStatusChanged {
        job_id: Uuid,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },

    /// Periodic progress for a running job
    JobProgress {
        job_id: Uuid,
        processed: usize,
        total: usize,
        successful: usize,
        failed: usize,
        /// Rows per second since the run started
        current_rate: f64,
        eta_minutes: f64,
        timestamp: DateTime<Utc>,
    },

    /// Job finished and reports were written
    JobCompleted {
        job_id: Uuid,
        total_processed: usize,
        successful: usize,
        failed: usize,
        success_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// Job aborted
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl UpdaterEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            UpdaterEvent::JobStatusChanged { .. } => "JobStatusChanged",
            UpdaterEvent::JobProgress { .. } => "JobProgress",
            UpdaterEvent::JobCompleted { .. } => "JobCompleted",
            UpdaterEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            UpdaterEvent::JobStatusChanged { job_id, .. }
            | UpdaterEvent::JobProgress { job_id, .. }
            | UpdaterEvent::JobCompleted { job_id, .. }
            | UpdaterEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast event bus
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UpdaterEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<UpdaterEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: UpdaterEvent,
    ) -> Result<usize, broadcast::error::SendError<UpdaterEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: UpdaterEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
