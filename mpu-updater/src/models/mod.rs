//! Data models for the batch updater
//!
//! - Lookup table entries (SPU → product + SKUs)
//! - Update rows and per-row outcomes
//! - Run statistics and progress snapshots

pub mod lookup;
pub mod outcome;
pub mod progress;
pub mod statistics;
pub mod update_row;

pub use lookup::{LookupEntry, LookupTable};
pub use outcome::{OperationKind, UpdateOutcome, NOT_FOUND_PRODUCT_ID, UNKNOWN_PRODUCT_ID};
pub use progress::{ProgressSnapshot, ProgressState};
pub use statistics::{RunStatistics, StatisticsRecorder};
pub use update_row::{UpdateKind, UpdateRow};
