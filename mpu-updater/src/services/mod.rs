//! Batch update services
//!
//! Leaf-first: CSV loading, row resolution, the product API collaborator,
//! per-row execution, run coordination and reporting.

mod csv_columns;

pub mod adaptive_delay;
pub mod batch_coordinator;
pub mod input_reader;
pub mod lookup_loader;
pub mod product_api;
pub mod report;
pub mod row_resolver;
pub mod update_executor;

pub use adaptive_delay::AdaptiveDelay;
pub use batch_coordinator::{
    BatchCoordinator, BatchRun, BatchSettings, NoopObserver, ProgressObserver,
};
pub use input_reader::{count_rows, validate_row, InputReader};
pub use lookup_loader::load_lookup_table;
pub use product_api::{
    ApiCredentials, ApiResponse, HttpProductApi, ProductApi, TransportError, UpdatePayload,
    UpdateRequest,
};
pub use report::{BatchReport, ReportGenerator};
pub use row_resolver::{resolve, LookupFailure, Resolution};
pub use update_executor::{ExecutorSettings, UpdateExecutor};
