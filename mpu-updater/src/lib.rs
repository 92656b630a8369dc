//! mpu-updater library interface
//!
//! Batch price/inventory updates for marketplace products: the batch engine
//! (`services`), its data model (`models`), configuration, and the
//! job-status HTTP API used by `mpu-updater serve`.

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::config::UpdaterConfig;
use crate::jobs::JobRegistry;
use crate::services::ProductApi;
use axum::Router;
use chrono::{DateTime, Utc};
use mpu_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UpdaterConfig>,
    /// Marketplace client used by every job
    pub api: Arc<dyn ProductApi>,
    pub jobs: Arc<JobRegistry>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: UpdaterConfig, api: Arc<dyn ProductApi>, event_bus: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            api,
            jobs: Arc::new(JobRegistry::new()),
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::job_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
