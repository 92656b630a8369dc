//! HTTP API handlers for mpu-updater
//!
//! JSON job-status surface plus an SSE stream of job events.

pub mod health;
pub mod jobs;
pub mod sse;

pub use health::health_routes;
pub use jobs::job_routes;
pub use sse::job_event_stream;
