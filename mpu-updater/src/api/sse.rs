//! Server-Sent Events for job progress

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /jobs/events
///
/// Streams JobStatusChanged, JobProgress, JobCompleted and JobFailed for
/// every job.
pub async fn job_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    mpu_common::sse::create_event_bus_sse_stream("mpu-updater", &state.event_bus)
}
