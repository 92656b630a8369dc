//! Job endpoints
//!
//! - `POST /jobs` start a job for a CSV already on disk
//! - `GET /jobs` list jobs
//! - `GET /jobs/:id` job progress
//! - `GET /jobs/:id/report` and `GET /jobs/:id/stats` download a completed job's files
//! - `DELETE /jobs/:id` remove a finished job and its report files

use crate::error::{ApiError, ApiResult};
use crate::jobs::start_job;
use crate::models::{ProgressState, UpdateKind};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use mpu_common::events::RunStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// POST /jobs request body
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub input_file: PathBuf,
    /// "price" or "inventory"
    pub update_type: String,
}

/// POST /jobs response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub update_type: UpdateKind,
}

/// DELETE /jobs/:id response
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub job_id: Uuid,
    pub removed_files: Vec<PathBuf>,
}

/// POST /jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> ApiResult<(StatusCode, Json<StartJobResponse>)> {
    let kind: UpdateKind = request.update_type.parse().map_err(ApiError::BadRequest)?;

    if !request.input_file.is_file() {
        return Err(ApiError::BadRequest(format!(
            "Input file not found: {}",
            request.input_file.display()
        )));
    }

    let job_id = start_job(
        &state.config,
        state.api.clone(),
        state.jobs.clone(),
        state.event_bus.clone(),
        kind,
        request.input_file,
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(StartJobResponse {
            job_id,
            update_type: kind,
        }),
    ))
}

/// GET /jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<ProgressState>> {
    Json(state.jobs.list())
}

/// GET /jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ProgressState>> {
    state
        .jobs
        .get(&job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))
}

/// Which of a job's report files to download
#[derive(Debug, Clone, Copy)]
enum ReportKind {
    Detail,
    Stats,
}

impl ReportKind {
    fn content_type(&self) -> &'static str {
        match self {
            ReportKind::Detail => "text/csv; charset=utf-8",
            ReportKind::Stats => "application/json",
        }
    }
}

async fn download(state: &AppState, job_id: Uuid, kind: ReportKind) -> ApiResult<Response> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))?;

    if job.status != RunStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "Job {} is {}, reports are available once it completes",
            job_id, job.status
        )));
    }

    let path = match kind {
        ReportKind::Detail => job.report_file,
        ReportKind::Stats => job.stats_file,
    }
    .ok_or_else(|| ApiError::NotFound(format!("Job {} has no report file", job_id)))?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("Report file missing: {}", path.display()))
        } else {
            ApiError::Internal(format!("Failed to open {}: {}", path.display(), e))
        }
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}_report", job_id));

    Ok((
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// GET /jobs/:id/report
pub async fn download_report(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Response> {
    download(&state, job_id, ReportKind::Detail).await
}

/// GET /jobs/:id/stats
pub async fn download_stats(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Response> {
    download(&state, job_id, ReportKind::Stats).await
}

/// DELETE /jobs/:id
pub async fn cleanup_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CleanupResponse>> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))?;

    if !job.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Job {} is still {}",
            job_id, job.status
        )));
    }

    let mut removed_files = Vec::new();
    for path in [job.report_file, job.stats_file].into_iter().flatten() {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed_files.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ApiError::Internal(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    state.jobs.remove(&job_id);
    tracing::info!(job_id = %job_id, files = removed_files.len(), "Job cleaned up");

    Ok(Json(CleanupResponse {
        job_id,
        removed_files,
    }))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/events", get(super::job_event_stream))
        .route("/jobs/:id", get(get_job).delete(cleanup_job))
        .route("/jobs/:id/report", get(download_report))
        .route("/jobs/:id/stats", get(download_stats))
}
