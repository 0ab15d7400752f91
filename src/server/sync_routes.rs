//! Sync job submission and inspection routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::state::ServerState;
use super::views::{JobResultView, RunningJobView};
use crate::jobs::{JobPriority, SubmitOutcome, SyncJob, SyncJobType};
use crate::search_index::Partition;

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
struct SubmitJobBody {
    shop_id: String,
    job_type: String,
    job_id: Option<String>,
    priority: Option<String>,
    partitions: Option<Vec<String>>,
    triggered_by: Option<String>,
    max_retries: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SubmitJobResponse {
    job_id: String,
    /// "started", "already_running", "already_completed" or "rejected".
    status: String,
    reason: Option<String>,
    result: Option<JobResultView>,
}

#[derive(Debug, Serialize)]
struct JobStatusResponse {
    job_id: String,
    /// "running", "completed" or "failed".
    status: String,
    running: Option<RunningJobView>,
    result: Option<JobResultView>,
}

#[derive(Debug, Serialize)]
struct SyncStatusResponse {
    running_count: usize,
    capacity: usize,
    running_jobs: Vec<RunningJobView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /jobs - Submit a sync job for a shop
async fn submit_job(
    State(state): State<ServerState>,
    Json(body): Json<SubmitJobBody>,
) -> impl IntoResponse {
    let job_type = match SyncJobType::parse(&body.job_type) {
        Some(job_type) => job_type,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Unknown job type: {}", body.job_type),
            )
                .into_response();
        }
    };

    let mut job = SyncJob::new(body.shop_id.trim(), job_type);

    if let Some(job_id) = &body.job_id {
        if !job_id.trim().is_empty() {
            job = job.with_job_id(job_id.trim());
        }
    }

    if let Some(priority) = &body.priority {
        match JobPriority::parse(priority) {
            Some(priority) => job = job.with_priority(priority),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("Unknown priority: {}", priority),
                )
                    .into_response();
            }
        }
    }

    if let Some(partitions) = &body.partitions {
        let mut parsed = Vec::with_capacity(partitions.len());
        for name in partitions {
            match Partition::parse(name) {
                Some(partition) => parsed.push(partition),
                None => {
                    return (
                        StatusCode::BAD_REQUEST,
                        format!("Unknown partition: {}", name),
                    )
                        .into_response();
                }
            }
        }
        job = job.with_partitions(parsed);
    }

    if let Some(triggered_by) = &body.triggered_by {
        job = job.with_triggered_by(triggered_by.clone());
    }

    if let Some(max_retries) = body.max_retries {
        job = job.with_max_retries(max_retries);
    }

    // Jobs that call the platform need a registered shop. Teardown does not,
    // so it stays submittable after the registry row is gone.
    if job_type.needs_credentials() {
        match state.shop_store.get_shop(&job.shop_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    format!("Shop {} is not registered", job.shop_id),
                )
                    .into_response();
            }
            Err(err) => {
                error!("Shop lookup failed for {}: {:#}", job.shop_id, err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Shop lookup failed".to_string(),
                )
                    .into_response();
            }
        }
    }

    let job_id = job.job_id.clone();
    match state.dispatcher.begin(job) {
        SubmitOutcome::Started(_) => (
            StatusCode::ACCEPTED,
            Json(SubmitJobResponse {
                job_id,
                status: "started".to_string(),
                reason: None,
                result: None,
            }),
        )
            .into_response(),
        SubmitOutcome::Duplicate(_) => (
            StatusCode::ACCEPTED,
            Json(SubmitJobResponse {
                job_id,
                status: "already_running".to_string(),
                reason: None,
                result: None,
            }),
        )
            .into_response(),
        SubmitOutcome::AlreadyCompleted(result) => (
            StatusCode::OK,
            Json(SubmitJobResponse {
                job_id,
                status: "already_completed".to_string(),
                reason: None,
                result: Some(JobResultView::from(&result)),
            }),
        )
            .into_response(),
        SubmitOutcome::Rejected(result) => {
            let reason = result.error.as_ref().map(|e| e.kind()).unwrap_or("rejected");
            debug!("Job {} rejected: {}", job_id, reason);
            let status = match reason {
                "capacity_exceeded" => StatusCode::TOO_MANY_REQUESTS,
                "circuit_open" => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::CONFLICT,
            };
            (
                status,
                Json(SubmitJobResponse {
                    job_id,
                    status: "rejected".to_string(),
                    reason: Some(reason.to_string()),
                    result: Some(JobResultView::from(&result)),
                }),
            )
                .into_response()
        }
    }
}

/// GET /jobs/{job_id} - Inspect a running or settled job
async fn get_job(
    State(state): State<ServerState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    // Settled results win over the running table: a job settles and leaves
    // the table in one step, so checking history first never misses.
    if let Some(result) = state.dispatcher.result_for_job(&job_id) {
        let status = if result.success { "completed" } else { "failed" };
        return Json(JobStatusResponse {
            job_id,
            status: status.to_string(),
            running: None,
            result: Some(JobResultView::from(&result)),
        })
        .into_response();
    }

    let running = state
        .dispatcher
        .running_jobs()
        .into_iter()
        .find(|job| job.job_id == job_id);
    if let Some(info) = running {
        return Json(JobStatusResponse {
            job_id,
            status: "running".to_string(),
            running: Some(RunningJobView::from(&info)),
            result: None,
        })
        .into_response();
    }

    (StatusCode::NOT_FOUND, format!("No job {}", job_id)).into_response()
}

/// GET /status - Dispatcher occupancy
async fn get_sync_status(State(state): State<ServerState>) -> impl IntoResponse {
    let running_jobs: Vec<RunningJobView> = state
        .dispatcher
        .running_jobs()
        .iter()
        .map(RunningJobView::from)
        .collect();

    Json(SyncStatusResponse {
        running_count: running_jobs.len(),
        capacity: state.dispatcher.capacity(),
        running_jobs,
    })
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the sync job routes.
///
/// - POST /jobs
/// - GET /jobs/{job_id}
/// - GET /status
pub fn sync_routes() -> Router<ServerState> {
    Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/{job_id}", get(get_job))
        .route("/status", get(get_sync_status))
}
