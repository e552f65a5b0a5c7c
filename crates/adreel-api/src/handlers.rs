//! Request handlers.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use adreel_firestore::JobRepository;
use adreel_models::{CreateAdRequest, JobId, JobStatus};
use adreel_pipeline::{admit_job, progress_channel, run_job, CancelFlag, ProgressReceiver};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for asynchronous ad creation.
#[derive(Debug, Serialize)]
pub struct CreateAdResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

/// Create an ad job and return immediately; the client polls for status.
pub async fn create_ad(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateAdRequest>,
) -> ApiResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = admit_job(&state.pipeline, &user.user_id, &request).await?;
    info!(job_id = %job.job_id, user_id = %user.user_id, "Created ad job (async)");

    // No stream consumer: the progress channel starts detached and the
    // orchestrator runs to completion regardless.
    let (tx, rx) = progress_channel();
    drop(rx);
    spawn_orchestrator(&state, &user.user_id, &job.job_id, tx);

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateAdResponse {
            job_id: job.job_id,
            status: "pending",
        }),
    ))
}

/// Create an ad job and stream progress as server-sent events.
///
/// The stream terminates after `complete` or `error`. Disconnecting only
/// detaches the stream; the job keeps running and remains pollable.
pub async fn create_ad_stream(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateAdRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = admit_job(&state.pipeline, &user.user_id, &request).await?;
    info!(job_id = %job.job_id, user_id = %user.user_id, "Created ad job (streaming)");

    let (tx, rx) = progress_channel();
    spawn_orchestrator(&state, &user.user_id, &job.job_id, tx);

    Ok(Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()))
}

fn spawn_orchestrator(
    state: &AppState,
    user_id: &str,
    job_id: &JobId,
    tx: adreel_pipeline::ProgressSender,
) {
    tokio::spawn(run_job(
        state.pipeline.clone(),
        state.registry.clone(),
        user_id.to_string(),
        job_id.clone(),
        tx,
        CancelFlag::new(),
    ));
}

fn event_stream(rx: ProgressReceiver) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.name())
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().event("error").data("{\"message\":\"serialization failed\"}"));
        Some((Ok::<_, Infallible>(sse), rx))
    })
}

/// Poll one ad job.
pub async fn get_ad(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job_id = JobId::from_string(job_id);
    let job = state
        .pipeline
        .jobs
        .load(&user.user_id, &job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;

    Ok(Json(job.to_status_response()))
}

/// Query parameters for the job listing.
#[derive(Debug, Deserialize)]
pub struct ListAdsQuery {
    /// Optional status filter (e.g. "completed", "failed")
    pub status: Option<String>,
}

/// List the caller's ad jobs, newest first.
pub async fn list_ads(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListAdsQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = match query.status.as_deref() {
        Some(s) => Some(parse_status(s)?),
        None => None,
    };

    let repo = JobRepository::new((*state.firestore).clone(), &user.user_id);
    let jobs = repo.list_for_user(status).await?;

    let responses: Vec<_> = jobs.iter().map(|j| j.to_status_response()).collect();
    Ok(Json(responses))
}

fn parse_status(s: &str) -> ApiResult<JobStatus> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| ApiError::bad_request(format!("unknown status filter: {s}")))
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub storage: String,
}

/// Readiness check endpoint. Verifies object-store connectivity.
pub async fn ready(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    match state.storage.check_connectivity().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            storage: "ok".to_string(),
        })),
        Err(e) => Err(ApiError::internal(format!("storage not reachable: {e}"))),
    }
}
