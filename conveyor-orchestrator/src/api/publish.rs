//! Publish API Handlers
//!
//! Job submission, termination and completion endpoints of a publish order.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conveyor_core::domain::job::JobType;
use conveyor_core::dto::job::{
    CallbackResult, CreateBuildJob, CreateDeployJob, JobCallback, JobLaunched, TerminatePublish,
};
use conveyor_core::dto::publish::ConfirmManualStep;

use super::AppState;
use crate::api::error::ApiResult;

// =============================================================================
// Job Submission Endpoints
// =============================================================================

/// POST /api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/build
pub async fn create_build_job(
    State(state): State<AppState>,
    Path((project_id, publish_id, stage_id)): Path<(i64, i64, i64)>,
    Json(req): Json<CreateBuildJob>,
) -> ApiResult<(StatusCode, Json<JobLaunched>)> {
    tracing::info!(
        "Build requested for publish {} stage {} by {}",
        publish_id,
        stage_id,
        req.creator
    );

    let launched = state
        .manager
        .create_build_job(project_id, publish_id, stage_id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(launched)))
}

/// POST /api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/deploy
pub async fn create_deploy_job(
    State(state): State<AppState>,
    Path((project_id, publish_id, stage_id)): Path<(i64, i64, i64)>,
    Json(req): Json<CreateDeployJob>,
) -> ApiResult<(StatusCode, Json<JobLaunched>)> {
    tracing::info!(
        "Deploy requested for publish {} stage {} by {}",
        publish_id,
        stage_id,
        req.creator
    );

    let launched = state
        .manager
        .create_deploy_job(project_id, publish_id, stage_id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(launched)))
}

// =============================================================================
// Lifecycle Endpoints
// =============================================================================

/// POST /api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/terminate
pub async fn terminate_publish(
    State(state): State<AppState>,
    Path((project_id, publish_id, stage_id)): Path<(i64, i64, i64)>,
    Json(req): Json<TerminatePublish>,
) -> ApiResult<StatusCode> {
    tracing::info!("Terminating {} of publish {}", req.job_type, publish_id);

    state
        .manager
        .terminate_publish(project_id, publish_id, stage_id, req.job_type)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/pipelines/{project}/publishes/{publish}/abort
pub async fn abort_publish(
    State(state): State<AppState>,
    Path((project_id, publish_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    tracing::info!("Aborting publish {}", publish_id);

    state.manager.abort_publish(project_id, publish_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/steps/{step}/callback
/// Completion report of the CI driver
pub async fn job_callback(
    State(state): State<AppState>,
    Path((project_id, publish_id, stage_id, step)): Path<(i64, i64, i64, JobType)>,
    Json(req): Json<JobCallback>,
) -> ApiResult<Json<CallbackResult>> {
    tracing::info!(
        "{} callback for job {} of publish {}: {:?}",
        step,
        req.publish_job_id,
        publish_id,
        req.status
    );

    let result = state
        .manager
        .complete_job(project_id, publish_id, stage_id, step, req)
        .await?;

    Ok(Json(result))
}

/// POST /api/v1/pipelines/{project}/publishes/{publish}/manual
pub async fn confirm_manual_step(
    State(state): State<AppState>,
    Path((project_id, publish_id)): Path<(i64, i64)>,
    Json(req): Json<ConfirmManualStep>,
) -> ApiResult<Json<CallbackResult>> {
    let result = state
        .manager
        .confirm_manual_step(project_id, publish_id, req)
        .await?;

    Ok(Json(result))
}
