//! Step API Handlers
//!
//! Read-only inspection of a publish order's steps and apps.

use axum::{
    Json,
    extract::{Path, State},
};
use conveyor_core::dto::publish::{
    BranchPreview, DeployAppImage, LastStepCheck, ManualStepInfo, StepTypeInfo,
};

use super::AppState;
use crate::api::error::ApiResult;

/// GET /api/v1/publishes/{publish}/steps/current
pub async fn get_step_info(
    State(state): State<AppState>,
    Path(publish_id): Path<i64>,
) -> ApiResult<Json<ManualStepInfo>> {
    tracing::debug!("Getting step info of publish {}", publish_id);

    let info = state.manager.get_step_info(publish_id).await?;
    Ok(Json(info))
}

/// GET /api/v1/publishes/{publish}/steps/{index}
pub async fn get_step_type(
    State(state): State<AppState>,
    Path((publish_id, step_index)): Path<(i64, i32)>,
) -> ApiResult<Json<StepTypeInfo>> {
    let info = state
        .manager
        .get_next_step_type(publish_id, step_index)
        .await?;
    Ok(Json(info))
}

/// GET /api/v1/publishes/{publish}/stages/{stage}/last
pub async fn is_last_stage_last_step(
    State(state): State<AppState>,
    Path((publish_id, stage_id)): Path<(i64, i64)>,
) -> ApiResult<Json<LastStepCheck>> {
    let check = state
        .manager
        .is_last_stage_last_step(publish_id, stage_id)
        .await?;
    Ok(Json(check))
}

/// GET /api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/branches
pub async fn branch_preview(
    State(state): State<AppState>,
    Path((project_id, publish_id, stage_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Json<BranchPreview>> {
    let preview = state
        .manager
        .branch_preview(project_id, publish_id, stage_id)
        .await?;
    Ok(Json(preview))
}

/// GET /api/v1/publishes/{publish}/deploy/apps
pub async fn deploy_app_images(
    State(state): State<AppState>,
    Path(publish_id): Path<i64>,
) -> ApiResult<Json<Vec<DeployAppImage>>> {
    let images = state.manager.deploy_app_images(publish_id).await?;
    Ok(Json(images))
}
