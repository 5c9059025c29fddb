//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod publish;
pub mod step;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::PipelineManager;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PipelineManager>,
}

/// Create the main API router with all endpoints
pub fn create_router(manager: Arc<PipelineManager>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job submission and lifecycle
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/build",
            post(publish::create_build_job),
        )
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/deploy",
            post(publish::create_deploy_job),
        )
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/terminate",
            post(publish::terminate_publish),
        )
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/abort",
            post(publish::abort_publish),
        )
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/steps/{step}/callback",
            post(publish::job_callback),
        )
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/manual",
            post(publish::confirm_manual_step),
        )
        // Step inspection and previews
        .route(
            "/api/v1/pipelines/{project}/publishes/{publish}/stages/{stage}/branches",
            get(step::branch_preview),
        )
        .route(
            "/api/v1/publishes/{publish}/steps/current",
            get(step::get_step_info),
        )
        .route(
            "/api/v1/publishes/{publish}/steps/{index}",
            get(step::get_step_type),
        )
        .route(
            "/api/v1/publishes/{publish}/stages/{stage}/last",
            get(step::is_last_stage_last_step),
        )
        .route(
            "/api/v1/publishes/{publish}/deploy/apps",
            get(step::deploy_app_images),
        )
        // Add state and middleware
        .with_state(AppState { manager })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
