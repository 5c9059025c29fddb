//! Pipeline Manager
//!
//! Facade of the engine. Job creation, termination, callbacks and step
//! inspection are implemented across the sibling modules as `impl` blocks
//! of this type.

use conveyor_core::domain::job::JobType;
use conveyor_core::domain::pipeline::{PipelineInstance, StageDefinition, StepDefinition};
use conveyor_core::domain::project::{Project, ProjectStatus};
use conveyor_core::domain::publish::PublishOrder;
use std::sync::Arc;

use super::EngineError;
use crate::config::EngineConfig;
use crate::driver::Drivers;
use crate::driver::plan::CallbackDescriptor;
use crate::repository::{ProjectRepository, PublishRepository, SettingRepository};

pub struct PipelineManager {
    pub(crate) publishes: Arc<dyn PublishRepository>,
    pub(crate) projects: Arc<dyn ProjectRepository>,
    pub(crate) settings: Arc<dyn SettingRepository>,
    pub(crate) drivers: Drivers,
    pub(crate) config: EngineConfig,
}

impl PipelineManager {
    pub fn new(
        publishes: Arc<dyn PublishRepository>,
        projects: Arc<dyn ProjectRepository>,
        settings: Arc<dyn SettingRepository>,
        drivers: Drivers,
        config: EngineConfig,
    ) -> Self {
        Self {
            publishes,
            projects,
            settings,
            drivers,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Deterministic CI job name of a scope
    pub fn job_name(&self, job_type: JobType, project_id: i64, publish_id: i64, stage_id: i64) -> String {
        match job_type {
            JobType::Build => format!(
                "{}_{}_{}_{}",
                self.config.job_prefix, project_id, publish_id, stage_id
            ),
            JobType::Deploy => format!("{}_{}_{}", self.config.job_prefix, project_id, stage_id),
        }
    }

    pub(crate) fn callback(
        &self,
        token: &str,
        job_type: JobType,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        job_id: i64,
    ) -> CallbackDescriptor {
        CallbackDescriptor {
            token: token.to_string(),
            url: format!(
                "{}/api/v1/pipelines/{}/publishes/{}/stages/{}/steps/{}/callback",
                self.config.server_url, project_id, publish_id, stage_id, job_type
            ),
            body: serde_json::json!({ "publish_job_id": job_id }),
        }
    }

    pub(crate) async fn get_publish(&self, publish_id: i64) -> Result<PublishOrder, EngineError> {
        self.publishes
            .get_publish(publish_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("publish order {}", publish_id)))
    }

    /// Rejects ended projects and unknown or foreign publish orders
    pub(crate) async fn verify_project_publish(
        &self,
        project_id: i64,
        publish_id: i64,
    ) -> Result<(Project, PublishOrder), EngineError> {
        let project = self
            .projects
            .get_project(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("project {}", project_id)))?;

        if project.status == ProjectStatus::Ended {
            return Err(EngineError::Validation(format!(
                "project {} has ended, ask an administrator to reopen it and retry",
                project.name
            )));
        }

        let publish = self.get_publish(publish_id).await?;
        if publish.project_id != project_id {
            return Err(EngineError::not_found(format!(
                "publish order {} in project {}",
                publish_id, project_id
            )));
        }

        Ok((project, publish))
    }

    pub(crate) async fn pipeline_instance(
        &self,
        publish: &PublishOrder,
    ) -> Result<PipelineInstance, EngineError> {
        self.publishes
            .get_pipeline_instance(publish.last_pipeline_instance_id)
            .await?
            .ok_or_else(|| {
                EngineError::not_found(format!(
                    "pipeline instance {}",
                    publish.last_pipeline_instance_id
                ))
            })
    }
}

/// Stage of a pipeline snapshot, not-found when absent
pub(crate) fn stage_of(
    instance: &PipelineInstance,
    stage_id: i64,
) -> Result<&StageDefinition, EngineError> {
    instance.stage(stage_id).ok_or_else(|| {
        EngineError::not_found(format!("stage {} in pipeline instance {}", stage_id, instance.id))
    })
}

/// Step the publish order currently waits on
pub(crate) fn current_step<'a>(
    stage: &'a StageDefinition,
    publish: &PublishOrder,
) -> Result<&'a StepDefinition, EngineError> {
    stage.step(publish.step_index).ok_or_else(|| {
        EngineError::Validation(format!(
            "step {} is not declared in stage {}",
            publish.step_index, stage.name
        ))
    })
}
