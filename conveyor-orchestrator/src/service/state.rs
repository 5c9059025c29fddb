//! Publish and job state machine
//!
//! Termination, forced abort, completion callbacks, manual confirmation and
//! the read-only step lookups used to decide what comes next.

use conveyor_core::domain::job::{JobStatus, JobType, PublishJob};
use conveyor_core::domain::pipeline::{StageDefinition, StepType};
use conveyor_core::domain::publish::{PublishOrder, PublishStatus};
use conveyor_core::domain::setting::CiDriverConfig;
use conveyor_core::dto::job::{
    BuildAppRequest, CallbackResult, CreateBuildJob, CreateDeployJob, DeployAppRequest,
    JobCallback, JobLaunched, JobOutcome,
};
use conveyor_core::dto::publish::{
    ConfirmManualStep, LastStepCheck, ManualStepInfo, StepRecord, StepTypeInfo,
};

use super::pipeline::{current_step, stage_of};
use super::{EngineError, PipelineManager};
use crate::repository::NewOperationLog;

/// Job the CI driver has to abort
struct AbortTarget {
    ci: CiDriverConfig,
    job_name: String,
    job: PublishJob,
    run_id: i64,
}

impl PipelineManager {
    // =========================================================================
    // Termination
    // =========================================================================

    /// Terminates the running job of a publish order.
    ///
    /// The order is marked TerminateSuccess before the CI driver is asked to
    /// abort, so a repeated terminate is rejected even when the abort failed.
    /// The job only becomes Abort once the driver confirmed.
    pub async fn terminate_publish(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        job_type: JobType,
    ) -> Result<(), EngineError> {
        let publish = self.get_publish(publish_id).await?;
        publish.status.check_terminate()?;

        let target = match self
            .abort_target(project_id, publish_id, stage_id, job_type)
            .await
        {
            Ok(target) => target,
            Err(err) => {
                tracing::error!("Terminating publish {} failed: {}", publish_id, err);
                self.publishes
                    .update_publish_status(publish_id, PublishStatus::TerminateFailed)
                    .await?;
                return Err(err);
            }
        };

        self.publishes
            .update_publish_status(publish_id, PublishStatus::TerminateSuccess)
            .await?;

        let driver = self.drivers.ci.connect(&target.ci);
        driver
            .abort(&target.job_name, target.run_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Aborting {} run {} failed: {:#}",
                    target.job_name,
                    target.run_id,
                    e
                );
                EngineError::external("CI abort failed", e)
            })?;

        self.publishes
            .update_job_status(target.job.id, JobStatus::Abort)
            .await?;

        tracing::info!(
            "Publish {} terminated, job {} ({}) aborted",
            publish_id,
            target.job.id,
            target.job_name
        );
        Ok(())
    }

    async fn abort_target(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        job_type: JobType,
    ) -> Result<AbortTarget, EngineError> {
        let env = self.project_env(project_id, stage_id).await?;
        let ci = self.ci_config(&env).await?;

        let job_name = self.job_name(job_type, project_id, publish_id, stage_id);
        let job = self
            .publishes
            .latest_job_for_publish(publish_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job of publish order {}", publish_id)))?;
        let run_id = job.run_id.ok_or_else(|| {
            EngineError::Validation(format!("job {} was never started by the CI server", job.id))
        })?;

        Ok(AbortTarget {
            ci,
            job_name,
            job,
            run_id,
        })
    }

    /// Forced abort: settles the order and its latest job locally without
    /// contacting the CI driver
    pub async fn abort_publish(&self, project_id: i64, publish_id: i64) -> Result<(), EngineError> {
        let (_, publish) = self.verify_project_publish(project_id, publish_id).await?;
        publish.status.check_abort()?;

        self.publishes
            .update_publish_status(publish_id, PublishStatus::Abort)
            .await?;

        if let Some(job) = self.publishes.latest_job_for_publish(publish_id).await? {
            if job.status.is_active() {
                self.publishes
                    .update_job_status(job.id, JobStatus::Abort)
                    .await?;
                tracing::info!("Job {} aborted with publish {}", job.id, publish_id);
            }
        }

        tracing::info!("Publish {} aborted", publish_id);
        Ok(())
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Applies a CI completion callback and moves the order forward
    pub async fn complete_job(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        job_type: JobType,
        callback: JobCallback,
    ) -> Result<CallbackResult, EngineError> {
        let job = self
            .publishes
            .get_job(callback.publish_job_id)
            .await?
            .filter(|job| {
                job.publish_id == publish_id
                    && job.project_id == project_id
                    && job.stage_id == stage_id
                    && job.job_type == job_type
            })
            .ok_or_else(|| {
                EngineError::not_found(format!(
                    "{} job {} of publish order {} stage {}",
                    job_type, callback.publish_job_id, publish_id, stage_id
                ))
            })?;
        let publish = self.get_publish(publish_id).await?;

        if !job.status.is_active() {
            tracing::warn!(
                "Callback for job {} ignored, job already {}",
                job.id,
                job.status
            );
            return Ok(unchanged(&job, &publish));
        }

        match callback.status {
            JobOutcome::Failed => {
                self.publishes
                    .update_job_status(job.id, JobStatus::Failed)
                    .await?;
                tracing::warn!("Job {} of publish {} failed", job.id, publish_id);

                let mut result = unchanged(&job, &publish);
                result.job_status = JobStatus::Failed;
                if publish.status.check_advance().is_ok() {
                    self.publishes
                        .update_publish_status(publish_id, PublishStatus::Failed)
                        .await?;
                    result.publish_status = PublishStatus::Failed;
                }
                Ok(result)
            }
            JobOutcome::Success => {
                self.publishes
                    .update_job_status(job.id, JobStatus::Success)
                    .await?;
                tracing::info!("Job {} of publish {} succeeded", job.id, publish_id);

                if let Err(err) = publish.status.check_advance() {
                    tracing::warn!("Publish {} not advanced: {}", publish_id, err);
                    let mut result = unchanged(&job, &publish);
                    result.job_status = JobStatus::Success;
                    return Ok(result);
                }
                self.advance(&publish, stage_id, &job.creator, JobStatus::Success)
                    .await
            }
        }
    }

    /// Records a manual confirmation and advances past the manual step
    pub async fn confirm_manual_step(
        &self,
        project_id: i64,
        publish_id: i64,
        request: ConfirmManualStep,
    ) -> Result<CallbackResult, EngineError> {
        let (_, publish) = self.verify_project_publish(project_id, publish_id).await?;
        publish.status.check_advance()?;

        let instance = self.pipeline_instance(&publish).await?;
        let stage = stage_of(&instance, publish.stage_id)?;
        let step = current_step(stage, &publish)?;
        if step.step_type != StepType::Manual {
            return Err(EngineError::Validation(format!(
                "current step {} is a {} step, operation not allowed",
                step.name, step.step_type
            )));
        }

        self.publishes
            .add_operation_log(NewOperationLog {
                publish_id,
                pipeline_instance_id: instance.id,
                stage_id: publish.stage_id,
                step_index: publish.step_index,
                step: step.name.clone(),
                creator: request.creator.clone(),
                message: request.message,
            })
            .await?;
        tracing::info!(
            "Manual step {} of publish {} confirmed by {}",
            step.name,
            publish_id,
            request.creator
        );

        // Job status is not meaningful for manual steps
        self.advance(&publish, publish.stage_id, &request.creator, JobStatus::Success)
            .await
    }

    /// Moves the order past its current step after that step succeeded
    async fn advance(
        &self,
        publish: &PublishOrder,
        stage_id: i64,
        creator: &str,
        job_status: JobStatus,
    ) -> Result<CallbackResult, EngineError> {
        let instance = self.pipeline_instance(publish).await?;
        let stage = stage_of(&instance, stage_id)?;

        if stage.is_last_step(publish.step_index) {
            let status = if instance.is_last_stage(stage_id) {
                self.publishes
                    .update_publish_status(publish.id, PublishStatus::Success)
                    .await?;
                tracing::info!("Publish {} completed", publish.id);
                PublishStatus::Success
            } else {
                tracing::info!("Stage {} of publish {} completed", stage.name, publish.id);
                if publish.status != PublishStatus::Running {
                    self.publishes
                        .update_publish_status(publish.id, PublishStatus::Running)
                        .await?;
                }
                PublishStatus::Running
            };
            return Ok(CallbackResult {
                job_status,
                publish_status: status,
                step_index: publish.step_index,
                next_job: None,
            });
        }

        let Some(next) = stage
            .next_step_index(publish.step_index)
            .and_then(|index| stage.step(index))
        else {
            return Err(EngineError::Validation(format!(
                "stage {} has no step after {}",
                stage.name, publish.step_index
            )));
        };

        self.publishes
            .advance_publish_step(
                publish.id,
                next.index,
                &next.name,
                next.step_type.as_str(),
                PublishStatus::Running,
            )
            .await?;
        tracing::info!(
            "Publish {} advanced to step {} ({})",
            publish.id,
            next.name,
            next.step_type
        );

        let next_job = match next.step_type {
            StepType::Build | StepType::Deploy => {
                self.trigger_next_job(publish, stage, next.step_type, creator)
                    .await
            }
            _ => None,
        };

        Ok(CallbackResult {
            job_status,
            publish_status: PublishStatus::Running,
            step_index: next.index,
            next_job,
        })
    }

    /// Creates the job of an automatic step from the apps of the order.
    /// Failures are logged; the step then waits for a manual trigger.
    async fn trigger_next_job(
        &self,
        publish: &PublishOrder,
        stage: &StageDefinition,
        step_type: StepType,
        creator: &str,
    ) -> Option<JobLaunched> {
        let apps = match self.publishes.get_publish_apps(publish.id).await {
            Ok(apps) => apps,
            Err(err) => {
                tracing::error!("Loading apps of publish {} failed: {}", publish.id, err);
                return None;
            }
        };

        let launched = match step_type {
            StepType::Build => {
                let request = CreateBuildJob {
                    creator: creator.to_string(),
                    apps: apps
                        .iter()
                        .map(|app| BuildAppRequest {
                            project_app_id: app.project_app_id,
                            branch: app.branch_name.clone(),
                            path: String::new(),
                            compile_command: app.compile_command.clone(),
                        })
                        .collect(),
                    env_vars: vec![],
                };
                self.create_build_job(publish.project_id, publish.id, stage.stage_id, request)
                    .await
            }
            _ => {
                let request = CreateDeployJob {
                    creator: creator.to_string(),
                    apps: apps
                        .iter()
                        .map(|app| DeployAppRequest {
                            project_app_id: app.project_app_id,
                        })
                        .collect(),
                };
                self.create_deploy_job(publish.project_id, publish.id, stage.stage_id, request)
                    .await
            }
        };

        match launched {
            Ok(job) => Some(job),
            Err(err) => {
                tracing::error!(
                    "Automatic {} of publish {} failed: {}",
                    step_type,
                    publish.id,
                    err
                );
                None
            }
        }
    }

    // =========================================================================
    // Step inspection
    // =========================================================================

    /// Latest manual records of the current step and the one before it
    pub async fn get_step_info(&self, publish_id: i64) -> Result<ManualStepInfo, EngineError> {
        let publish = self.get_publish(publish_id).await?;
        let instance_id = publish.last_pipeline_instance_id;

        let current_step = self
            .step_record(instance_id, publish.stage_id, publish.step_index)
            .await?
            .unwrap_or_else(|| StepRecord {
                name: publish.step.clone(),
                ..StepRecord::default()
            });

        let previous_step = if publish.step_index > 1 {
            self.step_record(instance_id, publish.stage_id, publish.step_index - 1)
                .await?
        } else {
            None
        };

        Ok(ManualStepInfo {
            current_step,
            previous_step,
        })
    }

    async fn step_record(
        &self,
        instance_id: i64,
        stage_id: i64,
        step_index: i32,
    ) -> Result<Option<StepRecord>, EngineError> {
        let logs = self
            .publishes
            .operation_logs(instance_id, stage_id, step_index)
            .await?;
        Ok(logs.into_iter().next().map(|log| StepRecord {
            name: log.step,
            creator: log.creator,
            message: log.message,
        }))
    }

    /// Declared type and name of a step of the order's current stage
    pub async fn get_next_step_type(
        &self,
        publish_id: i64,
        step_index: i32,
    ) -> Result<StepTypeInfo, EngineError> {
        let publish = self.get_publish(publish_id).await?;
        let instance = self.pipeline_instance(&publish).await?;
        let stage = stage_of(&instance, publish.stage_id)?;
        let step = stage.step(step_index).ok_or_else(|| {
            EngineError::not_found(format!("step {} in stage {}", step_index, stage.name))
        })?;

        Ok(StepTypeInfo {
            step_type: step.step_type.to_string(),
            name: step.name.clone(),
        })
    }

    /// Whether `stage_id` is the last stage of the snapshot and the order
    /// sits on its last step
    pub async fn is_last_stage_last_step(
        &self,
        publish_id: i64,
        stage_id: i64,
    ) -> Result<LastStepCheck, EngineError> {
        let publish = self.get_publish(publish_id).await?;
        let instance = self.pipeline_instance(&publish).await?;
        let stage = stage_of(&instance, stage_id)?;

        Ok(LastStepCheck {
            last_stage: instance.is_last_stage(stage_id),
            last_step: stage.is_last_step(publish.step_index),
        })
    }
}

fn unchanged(job: &PublishJob, publish: &PublishOrder) -> CallbackResult {
    CallbackResult {
        job_status: job.status,
        publish_status: publish.status,
        step_index: publish.step_index,
        next_job: None,
    }
}
