//! Deploy job submission
//!
//! Renders each app's arrangement with its resolved image, applies the
//! combined manifest on the stage cluster, then submits the health checks
//! of the applied workloads to the CI driver.

use conveyor_core::domain::job::{JobAppParams, JobScope, JobType, NewPublishJob};
use conveyor_core::domain::pipeline::{StepType, SubTask, SubTaskKind};
use conveyor_core::domain::project::TagPolicy;
use conveyor_core::dto::job::{CreateDeployJob, DeployAppRequest, EnvItem, JobLaunched};

use super::manifest::{join_manifests, resource_names, substitute_image};
use super::pipeline::{current_step, stage_of};
use super::render::{AGENT_CONTAINER, BaseInfo, HealthCheckTarget, StepRenderer};
use super::{EngineError, PipelineManager};
use crate::driver::ApplyRequest;
use crate::driver::plan::ExecutionPlan;

/// One app's rendered manifest
#[derive(Debug, Clone)]
struct RenderedApp {
    params: JobAppParams,
    manifest: String,
    targets: Vec<HealthCheckTarget>,
}

impl PipelineManager {
    /// Creates the deploy job of the publish's current step and submits it
    pub async fn create_deploy_job(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        request: CreateDeployJob,
    ) -> Result<JobLaunched, EngineError> {
        if request.apps.is_empty() {
            return Err(EngineError::Validation(
                "no apps selected for the deploy".to_string(),
            ));
        }

        let (_, publish) = self.verify_project_publish(project_id, publish_id).await?;
        self.ensure_idle(JobScope::deploy(project_id, stage_id)).await?;

        let env = self.project_env(project_id, stage_id).await?;
        let ci = self.ci_config(&env).await?;
        let driver = self.drivers.ci.connect(&ci);
        driver.ping().await.map_err(|e| {
            tracing::error!("CI server {} is unreachable: {:#}", ci.url, e);
            EngineError::external("CI server is unreachable", e)
        })?;

        let instance = self.pipeline_instance(&publish).await?;
        let stage = stage_of(&instance, stage_id)?;
        let step = current_step(stage, &publish)?;
        if step.step_type != StepType::Deploy {
            return Err(EngineError::Validation(format!(
                "current step {} is a {} step, not a deploy step",
                step.name, step.step_type
            )));
        }
        let tasks = if step.sub_tasks.is_empty() {
            vec![SubTask::new(1, "health check", SubTaskKind::HealthCheck)]
        } else {
            step.sub_tasks.clone()
        };

        self.check_arrangements(project_id, env.id, &env.name, &request.apps)
            .await?;

        let mut rendered = Vec::with_capacity(request.apps.len());
        for app in &request.apps {
            if let Some(app) = self.render_app(publish_id, env.id, app).await? {
                rendered.push(app);
            }
        }
        if rendered.is_empty() {
            return Err(EngineError::Validation(
                "none of the selected apps could be rendered for deploy".to_string(),
            ));
        }

        let cluster = self.cluster_target(&env).await?;
        let agent = self.default_container(AGENT_CONTAINER).await?;
        let token = self.user_token(&self.config.service_account).await?;
        let user_token = match self.user_token(&request.creator).await {
            Ok(token) => token,
            Err(EngineError::Config(msg)) => {
                tracing::warn!("{}, deploy continues without a user token", msg);
                String::new()
            }
            Err(err) => return Err(err),
        };

        let manifests: Vec<&str> = rendered.iter().map(|app| app.manifest.as_str()).collect();
        let apply = ApplyRequest {
            cluster: cluster.name.clone(),
            namespace: env.namespace.clone(),
            manifest: join_manifests(&manifests),
            project_id,
            stage_id,
            wait_ready: true,
        };
        self.drivers
            .cluster
            .apply(&cluster.config, &apply)
            .await
            .map_err(|e| {
                tracing::error!("Applying manifests on {} failed: {:#}", cluster.name, e);
                EngineError::external("manifest apply failed", e)
            })?;
        tracing::info!(
            "Applied {} app manifests on {}/{}",
            rendered.len(),
            cluster.name,
            env.namespace
        );

        let job_id = self
            .insert_job(NewPublishJob {
                publish_id,
                project_id,
                stage_id,
                job_type: JobType::Deploy,
                creator: request.creator.clone(),
                apps: rendered.iter().map(|app| app.params.clone()).collect(),
            })
            .await?;
        self.start_publish(&publish).await?;

        let renderer = StepRenderer::new(
            BaseInfo {
                project_id,
                stage_id,
                job_id,
            },
            &self.config.scripts_dir,
        );
        let targets: Vec<HealthCheckTarget> = rendered
            .iter()
            .flat_map(|app| app.targets.iter().cloned())
            .collect();
        let steps = tasks
            .iter()
            .filter_map(|task| match task.kind {
                SubTaskKind::HealthCheck => Some(renderer.health_check(
                    task,
                    &cluster.name,
                    &env.namespace,
                    &targets,
                )),
                other => {
                    tracing::warn!("Sub-task {} of kind {} is not part of a deploy, skipped", task.name, other);
                    None
                }
            })
            .collect();

        let env_vars = vec![
            EnvItem::new("CI_WORKSPACE", &ci.workspace),
            EnvItem::new("PLATFORM_SERVER", &self.config.server_url),
            EnvItem::new("ACCESS_TOKEN", &token),
            EnvItem::new("USER_TOKEN", user_token),
        ];

        let plan = ExecutionPlan::new(
            env_vars,
            vec![agent],
            steps,
            self.callback(&token, JobType::Deploy, project_id, publish_id, stage_id, job_id),
        );

        let job_name = self.job_name(JobType::Deploy, project_id, publish_id, stage_id);
        let run_id = driver.build(&job_name, &plan).await.map_err(|e| {
            tracing::error!("Submitting deploy job {} failed: {:#}", job_name, e);
            EngineError::external("deploy submission failed", e)
        })?;

        self.publishes.mark_job_running(job_id, run_id).await?;

        tracing::info!(
            "Deploy job {} submitted as {} run {} by {}",
            job_id,
            job_name,
            run_id,
            request.creator
        );

        Ok(JobLaunched { run_id, job_name })
    }

    /// Every requested app must have an arrangement in the stage env
    pub(crate) async fn check_arrangements(
        &self,
        project_id: i64,
        env_id: i64,
        env_name: &str,
        apps: &[DeployAppRequest],
    ) -> Result<(), EngineError> {
        let ids: Vec<i64> = apps.iter().map(|app| app.project_app_id).collect();
        let project_apps = self.projects.get_project_apps_by_ids(&ids).await?;

        let mut missing = Vec::new();
        for id in &ids {
            match project_apps
                .iter()
                .find(|app| app.id == *id && app.project_id == project_id)
            {
                Some(app) => {
                    if self.projects.get_arrange(app.id, env_id).await?.is_none() {
                        missing.push(app.name.clone());
                    }
                }
                None => missing.push(format!("#{}", id)),
            }
        }

        if !missing.is_empty() {
            tracing::error!("Apps {} have no arrangement in env {}", missing.join(","), env_name);
            return Err(EngineError::Validation(format!(
                "save the arrangement of apps {} in {} and retry",
                missing.join(","),
                env_name
            )));
        }
        Ok(())
    }

    /// Renders one app; anything missing skips the app with a warning
    async fn render_app(
        &self,
        publish_id: i64,
        env_id: i64,
        request: &DeployAppRequest,
    ) -> Result<Option<RenderedApp>, EngineError> {
        let Some(app) = self.projects.get_project_app(request.project_app_id).await? else {
            tracing::warn!("App {} does not exist, skipped", request.project_app_id);
            return Ok(None);
        };
        let Some(arrange) = self.projects.get_arrange(app.id, env_id).await? else {
            tracing::warn!("App {} has no arrangement in env {}, skipped", app.name, env_id);
            return Ok(None);
        };
        let Some(publish_app) = self.publishes.get_publish_app(publish_id, app.id).await? else {
            tracing::warn!("App {} is not part of publish {}, skipped", app.name, publish_id);
            return Ok(None);
        };
        let Some(repo) = self.projects.get_repo(app.repo_id).await? else {
            tracing::warn!("Repository {} of app {} does not exist, skipped", app.repo_id, app.name);
            return Ok(None);
        };
        let Some((mapping, image)) = self
            .mapped_image(&arrange, &app, &repo, &publish_app.branch_name)
            .await?
        else {
            return Ok(None);
        };

        let manifest = if mapping.tag_policy == TagPolicy::Origin {
            arrange.config
        } else {
            match substitute_image(&arrange.config, &mapping.image, &image) {
                Ok(manifest) => manifest,
                Err(err) => {
                    tracing::warn!("Manifest of app {} not rendered, skipped: {}", app.name, err);
                    return Ok(None);
                }
            }
        };
        let targets = match resource_names(&manifest) {
            Ok(names) => names
                .into_iter()
                .map(|resource_name| HealthCheckTarget {
                    app_name: app.name.clone(),
                    resource_name,
                })
                .collect(),
            Err(err) => {
                tracing::warn!("Manifest of app {} is not valid YAML, skipped: {}", app.name, err);
                return Ok(None);
            }
        };

        tracing::debug!("Deploy app {} with image {}", app.name, image);

        Ok(Some(RenderedApp {
            params: JobAppParams {
                project_app_id: app.id,
                branch: Some(publish_app.branch_name),
                path: String::new(),
                image_addr: Some(image),
            },
            manifest,
            targets,
        }))
    }
}
