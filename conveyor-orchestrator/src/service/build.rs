//! Build job submission
//!
//! Every hard lookup happens before the job row is written, so a rejected
//! build leaves no PublishJob behind. The job id is only known after the
//! insert, and rendering needs it for the base info block.

use base64::Engine as _;
use conveyor_core::domain::job::{JobAppParams, JobScope, JobType, NewPublishJob};
use conveyor_core::domain::pipeline::{StepType, SubTask, SubTaskKind};
use conveyor_core::domain::project::{ProjectEnv, Repo};
use conveyor_core::domain::setting::{CiDriverConfig, RegistryConfig};
use conveyor_core::dto::job::{BuildAppRequest, CreateBuildJob, EnvItem, JobLaunched};
use std::collections::BTreeMap;

use super::pipeline::{current_step, stage_of};
use super::render::{
    AGENT_CONTAINER, BaseInfo, BuildApp, CompileMode, IMAGE_BUILDER_CONTAINER, StepRenderer,
    app_path, compile_containers,
};
use super::{EngineError, PipelineManager};
use crate::driver::plan::{ContainerTemplate, ExecutionPlan};

const DOCKER_CONFIG_DIR: &str = "/kaniko/.docker";

/// Source host credentials keyed by host
type RepoCredentials = BTreeMap<String, (String, String)>;

impl PipelineManager {
    /// Creates the build job of the publish's current step and submits it
    pub async fn create_build_job(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        request: CreateBuildJob,
    ) -> Result<JobLaunched, EngineError> {
        if request.apps.is_empty() {
            return Err(EngineError::Validation(
                "no apps selected for the build".to_string(),
            ));
        }

        let (_, publish) = self.verify_project_publish(project_id, publish_id).await?;
        self.ensure_idle(JobScope::build(project_id, stage_id, publish_id))
            .await?;

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
        if step.step_type != StepType::Build {
            return Err(EngineError::Validation(format!(
                "current step {} is a {} step, not a build step",
                step.name, step.step_type
            )));
        }

        let tasks = if step.sub_tasks.is_empty() {
            SubTask::default_build()
        } else {
            step.sub_tasks.clone()
        };
        if !tasks.iter().any(|task| {
            matches!(
                task.kind,
                SubTaskKind::Checkout | SubTaskKind::Compile | SubTaskKind::BuildImage
            )
        }) {
            return Err(EngineError::Validation(format!(
                "build step {} declares no runnable sub-tasks",
                step.name
            )));
        }

        let (apps, repos) = self
            .build_apps(project_id, stage_id, &env, &ci, &request.apps)
            .await?;

        let mut containers = vec![
            self.default_container(AGENT_CONTAINER).await?,
            self.default_container(IMAGE_BUILDER_CONTAINER).await?,
        ];
        containers.extend(compile_containers(&apps, &self.config.agent_workdir));

        let registry = self.registry_config(&env).await?;
        let token = self.user_token(&self.config.service_account).await?;

        let job_id = self
            .insert_job(NewPublishJob {
                publish_id,
                project_id,
                stage_id,
                job_type: JobType::Build,
                creator: request.creator.clone(),
                apps: apps
                    .iter()
                    .map(|app| JobAppParams {
                        project_app_id: app.project_app_id,
                        branch: Some(app.branch.clone()),
                        path: app.branch_url.clone(),
                        image_addr: app.image_addr.clone(),
                    })
                    .collect(),
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
        let steps = renderer.render_build(&tasks, &apps);

        let mut env_vars = build_env_vars(&ci, &token, &repos, &registry);
        env_vars.extend(request.env_vars);

        let plan = ExecutionPlan::new(
            env_vars,
            containers,
            steps,
            self.callback(&token, JobType::Build, project_id, publish_id, stage_id, job_id),
        );

        let job_name = self.job_name(JobType::Build, project_id, publish_id, stage_id);
        let run_id = driver.build(&job_name, &plan).await.map_err(|e| {
            tracing::error!("Submitting build job {} failed: {:#}", job_name, e);
            EngineError::external("build submission failed", e)
        })?;

        self.publishes.mark_job_running(job_id, run_id).await?;

        tracing::info!(
            "Build job {} submitted as {} run {} by {}",
            job_id,
            job_name,
            run_id,
            request.creator
        );

        Ok(JobLaunched { run_id, job_name })
    }

    /// Resolves the requested apps; unknown apps or repositories are fatal,
    /// an unresolved image only drops the app's image build
    async fn build_apps(
        &self,
        project_id: i64,
        stage_id: i64,
        env: &ProjectEnv,
        ci: &CiDriverConfig,
        requests: &[BuildAppRequest],
    ) -> Result<(Vec<BuildApp>, RepoCredentials), EngineError> {
        let mut apps = Vec::with_capacity(requests.len());
        let mut repos = RepoCredentials::new();

        for request in requests {
            let app = self
                .projects
                .get_project_app(request.project_app_id)
                .await?
                .filter(|app| app.project_id == project_id)
                .ok_or_else(|| {
                    EngineError::not_found(format!(
                        "app {} in project {}",
                        request.project_app_id, project_id
                    ))
                })?;

            let repo = self
                .projects
                .get_repo(app.repo_id)
                .await?
                .ok_or_else(|| EngineError::not_found(format!("repository {}", app.repo_id)))?;
            repos.insert(
                repo.host().to_string(),
                (repo.user.clone(), repo.token.clone()),
            );

            let compile_env = match app.compile_env_id {
                Some(id) => {
                    let env = self.projects.get_compile_env(id).await?;
                    if env.is_none() {
                        tracing::warn!("Compile env {} of app {} is gone, compile skipped", id, app.name);
                    }
                    env
                }
                None => None,
            };

            let command = request
                .compile_command
                .as_deref()
                .map(str::trim)
                .filter(|command| !command.is_empty());
            let compile = match (&compile_env, command) {
                (None, _) => CompileMode::Skip,
                (Some(_), Some(command)) => CompileMode::Custom(command.to_string()),
                (Some(_), None) => CompileMode::Default,
            };

            let branch_url = if request.path.is_empty() {
                clone_url(&repo, &app.full_name)
            } else {
                request.path.clone()
            };

            let image_addr = self.app_image(env.id, &app, &repo, &request.branch).await?;

            tracing::debug!(
                "Build app {} branch {} compile {:?} image {:?}",
                app.name,
                request.branch,
                compile,
                image_addr
            );

            apps.push(BuildApp {
                project_app_id: app.id,
                app_path: app_path(
                    &ci.workspace,
                    project_id,
                    stage_id,
                    &app.name,
                    &request.branch,
                    &app.build_path,
                ),
                name: app.name,
                language: app.language,
                branch: request.branch.clone(),
                branch_url,
                build_path: app.build_path,
                compile,
                compile_env,
                image_addr,
            });
        }

        Ok((apps, repos))
    }

    /// System container template stored as a compile environment
    pub(crate) async fn default_container(
        &self,
        name: &str,
    ) -> Result<ContainerTemplate, EngineError> {
        let env = self
            .projects
            .get_compile_env_by_name(name)
            .await?
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "system compile environment {} is not configured",
                    name
                ))
            })?;
        Ok(ContainerTemplate::from_compile_env(
            name,
            &env,
            &self.config.agent_workdir,
        ))
    }
}

pub(crate) fn clone_url(repo: &Repo, full_name: &str) -> String {
    format!("{}/{}.git", repo.base_url.trim_end_matches('/'), full_name)
}

fn registry_host(registry: &RegistryConfig) -> &str {
    registry
        .url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

/// Reserved build variables, before any caller-supplied ones
fn build_env_vars(
    ci: &CiDriverConfig,
    token: &str,
    repos: &RepoCredentials,
    registry: &RegistryConfig,
) -> Vec<EnvItem> {
    let repo_cnf: serde_json::Map<String, serde_json::Value> = repos
        .iter()
        .map(|(host, (user, token))| (host.clone(), serde_json::json!([user, token])))
        .collect();
    let docker_auth = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", registry.user, registry.password));

    vec![
        EnvItem::new("CI_WORKSPACE", &ci.workspace),
        EnvItem::new("ACCESS_TOKEN", token),
        EnvItem::new("REPO_CNF", serde_json::Value::Object(repo_cnf).to_string()),
        EnvItem::new("DOCKER_AUTH", docker_auth),
        EnvItem::new("REGISTRY_ADDR", registry_host(registry)),
        EnvItem::new("DOCKER_CONFIG", DOCKER_CONFIG_DIR),
    ]
}
