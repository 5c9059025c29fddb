//! In-memory repositories and drivers for engine tests
//!
//! `Fixture::new()` seeds one active project with two apps (`api` compiled
//! in its own environment, `web` without one), a running publish order on
//! the build step of stage 3 and the integration settings of that stage.

use anyhow::{Result, bail};
use async_trait::async_trait;
use conveyor_core::domain::job::{
    JobScope, JobStatus, JobType, NewPublishJob, PublishJob,
};
use conveyor_core::domain::pipeline::{
    PipelineInstance, StageDefinition, StepDefinition, StepType, SubTask, SubTaskKind,
};
use conveyor_core::domain::project::{
    AppArrange, CompileEnv, ImageMapping, Project, ProjectApp, ProjectEnv, ProjectStatus, Repo,
    RepoKind, TagPolicy,
};
use conveyor_core::domain::publish::{OperationLog, PublishApp, PublishOrder, PublishStatus};
use conveyor_core::domain::setting::{
    CiDriverConfig, ClusterConfig, IntegrateSetting, IntegrationConfig, RegistryConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::driver::{
    ApplyRequest, CiDriver, CiDriverFactory, ClusterApplier, Commit, CommitListOptions, Drivers,
    ExecutionPlan, ScmProvider,
};
use crate::repository::{
    JobInsert, NewOperationLog, ProjectRepository, PublishRepository, SettingRepository,
};
use crate::service::PipelineManager;

const PROJECT_ID: i64 = 1;
const PUBLISH_ID: i64 = 5;
const STAGE_ID: i64 = 3;
const INSTANCE_ID: i64 = 1;
const CI_SETTING: i64 = 21;
const CLUSTER_SETTING: i64 = 22;
const REGISTRY_SETTING: i64 = 23;
const HEAD_SHA: &str = "abcdef1234567";

const API_MANIFEST: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
spec:
  template:
    spec:
      containers:
        - name: api
          image: registry/api:v1
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api-worker
spec:
  template:
    spec:
      containers:
        - name: worker
          image: registry/api-worker:v1
"#;

const WEB_MANIFEST: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: web
          image: registry/app:v1
---
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  ports:
    - port: 80
"#;

// =============================================================================
// Publish repository
// =============================================================================

#[derive(Default)]
struct PublishState {
    publishes: HashMap<i64, PublishOrder>,
    apps: Vec<PublishApp>,
    instances: HashMap<i64, PipelineInstance>,
    jobs: Vec<PublishJob>,
    logs: Vec<OperationLog>,
    busy_on_next_insert: Option<Vec<i64>>,
}

#[derive(Default)]
pub struct FakePublishRepository {
    state: Mutex<PublishState>,
}

impl FakePublishRepository {
    pub fn seed_job(
        &self,
        id: i64,
        publish_id: i64,
        project_id: i64,
        stage_id: i64,
        job_type: JobType,
        status: JobStatus,
    ) {
        let now = chrono::Utc::now();
        self.state.lock().unwrap().jobs.push(PublishJob {
            id,
            publish_id,
            project_id,
            stage_id,
            job_type,
            run_id: None,
            status,
            creator: "alice".to_string(),
            apps: vec![],
            created_at: now,
            updated_at: now,
        });
    }

    pub fn job(&self, id: i64) -> PublishJob {
        self.state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .unwrap()
    }

    pub fn only_job(&self) -> PublishJob {
        let state = self.state.lock().unwrap();
        assert_eq!(state.jobs.len(), 1, "expected exactly one job");
        state.jobs[0].clone()
    }

    /// The next conditional insert reports the scope taken by `ids`
    pub fn busy_on_next_insert(&self, ids: &[i64]) {
        self.state.lock().unwrap().busy_on_next_insert = Some(ids.to_vec());
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn set_run_id(&self, id: i64, run_id: i64) {
        self.with_job(id, |job| job.run_id = Some(run_id));
    }

    pub fn set_job_status(&self, id: i64, status: JobStatus) {
        self.with_job(id, |job| job.status = status);
    }

    pub fn publish_status(&self) -> PublishStatus {
        self.state.lock().unwrap().publishes[&PUBLISH_ID].status
    }

    pub fn step_index(&self) -> i32 {
        self.state.lock().unwrap().publishes[&PUBLISH_ID].step_index
    }

    pub fn set_publish_status(&self, status: PublishStatus) {
        self.with_publish(PUBLISH_ID, |publish| publish.status = status);
    }

    pub fn set_step_index(&self, publish_id: i64, step_index: i32) {
        self.with_publish(publish_id, |publish| publish.step_index = step_index);
    }

    pub fn set_stage(&self, publish_id: i64, stage_id: i64, step_index: i32) {
        self.with_publish(publish_id, |publish| {
            publish.stage_id = stage_id;
            publish.step_index = step_index;
        });
    }

    fn with_job(&self, id: i64, update: impl FnOnce(&mut PublishJob)) {
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.iter_mut().find(|job| job.id == id).unwrap();
        update(job);
    }

    fn with_publish(&self, id: i64, update: impl FnOnce(&mut PublishOrder)) {
        let mut state = self.state.lock().unwrap();
        update(state.publishes.get_mut(&id).unwrap());
    }

    fn active_ids(state: &PublishState, scope: JobScope) -> Vec<i64> {
        state
            .jobs
            .iter()
            .filter(|job| job.status.is_active() && scope.contains(job))
            .map(|job| job.id)
            .collect()
    }
}

#[async_trait]
impl PublishRepository for FakePublishRepository {
    async fn get_publish(&self, id: i64) -> Result<Option<PublishOrder>, sqlx::Error> {
        Ok(self.state.lock().unwrap().publishes.get(&id).cloned())
    }

    async fn update_publish_status(
        &self,
        id: i64,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error> {
        if let Some(publish) = self.state.lock().unwrap().publishes.get_mut(&id) {
            publish.status = status;
        }
        Ok(())
    }

    async fn advance_publish_step(
        &self,
        id: i64,
        step_index: i32,
        step: &str,
        step_type: &str,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error> {
        if let Some(publish) = self.state.lock().unwrap().publishes.get_mut(&id) {
            publish.step_index = step_index;
            publish.step = step.to_string();
            publish.step_type = step_type.to_string();
            publish.status = status;
        }
        Ok(())
    }

    async fn get_publish_apps(&self, publish_id: i64) -> Result<Vec<PublishApp>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .apps
            .iter()
            .filter(|app| app.publish_id == publish_id)
            .cloned()
            .collect())
    }

    async fn get_publish_app(
        &self,
        publish_id: i64,
        project_app_id: i64,
    ) -> Result<Option<PublishApp>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .apps
            .iter()
            .find(|app| app.publish_id == publish_id && app.project_app_id == project_app_id)
            .cloned())
    }

    async fn get_pipeline_instance(
        &self,
        id: i64,
    ) -> Result<Option<PipelineInstance>, sqlx::Error> {
        Ok(self.state.lock().unwrap().instances.get(&id).cloned())
    }

    async fn insert_job_if_idle(&self, job: NewPublishJob) -> Result<JobInsert, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(ids) = state.busy_on_next_insert.take() {
            return Ok(JobInsert::Busy(ids));
        }
        let busy = Self::active_ids(&state, job.scope());
        if !busy.is_empty() {
            return Ok(JobInsert::Busy(busy));
        }

        let id = state.jobs.iter().map(|job| job.id).max().unwrap_or(0) + 1;
        let now = chrono::Utc::now();
        state.jobs.push(PublishJob {
            id,
            publish_id: job.publish_id,
            project_id: job.project_id,
            stage_id: job.stage_id,
            job_type: job.job_type,
            run_id: None,
            status: JobStatus::Init,
            creator: job.creator,
            apps: job.apps,
            created_at: now,
            updated_at: now,
        });
        Ok(JobInsert::Created(id))
    }

    async fn find_active_jobs(&self, scope: JobScope) -> Result<Vec<PublishJob>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|job| job.status.is_active() && scope.contains(job))
            .cloned()
            .collect())
    }

    async fn get_job(&self, id: i64) -> Result<Option<PublishJob>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|job| job.id == id)
            .cloned())
    }

    async fn latest_job_for_publish(
        &self,
        publish_id: i64,
    ) -> Result<Option<PublishJob>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|job| job.publish_id == publish_id)
            .max_by_key(|job| job.id)
            .cloned())
    }

    async fn mark_job_running(&self, id: i64, run_id: i64) -> Result<(), sqlx::Error> {
        self.with_job(id, |job| {
            job.run_id = Some(run_id);
            job.status = JobStatus::Running;
        });
        Ok(())
    }

    async fn update_job_status(&self, id: i64, status: JobStatus) -> Result<(), sqlx::Error> {
        self.with_job(id, |job| job.status = status);
        Ok(())
    }

    async fn operation_logs(
        &self,
        pipeline_instance_id: i64,
        stage_id: i64,
        step_index: i32,
    ) -> Result<Vec<OperationLog>, sqlx::Error> {
        let mut logs: Vec<OperationLog> = self
            .state
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|log| {
                log.pipeline_instance_id == pipeline_instance_id
                    && log.stage_id == stage_id
                    && log.step_index == step_index
            })
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(logs)
    }

    async fn add_operation_log(&self, log: NewOperationLog) -> Result<i64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let id = state.logs.len() as i64 + 1;
        state.logs.push(OperationLog {
            id,
            publish_id: log.publish_id,
            pipeline_instance_id: log.pipeline_instance_id,
            stage_id: log.stage_id,
            step_index: log.step_index,
            step: log.step,
            creator: log.creator,
            message: log.message,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }
}

// =============================================================================
// Project repository
// =============================================================================

#[derive(Default)]
struct ProjectState {
    projects: HashMap<i64, Project>,
    apps: Vec<ProjectApp>,
    repos: HashMap<i64, Repo>,
    envs: Vec<ProjectEnv>,
    compile_envs: Vec<CompileEnv>,
    arranges: Vec<AppArrange>,
    mappings: Vec<ImageMapping>,
    branches: HashMap<i64, Vec<String>>,
}

#[derive(Default)]
pub struct FakeProjectRepository {
    state: Mutex<ProjectState>,
}

impl FakeProjectRepository {
    pub fn end_project(&self) {
        if let Some(project) = self.state.lock().unwrap().projects.get_mut(&PROJECT_ID) {
            project.status = ProjectStatus::Ended;
        }
    }

    pub fn remove_arrangements(&self, project_app_id: i64) {
        self.state
            .lock()
            .unwrap()
            .arranges
            .retain(|arrange| arrange.project_app_id != project_app_id);
    }

    pub fn remove_image_mappings(&self, project_app_id: i64) {
        self.state
            .lock()
            .unwrap()
            .mappings
            .retain(|mapping| mapping.project_app_id != project_app_id);
    }

    pub fn set_image_mapping(&self, project_app_id: i64, image: &str, tag_policy: TagPolicy) {
        let mut state = self.state.lock().unwrap();
        for mapping in state
            .mappings
            .iter_mut()
            .filter(|mapping| mapping.project_app_id == project_app_id)
        {
            mapping.image = image.to_string();
            mapping.tag_policy = tag_policy;
        }
    }

    pub fn add_branches(&self, project_app_id: i64, branches: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .branches
            .entry(project_app_id)
            .or_default()
            .extend(branches.iter().map(|branch| branch.to_string()));
    }
}

#[async_trait]
impl ProjectRepository for FakeProjectRepository {
    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error> {
        Ok(self.state.lock().unwrap().projects.get(&id).cloned())
    }

    async fn get_project_app(&self, id: i64) -> Result<Option<ProjectApp>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .apps
            .iter()
            .find(|app| app.id == id)
            .cloned())
    }

    async fn get_project_apps_by_ids(&self, ids: &[i64]) -> Result<Vec<ProjectApp>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .apps
            .iter()
            .filter(|app| ids.contains(&app.id))
            .cloned()
            .collect())
    }

    async fn get_project_env(
        &self,
        project_id: i64,
        stage_id: i64,
    ) -> Result<Option<ProjectEnv>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .envs
            .iter()
            .find(|env| env.project_id == project_id && env.id == stage_id)
            .cloned())
    }

    async fn get_repo(&self, id: i64) -> Result<Option<Repo>, sqlx::Error> {
        Ok(self.state.lock().unwrap().repos.get(&id).cloned())
    }

    async fn get_arrange(
        &self,
        project_app_id: i64,
        env_id: i64,
    ) -> Result<Option<AppArrange>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .arranges
            .iter()
            .find(|arrange| arrange.project_app_id == project_app_id && arrange.env_id == env_id)
            .cloned())
    }

    async fn get_image_mapping(
        &self,
        arrange_id: i64,
        project_app_id: i64,
    ) -> Result<Option<ImageMapping>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .mappings
            .iter()
            .find(|mapping| {
                mapping.arrange_id == arrange_id && mapping.project_app_id == project_app_id
            })
            .cloned())
    }

    async fn get_compile_env(&self, id: i64) -> Result<Option<CompileEnv>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .compile_envs
            .iter()
            .find(|env| env.id == id)
            .cloned())
    }

    async fn get_compile_env_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CompileEnv>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .compile_envs
            .iter()
            .find(|env| env.name == name)
            .cloned())
    }

    async fn app_branches(&self, project_app_id: i64) -> Result<Vec<String>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .branches
            .get(&project_app_id)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Setting repository
// =============================================================================

#[derive(Default)]
pub struct FakeSettingRepository {
    settings: Mutex<HashMap<i64, IntegrateSetting>>,
    tokens: Mutex<HashMap<String, String>>,
}

impl FakeSettingRepository {
    pub fn put(&self, id: i64, name: &str, config: IntegrationConfig) {
        self.settings.lock().unwrap().insert(
            id,
            IntegrateSetting {
                id,
                name: name.to_string(),
                config,
            },
        );
    }

    pub fn put_token(&self, user: &str, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(user.to_string(), token.to_string());
    }
}

#[async_trait]
impl SettingRepository for FakeSettingRepository {
    async fn get_setting(&self, id: i64) -> Result<Option<IntegrateSetting>, sqlx::Error> {
        Ok(self.settings.lock().unwrap().get(&id).cloned())
    }

    async fn user_token(&self, user: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self.tokens.lock().unwrap().get(user).cloned())
    }
}

// =============================================================================
// Drivers
// =============================================================================

#[derive(Default)]
struct CiState {
    builds: Vec<(String, ExecutionPlan)>,
    aborted: Vec<(String, i64)>,
    fail_ping: bool,
    fail_build: bool,
    fail_abort: bool,
}

/// CI backend accepting every build as run 100
#[derive(Clone, Default)]
pub struct FakeCi {
    state: Arc<Mutex<CiState>>,
}

impl FakeCi {
    pub const RUN_ID: i64 = 100;

    pub fn last_build(&self) -> Option<(String, ExecutionPlan)> {
        self.state.lock().unwrap().builds.last().cloned()
    }

    pub fn aborted(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().aborted.clone()
    }

    pub fn fail_ping(&self) {
        self.state.lock().unwrap().fail_ping = true;
    }

    pub fn fail_build(&self, failing: bool) {
        self.state.lock().unwrap().fail_build = failing;
    }

    pub fn fail_abort(&self) {
        self.state.lock().unwrap().fail_abort = true;
    }
}

#[async_trait]
impl CiDriver for FakeCi {
    async fn ping(&self) -> Result<()> {
        if self.state.lock().unwrap().fail_ping {
            bail!("connection refused");
        }
        Ok(())
    }

    async fn build(&self, job_name: &str, plan: &ExecutionPlan) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        if state.fail_build {
            bail!("build of {} rejected", job_name);
        }
        state.builds.push((job_name.to_string(), plan.clone()));
        Ok(Self::RUN_ID)
    }

    async fn abort(&self, job_name: &str, run_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_abort {
            bail!("abort of {} run {} rejected", job_name, run_id);
        }
        state.aborted.push((job_name.to_string(), run_id));
        Ok(())
    }
}

impl CiDriverFactory for FakeCi {
    fn connect(&self, _config: &CiDriverConfig) -> Arc<dyn CiDriver> {
        Arc::new(self.clone())
    }
}

/// Source host answering from a fixed commit table
#[derive(Default)]
pub struct FakeScm {
    commits: HashMap<(String, String), Vec<Commit>>,
    failing: bool,
    calls: Mutex<usize>,
}

impl FakeScm {
    pub fn with_commits(mut self, full_name: &str, branch: &str, shas: &[&str]) -> Self {
        self.commits.insert(
            (full_name.to_string(), branch.to_string()),
            shas.iter()
                .map(|sha| Commit {
                    sha: sha.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ScmProvider for FakeScm {
    async fn list_commits(
        &self,
        _repo: &Repo,
        full_name: &str,
        options: &CommitListOptions,
    ) -> Result<Vec<Commit>> {
        *self.calls.lock().unwrap() += 1;
        if self.failing {
            bail!("502 Bad Gateway");
        }
        Ok(self
            .commits
            .get(&(full_name.to_string(), options.branch.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeCluster {
    applied: Mutex<Vec<ApplyRequest>>,
}

impl FakeCluster {
    pub fn applied(&self) -> Vec<ApplyRequest> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterApplier for FakeCluster {
    async fn apply(&self, _cluster: &ClusterConfig, request: &ApplyRequest) -> Result<()> {
        self.applied.lock().unwrap().push(request.clone());
        Ok(())
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub struct Fixture {
    pub project_id: i64,
    pub publish_id: i64,
    pub stage_id: i64,
    pub publishes: Arc<FakePublishRepository>,
    pub projects: Arc<FakeProjectRepository>,
    pub settings: Arc<FakeSettingRepository>,
    pub ci: FakeCi,
    pub scm: Arc<FakeScm>,
    pub cluster: Arc<FakeCluster>,
}

impl Fixture {
    pub const API_APP: i64 = 11;
    pub const WEB_APP: i64 = 12;
    pub const LAST_STAGE: i64 = 4;

    pub fn new() -> Self {
        let fixture = Self {
            project_id: PROJECT_ID,
            publish_id: PUBLISH_ID,
            stage_id: STAGE_ID,
            publishes: Arc::new(FakePublishRepository::default()),
            projects: Arc::new(FakeProjectRepository::default()),
            settings: Arc::new(FakeSettingRepository::default()),
            ci: FakeCi::default(),
            scm: Arc::new(
                FakeScm::default()
                    .with_commits("team/api", "dev", &[HEAD_SHA])
                    .with_commits("team/api", "feature", &[HEAD_SHA]),
            ),
            cluster: Arc::new(FakeCluster::default()),
        };
        fixture.seed_projects();
        fixture.seed_publish();
        fixture.seed_settings();
        fixture
    }

    pub fn manager(&self) -> PipelineManager {
        PipelineManager::new(
            self.publishes.clone(),
            self.projects.clone(),
            self.settings.clone(),
            Drivers {
                ci: Arc::new(self.ci.clone()),
                scm: self.scm.clone(),
                cluster: self.cluster.clone(),
            },
            EngineConfig::new("http://conveyor.local"),
        )
    }

    /// Environment of the fixture stage
    pub fn env(&self) -> ProjectEnv {
        ProjectEnv {
            id: STAGE_ID,
            project_id: PROJECT_ID,
            name: "production".to_string(),
            namespace: "shop".to_string(),
            ci_server: CI_SETTING,
            cluster: CLUSTER_SETTING,
            registry: REGISTRY_SETTING,
        }
    }

    fn seed_projects(&self) {
        let mut state = self.projects.state.lock().unwrap();

        state.projects.insert(
            PROJECT_ID,
            Project {
                id: PROJECT_ID,
                name: "shop".to_string(),
                status: ProjectStatus::Active,
            },
        );
        state.envs.push(self.env());
        state.repos.insert(
            1,
            Repo {
                id: 1,
                kind: RepoKind::Gitea,
                base_url: "https://git.local/".to_string(),
                user: "bot".to_string(),
                token: "git-token".to_string(),
            },
        );

        let compile_env = |id: i64, name: &str, image: &str| CompileEnv {
            id,
            name: name.to_string(),
            image: image.to_string(),
            command: String::new(),
            args: String::new(),
        };
        state.compile_envs = vec![
            compile_env(1, "jnlp", "jenkins/inbound-agent"),
            compile_env(2, "kaniko", "gcr.io/kaniko-project/executor:debug"),
            compile_env(3, "golang", "golang:1.22"),
        ];

        state.apps = vec![
            ProjectApp {
                id: Self::API_APP,
                project_id: PROJECT_ID,
                name: "api".to_string(),
                full_name: "team/api".to_string(),
                language: "go".to_string(),
                repo_id: 1,
                build_path: "/".to_string(),
                compile_env_id: Some(3),
            },
            ProjectApp {
                id: Self::WEB_APP,
                project_id: PROJECT_ID,
                name: "web".to_string(),
                full_name: "team/web".to_string(),
                language: "node".to_string(),
                repo_id: 1,
                build_path: "/".to_string(),
                compile_env_id: None,
            },
        ];

        state.arranges = vec![
            AppArrange {
                id: 31,
                project_app_id: Self::API_APP,
                env_id: STAGE_ID,
                config: API_MANIFEST.to_string(),
            },
            AppArrange {
                id: 32,
                project_app_id: Self::WEB_APP,
                env_id: STAGE_ID,
                config: WEB_MANIFEST.to_string(),
            },
        ];
        state.mappings = vec![
            ImageMapping {
                id: 41,
                arrange_id: 31,
                project_app_id: Self::API_APP,
                image: "registry/api:v1".to_string(),
                tag_policy: TagPolicy::SystemDefault,
            },
            ImageMapping {
                id: 42,
                arrange_id: 32,
                project_app_id: Self::WEB_APP,
                image: "registry/app:v1".to_string(),
                tag_policy: TagPolicy::Latest,
            },
        ];
    }

    fn seed_publish(&self) {
        let mut state = self.publishes.state.lock().unwrap();
        let now = chrono::Utc::now();

        state.publishes.insert(
            PUBLISH_ID,
            PublishOrder {
                id: PUBLISH_ID,
                project_id: PROJECT_ID,
                version_no: "v1.2.0".to_string(),
                name: "spring release".to_string(),
                stage_id: STAGE_ID,
                step_index: 1,
                step: "build".to_string(),
                step_type: "build".to_string(),
                status: PublishStatus::Running,
                creator: "alice".to_string(),
                last_pipeline_instance_id: INSTANCE_ID,
                created_at: now,
                updated_at: now,
            },
        );

        state.apps = vec![
            PublishApp {
                id: 1,
                publish_id: PUBLISH_ID,
                project_app_id: Self::API_APP,
                branch_name: "feature".to_string(),
                compile_command: Some("make build".to_string()),
            },
            PublishApp {
                id: 2,
                publish_id: PUBLISH_ID,
                project_app_id: Self::WEB_APP,
                branch_name: "dev".to_string(),
                compile_command: None,
            },
        ];

        let step = |index: i32, name: &str, step_type: StepType, sub_tasks: Vec<SubTask>| {
            StepDefinition {
                index,
                step_id: index as i64,
                name: name.to_string(),
                step_type,
                sub_tasks,
            }
        };
        state.instances.insert(
            INSTANCE_ID,
            PipelineInstance {
                id: INSTANCE_ID,
                stages: vec![
                    StageDefinition {
                        stage_id: STAGE_ID,
                        name: "production".to_string(),
                        steps: vec![
                            step(1, "build", StepType::Build, vec![]),
                            step(
                                2,
                                "deploy",
                                StepType::Deploy,
                                vec![SubTask::new(1, "health check", SubTaskKind::HealthCheck)],
                            ),
                            step(3, "approval", StepType::Manual, vec![]),
                        ],
                    },
                    StageDefinition {
                        stage_id: Self::LAST_STAGE,
                        name: "canary".to_string(),
                        steps: vec![step(1, "deploy", StepType::Deploy, vec![])],
                    },
                ],
            },
        );
    }

    fn seed_settings(&self) {
        self.settings.put(
            CI_SETTING,
            "ci-main",
            IntegrationConfig::CiDriver(CiDriverConfig {
                url: "http://ci.local".to_string(),
                user: "ci".to_string(),
                token: "ci-token".to_string(),
                workspace: "/ws".to_string(),
            }),
        );
        self.settings.put(
            CLUSTER_SETTING,
            "prod-cluster",
            IntegrationConfig::Cluster(ClusterConfig {
                url: "http://cluster.local".to_string(),
                token: String::new(),
            }),
        );
        self.settings.put(
            REGISTRY_SETTING,
            "registry",
            IntegrationConfig::Registry(RegistryConfig {
                url: "https://registry.local".to_string(),
                user: "push".to_string(),
                password: "secret".to_string(),
            }),
        );
        self.settings.put_token("admin", "admin-token");
        self.settings.put_token("alice", "alice-token");
    }
}
