//! Step rendering
//!
//! Turns the sub-tasks of a step into backend steps, one per sub-task in
//! declaration order. Every command carries the base info block so helper
//! scripts can report back against the publish job.

use conveyor_core::domain::pipeline::{SubTask, SubTaskKind};
use conveyor_core::domain::project::CompileEnv;
use std::fmt;

use crate::driver::plan::{ContainerTemplate, RenderedStep, StepCommand};

/// Container every agent-side helper runs in
pub const AGENT_CONTAINER: &str = "jnlp";

/// Container running the rootless image builder
pub const IMAGE_BUILDER_CONTAINER: &str = "kaniko";

const VCS_TYPE: &str = "git";

/// `--project-id --stage-id --publish-job-id` argument block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseInfo {
    pub project_id: i64,
    pub stage_id: i64,
    pub job_id: i64,
}

impl fmt::Display for BaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--project-id {} --stage-id {} --publish-job-id {}",
            self.project_id, self.stage_id, self.job_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileMode {
    /// No compile environment configured
    Skip,
    /// Custom command run inside the app directory
    Custom(String),
    /// Compile environment configured without a command
    Default,
}

/// Everything the build sub-tasks need to know about one app
#[derive(Debug, Clone)]
pub struct BuildApp {
    pub project_app_id: i64,
    pub name: String,
    pub language: String,
    pub branch: String,
    /// Clone URL of the branch
    pub branch_url: String,
    pub build_path: String,
    /// Checkout directory on the agent
    pub app_path: String,
    pub compile: CompileMode,
    pub compile_env: Option<CompileEnv>,
    /// None when the image could not be resolved
    pub image_addr: Option<String>,
}

impl BuildApp {
    /// Compile container of the app, named after the app
    pub fn compile_container(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Checkout directory: `<workspace>/<project>/<stage>/<app>/<branch>/<build path>`
pub fn app_path(
    workspace: &str,
    project_id: i64,
    stage_id: i64,
    app_name: &str,
    branch: &str,
    build_path: &str,
) -> String {
    let mut path = [
        workspace,
        &project_id.to_string(),
        &stage_id.to_string(),
        app_name,
        branch,
        build_path,
    ]
    .join("/");
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    path
}

/// Workload to verify after a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckTarget {
    pub app_name: String,
    pub resource_name: String,
}

pub struct StepRenderer<'a> {
    base: BaseInfo,
    scripts_dir: &'a str,
}

impl<'a> StepRenderer<'a> {
    pub fn new(base: BaseInfo, scripts_dir: &'a str) -> Self {
        Self { base, scripts_dir }
    }

    /// Renders the sub-tasks of a build step. Kinds a build cannot run are
    /// skipped.
    pub fn render_build(&self, tasks: &[SubTask], apps: &[BuildApp]) -> Vec<RenderedStep> {
        tasks
            .iter()
            .filter_map(|task| match task.kind {
                SubTaskKind::Checkout => Some(self.checkout(task, apps)),
                SubTaskKind::Compile => Some(self.compile(task, apps)),
                SubTaskKind::BuildImage => Some(self.build_image(task, apps)),
                other => {
                    tracing::warn!("Sub-task {} of kind {} is not part of a build, skipped", task.name, other);
                    None
                }
            })
            .collect()
    }

    pub fn checkout(&self, task: &SubTask, apps: &[BuildApp]) -> RenderedStep {
        let commands = apps
            .iter()
            .map(|app| StepCommand {
                name: app.name.clone(),
                container: AGENT_CONTAINER.to_string(),
                command: format!(
                    "sh 'python3 {}/app_checkout.py {} --scm-app-id {} --app-name {} --app-language {} --branch-url {} --vcs-type {} --build-path {} --branch-name {}'",
                    self.scripts_dir,
                    self.base,
                    app.project_app_id,
                    app.name,
                    app.language,
                    app.branch_url,
                    VCS_TYPE,
                    app.build_path,
                    app.branch,
                ),
            })
            .collect();

        step(task, commands)
    }

    pub fn compile(&self, task: &SubTask, apps: &[BuildApp]) -> RenderedStep {
        let commands = apps
            .iter()
            .map(|app| match &app.compile {
                CompileMode::Skip => StepCommand {
                    name: app.name.clone(),
                    container: AGENT_CONTAINER.to_string(),
                    command: "echo 'no compile environment configured, skip compile'".to_string(),
                },
                CompileMode::Custom(command) => StepCommand {
                    name: app.name.clone(),
                    container: app.compile_container(),
                    command: format!("sh 'cd {}; {}'", app.app_path, command),
                },
                CompileMode::Default => StepCommand {
                    name: app.name.clone(),
                    container: app.compile_container(),
                    command: "echo 'no compile command defined, skip compile'".to_string(),
                },
            })
            .collect();

        step(task, commands)
    }

    /// One image build per app with a resolved image address
    pub fn build_image(&self, task: &SubTask, apps: &[BuildApp]) -> RenderedStep {
        let commands = apps
            .iter()
            .filter_map(|app| {
                let Some(image) = &app.image_addr else {
                    tracing::warn!("App {} has no resolved image, image build skipped", app.name);
                    return None;
                };
                Some(StepCommand {
                    name: app.name.clone(),
                    container: IMAGE_BUILDER_CONTAINER.to_string(),
                    command: format!(
                        "sh \"cd {}; export DOCKER_CONFIG=$DOCKER_CONFIG; /kaniko/executor -f Dockerfile -c ./ -d {} --insecure --skip-tls-verify --insecure-pull\"",
                        app.app_path, image
                    ),
                })
            })
            .collect();

        step(task, commands)
    }

    /// One health check per workload resource
    pub fn health_check(
        &self,
        task: &SubTask,
        cluster: &str,
        namespace: &str,
        targets: &[HealthCheckTarget],
    ) -> RenderedStep {
        let commands = targets
            .iter()
            .map(|target| StepCommand {
                name: target.resource_name.clone(),
                container: AGENT_CONTAINER.to_string(),
                command: format!(
                    "sh 'python3 {}/healthcheck.py {} --cluster {} --namespace {} --app-name {} --service-name {}'",
                    self.scripts_dir,
                    self.base,
                    cluster,
                    namespace,
                    target.app_name,
                    target.resource_name,
                ),
            })
            .collect();

        step(task, commands)
    }
}

fn step(task: &SubTask, commands: Vec<StepCommand>) -> RenderedStep {
    RenderedStep {
        name: task.name.clone(),
        kind: task.kind,
        commands,
    }
}

/// Compile containers of the apps that have a compile environment
pub fn compile_containers(apps: &[BuildApp], working_dir: &str) -> Vec<ContainerTemplate> {
    apps.iter()
        .filter_map(|app| {
            app.compile_env
                .as_ref()
                .map(|env| ContainerTemplate::from_compile_env(app.compile_container(), env, working_dir))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> StepRenderer<'static> {
        StepRenderer::new(
            BaseInfo {
                project_id: 1,
                stage_id: 2,
                job_id: 3,
            },
            "/scripts",
        )
    }

    fn app(name: &str, compile: CompileMode, image_addr: Option<&str>) -> BuildApp {
        BuildApp {
            project_app_id: 10,
            name: name.to_string(),
            language: "go".to_string(),
            branch: "dev".to_string(),
            branch_url: format!("http://git/{}.git", name),
            build_path: "/".to_string(),
            app_path: app_path("/ws", 1, 2, name, "dev", "/"),
            compile,
            compile_env: None,
            image_addr: image_addr.map(str::to_string),
        }
    }

    #[test]
    fn test_base_info_block() {
        assert_eq!(
            renderer().base.to_string(),
            "--project-id 1 --stage-id 2 --publish-job-id 3"
        );
    }

    #[test]
    fn test_app_path_collapses_slashes() {
        assert_eq!(app_path("/ws/", 1, 2, "api", "dev", "/"), "/ws/1/2/api/dev/");
        assert_eq!(app_path("/ws", 1, 2, "api", "dev", "/cmd/server"), "/ws/1/2/api/dev/cmd/server");
    }

    #[test]
    fn test_render_build_keeps_sub_task_order() {
        let apps = vec![app("api", CompileMode::Skip, Some("r/api:dev-1234567"))];
        let tasks = vec![
            SubTask::new(1, "build image", SubTaskKind::BuildImage),
            SubTask::new(2, "checkout", SubTaskKind::Checkout),
            SubTask::new(3, "manual gate", SubTaskKind::Manual),
            SubTask::new(4, "compile", SubTaskKind::Compile),
        ];

        let kinds: Vec<_> = renderer()
            .render_build(&tasks, &apps)
            .into_iter()
            .map(|step| step.kind)
            .collect();

        assert_eq!(
            kinds,
            vec![SubTaskKind::BuildImage, SubTaskKind::Checkout, SubTaskKind::Compile]
        );
    }

    #[test]
    fn test_checkout_command() {
        let step = renderer().checkout(
            &SubTask::new(1, "checkout", SubTaskKind::Checkout),
            &[app("api", CompileMode::Skip, None)],
        );
        assert_eq!(step.commands.len(), 1);
        let command = &step.commands[0].command;
        assert!(command.starts_with("sh 'python3 /scripts/app_checkout.py --project-id 1"));
        assert!(command.contains("--branch-url http://git/api.git --vcs-type git"));
        assert!(command.ends_with("--branch-name dev'"));
    }

    #[test]
    fn test_compile_modes() {
        let apps = vec![
            app("Api", CompileMode::Custom("make build".to_string()), None),
            app("web", CompileMode::Skip, None),
            app("worker", CompileMode::Default, None),
        ];
        let step = renderer().compile(&SubTask::new(2, "compile", SubTaskKind::Compile), &apps);

        assert_eq!(step.commands[0].container, "api");
        assert_eq!(step.commands[0].command, "sh 'cd /ws/1/2/Api/dev/; make build'");
        assert_eq!(step.commands[1].container, AGENT_CONTAINER);
        assert!(step.commands[1].command.contains("skip compile"));
        assert_eq!(step.commands[2].container, "worker");
        assert!(step.commands[2].command.contains("no compile command"));
    }

    #[test]
    fn test_build_image_skips_unresolved() {
        let apps = vec![
            app("api", CompileMode::Skip, Some("r/api:latest")),
            app("web", CompileMode::Skip, None),
        ];
        let step = renderer().build_image(&SubTask::new(3, "image", SubTaskKind::BuildImage), &apps);

        assert_eq!(step.commands.len(), 1);
        assert_eq!(step.commands[0].container, IMAGE_BUILDER_CONTAINER);
        assert!(step.commands[0].command.contains("-d r/api:latest --insecure"));
    }

    #[test]
    fn test_health_check_per_resource() {
        let targets = vec![
            HealthCheckTarget {
                app_name: "api".to_string(),
                resource_name: "api-main".to_string(),
            },
            HealthCheckTarget {
                app_name: "api".to_string(),
                resource_name: "api-worker".to_string(),
            },
        ];
        let step = renderer().health_check(
            &SubTask::new(1, "health", SubTaskKind::HealthCheck),
            "prod",
            "shop",
            &targets,
        );

        assert_eq!(step.commands.len(), 2);
        assert!(step.commands[1].command.contains(
            "--cluster prod --namespace shop --app-name api --service-name api-worker"
        ));
    }
}
