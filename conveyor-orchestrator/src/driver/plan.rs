//! Execution plan handed to the CI driver
//!
//! A plan is everything the CI backend needs to run one publish job: the
//! environment, the containers to provision, the rendered steps in order and
//! the callback to invoke when the run finishes.

use conveyor_core::domain::pipeline::SubTaskKind;
use conveyor_core::domain::project::CompileEnv;
use conveyor_core::dto::job::EnvItem;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Container the backend provisions before running steps in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTemplate {
    pub name: String,
    pub image: String,
    pub working_dir: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
}

impl ContainerTemplate {
    /// Builds a template from a compile environment; command and args are
    /// split on whitespace.
    pub fn from_compile_env(name: impl Into<String>, env: &CompileEnv, working_dir: &str) -> Self {
        Self {
            name: name.into(),
            image: env.image.clone(),
            working_dir: working_dir.to_string(),
            command: split_words(&env.command),
            args: split_words(&env.args),
        }
    }
}

fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// One shell invocation inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCommand {
    /// App or resource the command works on
    pub name: String,
    pub container: String,
    pub command: String,
}

/// Backend step rendered from one sub-task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedStep {
    pub name: String,
    pub kind: SubTaskKind,
    pub commands: Vec<StepCommand>,
}

impl RenderedStep {
    /// Textual plan representation of the step
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "stage('{}') {{", self.name);
        for command in &self.commands {
            let _ = writeln!(text, "    container('{}') {{", command.container);
            let _ = writeln!(text, "        {}", command.command);
            let _ = writeln!(text, "    }}");
        }
        text.push('}');
        text
    }
}

/// Where and how the CI backend reports completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackDescriptor {
    pub token: String,
    pub url: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub env_vars: Vec<EnvItem>,
    pub containers: Vec<ContainerTemplate>,
    pub steps: Vec<RenderedStep>,
    /// Steps joined in sub-task order
    pub stages: String,
    pub callback: CallbackDescriptor,
}

impl ExecutionPlan {
    pub fn new(
        env_vars: Vec<EnvItem>,
        containers: Vec<ContainerTemplate>,
        steps: Vec<RenderedStep>,
        callback: CallbackDescriptor,
    ) -> Self {
        let stages = steps
            .iter()
            .map(RenderedStep::to_text)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            env_vars,
            containers,
            steps,
            stages,
            callback,
        }
    }

    pub fn step(&self, kind: SubTaskKind) -> Option<&RenderedStep> {
        self.steps.iter().find(|step| step.kind == kind)
    }
}
