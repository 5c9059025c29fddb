//! Pipeline snapshot domain types
//!
//! A pipeline instance is the stage/step template frozen when a publish order
//! starts. Stages hold ordered steps, steps hold ordered sub-tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage/step template snapshot in effect for a publish order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInstance {
    pub id: i64,
    pub stages: Vec<StageDefinition>,
}

impl PipelineInstance {
    pub fn stage(&self, stage_id: i64) -> Option<&StageDefinition> {
        self.stages.iter().find(|stage| stage.stage_id == stage_id)
    }

    /// Compares against the final element of the raw stage list.
    pub fn is_last_stage(&self, stage_id: i64) -> bool {
        self.stages
            .last()
            .is_some_and(|stage| stage.stage_id == stage_id)
    }
}

/// Declarative description of a pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub stage_id: i64,
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl StageDefinition {
    pub fn step(&self, index: i32) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.index == index)
    }

    pub fn last_step_index(&self) -> Option<i32> {
        self.steps.last().map(|step| step.index)
    }

    pub fn is_last_step(&self, index: i32) -> bool {
        self.last_step_index() == Some(index)
    }

    /// Index of the step declared right after `index`, if any.
    pub fn next_step_index(&self, index: i32) -> Option<i32> {
        self.steps
            .iter()
            .map(|step| step.index)
            .filter(|candidate| *candidate > index)
            .min()
    }
}

/// One step of a stage: a typed, ordered list of sub-tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub index: i32,
    #[serde(default)]
    pub step_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Build,
    Deploy,
    Manual,
    Verify,
    #[serde(other)]
    Unknown,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Build => "build",
            StepType::Deploy => "deploy",
            StepType::Manual => "manual",
            StepType::Verify => "verify",
            StepType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Smallest unit of pipeline work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub index: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SubTaskKind,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl SubTask {
    pub fn new(index: i32, name: impl Into<String>, kind: SubTaskKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
            params: serde_json::Value::Null,
        }
    }

    /// checkout → compile → build-image, used when a build step declares no sub-tasks
    pub fn default_build() -> Vec<SubTask> {
        vec![
            SubTask::new(1, "checkout", SubTaskKind::Checkout),
            SubTask::new(2, "compile", SubTaskKind::Compile),
            SubTask::new(3, "build image", SubTaskKind::BuildImage),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubTaskKind {
    Checkout,
    Compile,
    BuildImage,
    HealthCheck,
    Manual,
    #[serde(other)]
    Unknown,
}

impl SubTaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskKind::Checkout => "checkout",
            SubTaskKind::Compile => "compile",
            SubTaskKind::BuildImage => "build-image",
            SubTaskKind::HealthCheck => "health-check",
            SubTaskKind::Manual => "manual",
            SubTaskKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SubTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
