//! Job DTOs for the orchestrator API and CI driver callbacks

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobStatus, JobType};
use crate::domain::publish::PublishStatus;

/// Environment variable handed to a CI job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvItem {
    pub key: String,
    pub value: String,
}

impl EnvItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An app requested in a build step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildAppRequest {
    pub project_app_id: i64,
    pub branch: String,
    /// Clone URL of the branch
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub compile_command: Option<String>,
}

/// Request to trigger the build step of a publish order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBuildJob {
    pub creator: String,
    pub apps: Vec<BuildAppRequest>,
    #[serde(default)]
    pub env_vars: Vec<EnvItem>,
}

/// An app requested in a deploy step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAppRequest {
    pub project_app_id: i64,
}

/// Request to trigger the deploy step of a publish order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeployJob {
    pub creator: String,
    pub apps: Vec<DeployAppRequest>,
}

/// A job accepted by the CI driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLaunched {
    pub run_id: i64,
    pub job_name: String,
}

/// Request to terminate the running job of a publish order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminatePublish {
    pub job_type: JobType,
}

/// Final result reported by the CI driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Failed,
}

/// Completion callback posted by the CI driver.
///
/// The driver posts back the callback body it was given (`publish_job_id`)
/// together with the run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCallback {
    pub publish_job_id: i64,
    pub status: JobOutcome,
}

/// What a callback changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResult {
    pub job_status: JobStatus,
    pub publish_status: PublishStatus,
    pub step_index: i32,
    /// Job created for the next step, if it was triggered automatically
    pub next_job: Option<JobLaunched>,
}
