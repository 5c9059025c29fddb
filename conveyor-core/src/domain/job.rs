//! Publish job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One build or deploy submission belonging to a publish order's stage.
///
/// Structure shared between the orchestrator (persists and submits) and the
/// callback path (completes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: i64,
    pub publish_id: i64,
    pub project_id: i64,
    pub stage_id: i64,
    pub job_type: JobType,
    pub run_id: Option<i64>,
    pub status: JobStatus,
    pub creator: String,
    pub apps: Vec<JobAppParams>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Kind of submission a publish job represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Build,
    Deploy,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Build => "build",
            JobType::Deploy => "deploy",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(JobType::Build),
            "deploy" => Ok(JobType::Deploy),
            other => Err(format!("unsupported job type: {}", other)),
        }
    }
}

/// Publish job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Init,
    Running,
    Success,
    Failed,
    Abort,
}

impl JobStatus {
    pub const ACTIVE: [JobStatus; 2] = [JobStatus::Running, JobStatus::Init];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Init => "init",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Abort => "abort",
        }
    }

    /// Init and Running jobs occupy their execution scope.
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(JobStatus::Init),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "abort" => Ok(JobStatus::Abort),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Per-app parameters recorded on a publish job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAppParams {
    pub project_app_id: i64,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub image_addr: Option<String>,
}

/// Execution scope guarded against concurrent active jobs.
///
/// Builds are scoped to (project, stage, publish), deploys to (project, stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobScope {
    pub project_id: i64,
    pub stage_id: i64,
    pub publish_id: Option<i64>,
    pub job_type: JobType,
}

impl JobScope {
    pub fn build(project_id: i64, stage_id: i64, publish_id: i64) -> Self {
        Self {
            project_id,
            stage_id,
            publish_id: Some(publish_id),
            job_type: JobType::Build,
        }
    }

    pub fn deploy(project_id: i64, stage_id: i64) -> Self {
        Self {
            project_id,
            stage_id,
            publish_id: None,
            job_type: JobType::Deploy,
        }
    }

    /// Whether `job` falls inside this scope.
    pub fn contains(&self, job: &PublishJob) -> bool {
        job.project_id == self.project_id
            && job.stage_id == self.stage_id
            && job.job_type == self.job_type
            && self.publish_id.is_none_or(|id| id == job.publish_id)
    }
}

/// A publish job about to be persisted with status Init
#[derive(Debug, Clone)]
pub struct NewPublishJob {
    pub publish_id: i64,
    pub project_id: i64,
    pub stage_id: i64,
    pub job_type: JobType,
    pub creator: String,
    pub apps: Vec<JobAppParams>,
}

impl NewPublishJob {
    pub fn scope(&self) -> JobScope {
        match self.job_type {
            JobType::Build => JobScope::build(self.project_id, self.stage_id, self.publish_id),
            JobType::Deploy => JobScope::deploy(self.project_id, self.stage_id),
        }
    }
}
