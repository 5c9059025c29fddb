//! Publish order domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One end-to-end delivery attempt for a project.
///
/// The order points at the pipeline snapshot it runs against
/// (`last_pipeline_instance_id`) and at the stage/step currently in effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOrder {
    pub id: i64,
    pub project_id: i64,
    pub version_no: String,
    pub name: String,
    pub stage_id: i64,
    pub step_index: i32,
    pub step: String,
    pub step_type: String,
    pub status: PublishStatus,
    pub creator: String,
    pub last_pipeline_instance_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Lifecycle status of a publish order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Init,
    Running,
    Success,
    Failed,
    TerminateSuccess,
    TerminateFailed,
    Abort,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Init => "init",
            PublishStatus::Running => "running",
            PublishStatus::Success => "success",
            PublishStatus::Failed => "failed",
            PublishStatus::TerminateSuccess => "terminate_success",
            PublishStatus::TerminateFailed => "terminate_failed",
            PublishStatus::Abort => "abort",
        }
    }

    /// Success, TerminateSuccess and Abort accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishStatus::Success | PublishStatus::TerminateSuccess | PublishStatus::Abort
        )
    }

    /// Checks whether an explicit termination may start from this status.
    pub fn check_terminate(&self) -> Result<(), TransitionError> {
        match self {
            PublishStatus::TerminateSuccess => Err(TransitionError::AlreadyTerminated),
            PublishStatus::Running | PublishStatus::TerminateFailed => Ok(()),
            other => Err(TransitionError::NotAllowed {
                from: *other,
                action: "terminate",
            }),
        }
    }

    /// Checks whether a forced abort may start from this status.
    pub fn check_abort(&self) -> Result<(), TransitionError> {
        match self {
            PublishStatus::Running | PublishStatus::TerminateFailed => Ok(()),
            other => Err(TransitionError::NotAllowed {
                from: *other,
                action: "abort",
            }),
        }
    }

    /// Checks whether a step of this order may still be advanced.
    pub fn check_advance(&self) -> Result<(), TransitionError> {
        match self {
            PublishStatus::Init | PublishStatus::Running => Ok(()),
            other => Err(TransitionError::NotAllowed {
                from: *other,
                action: "advance",
            }),
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(PublishStatus::Init),
            "running" => Ok(PublishStatus::Running),
            "success" => Ok(PublishStatus::Success),
            "failed" => Ok(PublishStatus::Failed),
            "terminate_success" => Ok(PublishStatus::TerminateSuccess),
            "terminate_failed" => Ok(PublishStatus::TerminateFailed),
            "abort" => Ok(PublishStatus::Abort),
            other => Err(format!("unknown publish status: {}", other)),
        }
    }
}

/// Rejected publish status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    AlreadyTerminated,
    NotAllowed {
        from: PublishStatus,
        action: &'static str,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::AlreadyTerminated => {
                write!(f, "publish order already terminated, operation rejected")
            }
            TransitionError::NotAllowed { from, action } => write!(
                f,
                "publish order in status {} is not allowed to {}, operation rejected",
                from, action
            ),
        }
    }
}

impl std::error::Error for TransitionError {}

/// An application selected for a publish order, with the branch it ships
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishApp {
    pub id: i64,
    pub publish_id: i64,
    pub project_app_id: i64,
    pub branch_name: String,
    pub compile_command: Option<String>,
}

/// Audit record of a manual pipeline operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: i64,
    pub publish_id: i64,
    pub pipeline_instance_id: i64,
    pub stage_id: i64,
    pub step_index: i32,
    pub step: String,
    pub creator: String,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
