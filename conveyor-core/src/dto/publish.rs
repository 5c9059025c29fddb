//! Publish DTOs: step inspection and previews

use serde::{Deserialize, Serialize};

/// Operation recorded for a manual step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub creator: String,
    pub message: String,
}

/// Manual history of the current and previous step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualStepInfo {
    pub current_step: StepRecord,
    pub previous_step: Option<StepRecord>,
}

/// Request to confirm the current manual step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmManualStep {
    pub creator: String,
    #[serde(default)]
    pub message: String,
}

/// Declared type and name of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTypeInfo {
    pub step_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastStepCheck {
    pub last_stage: bool,
    pub last_step: bool,
}

/// Branch choices offered for one app of a publish order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPreviewApp {
    pub project_app_id: i64,
    pub app_name: String,
    pub language: String,
    pub build_path: String,
    pub branch_name: String,
    pub compile_command: Option<String>,
    pub target_branch: Vec<String>,
    pub branch_history: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPreview {
    pub version_no: String,
    pub version_name: String,
    pub apps: Vec<BranchPreviewApp>,
}

/// Image a deploy step would roll out for one app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAppImage {
    pub project_app_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub image_addr: Option<String>,
}
