//! Project domain types
//!
//! Read-mostly reference data owned by the data-access layer: projects, their
//! applications and source repositories, stage environments, compile
//! environments, deployment arrangements and image mappings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Ended,
}

/// An application under a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectApp {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Repository path on the SCM host, e.g. `team/service`
    pub full_name: String,
    pub language: String,
    pub repo_id: i64,
    pub build_path: String,
    pub compile_env_id: Option<i64>,
}

/// Source repository host credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: i64,
    pub kind: RepoKind,
    pub base_url: String,
    pub user: String,
    pub token: String,
}

impl Repo {
    /// Host part of the base URL, without scheme and trailing slash
    pub fn host(&self) -> &str {
        let url = self
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Github,
    Gitlab,
    Gitea,
}

impl RepoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Github => "github",
            RepoKind::Gitlab => "gitlab",
            RepoKind::Gitea => "gitea",
        }
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(RepoKind::Github),
            "gitlab" => Ok(RepoKind::Gitlab),
            "gitea" => Ok(RepoKind::Gitea),
            other => Err(format!("unsupported repository kind: {}", other)),
        }
    }
}

/// Stage environment: binds a pipeline stage to its CI server, cluster,
/// namespace and registry integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEnv {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub namespace: String,
    pub ci_server: i64,
    pub cluster: i64,
    pub registry: i64,
}

/// Container image used to compile an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileEnv {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub command: String,
    pub args: String,
}

/// Deployment manifest template of an app in one stage environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppArrange {
    pub id: i64,
    pub project_app_id: i64,
    pub env_id: i64,
    pub config: String,
}

/// Binds an app's deployable resource to a base image and a tagging policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMapping {
    pub id: i64,
    pub arrange_id: i64,
    pub project_app_id: i64,
    pub image: String,
    pub tag_policy: TagPolicy,
}

/// Rule for deriving a deployable image's tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagPolicy {
    /// `<branch>-<short sha>` of the latest commit on the publish branch
    SystemDefault,
    /// Always `latest`
    Latest,
    /// The image reference as written in the mapping
    Origin,
}

impl TagPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagPolicy::SystemDefault => "system_default",
            TagPolicy::Latest => "latest",
            TagPolicy::Origin => "origin",
        }
    }
}

impl fmt::Display for TagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_default" => Ok(TagPolicy::SystemDefault),
            "latest" => Ok(TagPolicy::Latest),
            "origin" => Ok(TagPolicy::Origin),
            other => Err(format!("unknown tag policy: {}", other)),
        }
    }
}
