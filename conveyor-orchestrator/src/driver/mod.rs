//! External drivers
//!
//! Drivers are stateless HTTP clients for the systems the engine coordinates:
//! the CI execution backend, source control hosts and the orchestration
//! cluster. They carry no business logic.
//!
//! All drivers are trait-based so the engine can be exercised with fakes.

mod ci;
mod cluster;
pub mod plan;
mod scm;

use anyhow::Result;
use async_trait::async_trait;
use conveyor_core::domain::project::Repo;
use conveyor_core::domain::setting::{CiDriverConfig, ClusterConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use ci::{HttpCiDriver, HttpCiDriverFactory};
pub use cluster::HttpClusterApplier;
pub use plan::ExecutionPlan;
pub use scm::HttpScmProvider;

/// CI execution backend
#[async_trait]
pub trait CiDriver: Send + Sync {
    /// Health check of the backend
    async fn ping(&self) -> Result<()>;

    /// Submits a plan under `job_name` and returns the run identifier
    async fn build(&self, job_name: &str, plan: &ExecutionPlan) -> Result<i64>;

    /// Stops a running build
    async fn abort(&self, job_name: &str, run_id: i64) -> Result<()>;
}

/// Creates CI drivers for the backend configured on a stage
pub trait CiDriverFactory: Send + Sync {
    fn connect(&self, config: &CiDriverConfig) -> Arc<dyn CiDriver>;
}

/// A commit returned by a source control host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(alias = "id")]
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitListOptions {
    pub branch: String,
    pub page: u32,
    pub page_size: u32,
    pub order: String,
}

impl CommitListOptions {
    /// First page of the topologically ordered history of `branch`
    pub fn latest(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            page: 1,
            page_size: 30,
            order: "topo".to_string(),
        }
    }
}

/// Source control commit lookup
#[async_trait]
pub trait ScmProvider: Send + Sync {
    async fn list_commits(
        &self,
        repo: &Repo,
        full_name: &str,
        options: &CommitListOptions,
    ) -> Result<Vec<Commit>>;
}

/// Manifest submitted to the orchestration cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub cluster: String,
    pub namespace: String,
    pub manifest: String,
    pub project_id: i64,
    pub stage_id: i64,
    pub wait_ready: bool,
}

/// Orchestration platform manifest applier
#[async_trait]
pub trait ClusterApplier: Send + Sync {
    async fn apply(&self, cluster: &ClusterConfig, request: &ApplyRequest) -> Result<()>;
}

/// External collaborators injected into the pipeline manager
#[derive(Clone)]
pub struct Drivers {
    pub ci: Arc<dyn CiDriverFactory>,
    pub scm: Arc<dyn ScmProvider>,
    pub cluster: Arc<dyn ClusterApplier>,
}

impl Drivers {
    /// HTTP drivers sharing one client
    pub fn http(client: reqwest::Client) -> Self {
        Self {
            ci: Arc::new(HttpCiDriverFactory::new(client.clone())),
            scm: Arc::new(HttpScmProvider::new(client.clone())),
            cluster: Arc::new(HttpClusterApplier::new(client)),
        }
    }
}
