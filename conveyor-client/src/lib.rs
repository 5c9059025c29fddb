//! Conveyor HTTP Client
//!
//! A type-safe HTTP client for the Conveyor orchestrator API, used by the
//! operator CLI and by anything else that drives publish orders remotely.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_client::OrchestratorClient;
//! use conveyor_core::dto::job::{CreateDeployJob, DeployAppRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let launched = client
//!         .create_deploy_job(1, 22, 3, CreateDeployJob {
//!             creator: "alice".to_string(),
//!             apps: vec![DeployAppRequest { project_app_id: 11 }],
//!         })
//!         .await?;
//!
//!     println!("Submitted {} run {}", launched.job_name, launched.run_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod publishes;
mod steps;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Conveyor orchestrator API
///
/// Methods are organized into two groups:
/// - Publish job lifecycle (build, deploy, terminate, abort, manual confirm)
/// - Step inspection and previews
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use conveyor_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a publish order endpoint under a project pipeline
    fn pipeline_url(&self, project_id: i64, publish_id: i64, path: &str) -> String {
        format!(
            "{}/api/v1/pipelines/{}/publishes/{}/{}",
            self.base_url, project_id, publish_id, path
        )
    }

    /// URL of a project-independent publish endpoint
    fn publish_url(&self, publish_id: i64, path: &str) -> String {
        format!("{}/api/v1/publishes/{}/{}", self.base_url, publish_id, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_endpoint_urls() {
        let client = OrchestratorClient::new("http://localhost:8080");
        assert_eq!(
            client.pipeline_url(1, 22, "stages/3/build"),
            "http://localhost:8080/api/v1/pipelines/1/publishes/22/stages/3/build"
        );
        assert_eq!(
            client.publish_url(22, "steps/current"),
            "http://localhost:8080/api/v1/publishes/22/steps/current"
        );
    }
}
