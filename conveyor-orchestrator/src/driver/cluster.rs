//! Orchestration cluster applier
//!
//! Posts combined manifests to the apply agent of a cluster
//! (`POST {url}/api/v1/apply`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_core::domain::setting::ClusterConfig;
use reqwest::Client;

use super::{ApplyRequest, ClusterApplier};

pub struct HttpClusterApplier {
    client: Client,
}

impl HttpClusterApplier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApplier for HttpClusterApplier {
    async fn apply(&self, cluster: &ClusterConfig, request: &ApplyRequest) -> Result<()> {
        let url = format!("{}/api/v1/apply", cluster.url.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(request);
        if !cluster.token.is_empty() {
            builder = builder.bearer_auth(&cluster.token);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to reach cluster {}", request.cluster))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Failed to apply manifest on cluster {}: {} - {}",
                request.cluster,
                status,
                body
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ApplyRequest {
        ApplyRequest {
            cluster: "prod".to_string(),
            namespace: "shop".to_string(),
            manifest: "kind: Deployment".to_string(),
            project_id: 1,
            stage_id: 2,
            wait_ready: false,
        }
    }

    #[tokio::test]
    async fn test_apply_posts_manifest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/apply"))
            .and(body_partial_json(serde_json::json!({
                "namespace": "shop",
                "manifest": "kind: Deployment"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let cluster = ClusterConfig {
            url: server.uri(),
            token: "k8s".to_string(),
        };
        let applier = HttpClusterApplier::new(Client::new());
        assert!(applier.apply(&cluster, &request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_apply_failure_names_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cluster = ClusterConfig {
            url: server.uri(),
            token: String::new(),
        };
        let applier = HttpClusterApplier::new(Client::new());
        let err = applier.apply(&cluster, &request()).await.unwrap_err();
        assert!(err.to_string().contains("prod"));
    }
}
