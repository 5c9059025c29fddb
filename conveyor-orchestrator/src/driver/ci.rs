//! CI driver over HTTP
//!
//! Speaks the JSON REST protocol of the CI backend:
//! - `GET  {url}/api/ping`
//! - `POST {url}/api/jobs/{name}/builds` with the plan, answering `{ "run_id": n }`
//! - `POST {url}/api/jobs/{name}/builds/{run}/abort`

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_core::domain::setting::CiDriverConfig;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::{CiDriver, CiDriverFactory, ExecutionPlan};

/// HTTP implementation of CiDriver
pub struct HttpCiDriver {
    client: Client,
    base_url: String,
    user: String,
    token: String,
}

impl HttpCiDriver {
    pub fn new(client: Client, config: &CiDriverConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl CiDriver for HttpCiDriver {
    async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/ping", self.base_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .context("Failed to reach CI server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("CI server ping failed: {} - {}", status, body);
        }

        Ok(())
    }

    async fn build(&self, job_name: &str, plan: &ExecutionPlan) -> Result<i64> {
        let url = format!("{}/api/jobs/{}/builds", self.base_url, job_name);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.token))
            .json(plan)
            .send()
            .await
            .context("Failed to submit build")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to submit build: {} - {}", status, body);
        }

        let accepted = response
            .json::<BuildAccepted>()
            .await
            .context("Failed to parse build response")?;

        Ok(accepted.run_id)
    }

    async fn abort(&self, job_name: &str, run_id: i64) -> Result<()> {
        let url = format!(
            "{}/api/jobs/{}/builds/{}/abort",
            self.base_url, job_name, run_id
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .context("Failed to abort build")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to abort build: {} - {}", status, body);
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BuildAccepted {
    run_id: i64,
}

/// Creates HttpCiDriver instances sharing one reqwest client
pub struct HttpCiDriverFactory {
    client: Client,
}

impl HttpCiDriverFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl CiDriverFactory for HttpCiDriverFactory {
    fn connect(&self, config: &CiDriverConfig) -> Arc<dyn CiDriver> {
        Arc::new(HttpCiDriver::new(self.client.clone(), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::plan::CallbackDescriptor;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn driver(server: &MockServer) -> HttpCiDriver {
        let config = CiDriverConfig {
            url: format!("{}/", server.uri()),
            user: "ci".to_string(),
            token: "secret".to_string(),
            workspace: "/ws".to_string(),
        };
        HttpCiDriver::new(Client::new(), &config)
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan::new(
            vec![],
            vec![],
            vec![],
            CallbackDescriptor {
                token: "t".to_string(),
                url: "http://cb".to_string(),
                body: serde_json::json!({ "publish_job_id": 1 }),
            },
        )
    }

    #[tokio::test]
    async fn test_ping_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ping"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(driver(&server).ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_ping_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(driver(&server).ping().await.is_err());
    }

    #[tokio::test]
    async fn test_build_returns_run_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/jobs/conveyor_1_2_3/builds"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "run_id": 42 })))
            .mount(&server)
            .await;

        let run_id = driver(&server).build("conveyor_1_2_3", &plan()).await.unwrap();
        assert_eq!(run_id, 42);
    }

    #[tokio::test]
    async fn test_abort_reports_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/jobs/conveyor_1_3/builds/9/abort"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such build"))
            .mount(&server)
            .await;

        let err = driver(&server).abort("conveyor_1_3", 9).await.unwrap_err();
        assert!(err.to_string().contains("no such build"));
    }
}
