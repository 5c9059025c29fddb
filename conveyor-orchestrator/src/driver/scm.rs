//! Source control commit lookup over the GitHub, GitLab and Gitea APIs

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_core::domain::project::{Repo, RepoKind};
use reqwest::{Client, RequestBuilder};

use super::{Commit, CommitListOptions, ScmProvider};

pub struct HttpScmProvider {
    client: Client,
}

impl HttpScmProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn commits_request(
        &self,
        repo: &Repo,
        full_name: &str,
        options: &CommitListOptions,
    ) -> RequestBuilder {
        let base_url = repo.base_url.trim_end_matches('/');
        let page = options.page.to_string();
        let page_size = options.page_size.to_string();

        match repo.kind {
            RepoKind::Github => self
                .client
                .get(format!("{}/repos/{}/commits", base_url, full_name))
                .bearer_auth(&repo.token)
                .header(reqwest::header::USER_AGENT, "conveyor")
                .query(&[
                    ("sha", options.branch.as_str()),
                    ("page", page.as_str()),
                    ("per_page", page_size.as_str()),
                ]),
            RepoKind::Gitlab => self
                .client
                .get(format!(
                    "{}/api/v4/projects/{}/repository/commits",
                    base_url,
                    full_name.replace('/', "%2F")
                ))
                .header("PRIVATE-TOKEN", &repo.token)
                .query(&[
                    ("ref_name", options.branch.as_str()),
                    ("page", page.as_str()),
                    ("per_page", page_size.as_str()),
                    ("order", options.order.as_str()),
                ]),
            RepoKind::Gitea => self
                .client
                .get(format!("{}/api/v1/repos/{}/commits", base_url, full_name))
                .header(reqwest::header::AUTHORIZATION, format!("token {}", repo.token))
                .query(&[
                    ("sha", options.branch.as_str()),
                    ("page", page.as_str()),
                    ("limit", page_size.as_str()),
                ]),
        }
    }
}

#[async_trait]
impl ScmProvider for HttpScmProvider {
    async fn list_commits(
        &self,
        repo: &Repo,
        full_name: &str,
        options: &CommitListOptions,
    ) -> Result<Vec<Commit>> {
        let response = self
            .commits_request(repo, full_name, options)
            .send()
            .await
            .with_context(|| format!("Failed to list commits of {}", full_name))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to list commits of {}: {} - {}", full_name, status, body);
        }

        let commits = response
            .json::<Vec<Commit>>()
            .await
            .context("Failed to parse commit list")?;

        Ok(commits)
    }
}
