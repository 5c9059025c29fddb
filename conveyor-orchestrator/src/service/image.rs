//! Image tag resolution
//!
//! Maps an image mapping plus the publish branch of its app to a concrete
//! image address according to the mapping's tag policy.

use conveyor_core::domain::project::{AppArrange, ImageMapping, ProjectApp, Repo, TagPolicy};

use super::{EngineError, PipelineManager};
use crate::driver::{Commit, CommitListOptions, ScmProvider};

/// Source of the app whose image is resolved
#[derive(Debug, Clone, Copy)]
pub struct ImageSource<'a> {
    pub repo: &'a Repo,
    pub full_name: &'a str,
    pub branch: &'a str,
}

/// Image reference without its tag or digest.
///
/// A colon only starts a tag when no `/` follows it, so registry ports are
/// kept: `host:5000/app:v1` becomes `host:5000/app`.
pub fn strip_tag(image: &str) -> &str {
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    match image.rfind(':') {
        Some(pos) if !image[pos + 1..].contains('/') => &image[..pos],
        _ => image,
    }
}

pub fn with_tag(image: &str, tag: &str) -> String {
    format!("{}:{}", strip_tag(image), tag)
}

/// `<branch>-<short sha>` of the newest commit, `<branch>-latest` without commits
pub fn system_default_tag(branch: &str, commits: &[Commit]) -> String {
    match commits.first() {
        Some(commit) => {
            let short = commit.sha.get(..7).unwrap_or(&commit.sha);
            format!("{}-{}", branch, short)
        }
        None => format!("{}-latest", branch),
    }
}

/// Resolves the image address of a mapping.
///
/// Only SystemDefault consults source control. A failed commit lookup is an
/// error the caller may treat as a per-app skip.
pub async fn resolve_image(
    scm: &dyn ScmProvider,
    mapping: &ImageMapping,
    source: ImageSource<'_>,
) -> Result<String, EngineError> {
    let image = match mapping.tag_policy {
        TagPolicy::Origin => mapping.image.clone(),
        TagPolicy::Latest => with_tag(&mapping.image, "latest"),
        TagPolicy::SystemDefault => {
            let commits = scm
                .list_commits(
                    source.repo,
                    source.full_name,
                    &CommitListOptions::latest(source.branch),
                )
                .await
                .map_err(|e| {
                    EngineError::external(
                        &format!("commit lookup of {}@{} failed", source.full_name, source.branch),
                        e,
                    )
                })?;
            with_tag(&mapping.image, &system_default_tag(source.branch, &commits))
        }
    };

    tracing::debug!(
        "Resolved image {} -> {} ({})",
        mapping.image,
        image,
        mapping.tag_policy
    );
    Ok(image)
}

impl PipelineManager {
    /// Image mapping of an app's arrangement and its resolved address.
    ///
    /// Missing mappings and failed lookups are logged and yield None.
    pub(crate) async fn mapped_image(
        &self,
        arrange: &AppArrange,
        app: &ProjectApp,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<(ImageMapping, String)>, EngineError> {
        let Some(mapping) = self.projects.get_image_mapping(arrange.id, app.id).await? else {
            tracing::warn!(
                "App {} has no image mapping in arrangement {}, skipped",
                app.name,
                arrange.id
            );
            return Ok(None);
        };

        let source = ImageSource {
            repo,
            full_name: &app.full_name,
            branch,
        };
        match resolve_image(self.drivers.scm.as_ref(), &mapping, source).await {
            Ok(image) => Ok(Some((mapping, image))),
            Err(err) => {
                tracing::warn!("Image of app {} not resolved, skipped: {}", app.name, err);
                Ok(None)
            }
        }
    }

    /// Resolved image of an app in a stage environment, if any
    pub(crate) async fn app_image(
        &self,
        env_id: i64,
        app: &ProjectApp,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<String>, EngineError> {
        let Some(arrange) = self.projects.get_arrange(app.id, env_id).await? else {
            tracing::warn!("App {} has no arrangement in env {}, image skipped", app.name, env_id);
            return Ok(None);
        };
        Ok(self
            .mapped_image(&arrange, app, repo, branch)
            .await?
            .map(|(_, image)| image))
    }
}
