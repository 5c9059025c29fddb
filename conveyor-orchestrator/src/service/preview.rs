//! Read-only previews of a publish order's apps

use conveyor_core::dto::publish::{BranchPreview, BranchPreviewApp, DeployAppImage};

use super::pipeline::stage_of;
use super::{EngineError, PipelineManager};

const DEFAULT_BRANCH: &str = "master";
const APP_KIND: &str = "app";

impl PipelineManager {
    /// Branch choices of every app of the order for a build in `stage_id`
    pub async fn branch_preview(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
    ) -> Result<BranchPreview, EngineError> {
        let (_, publish) = self.verify_project_publish(project_id, publish_id).await?;
        let instance = self.pipeline_instance(&publish).await?;
        stage_of(&instance, stage_id)?;

        let mut apps = Vec::new();
        for publish_app in self.publishes.get_publish_apps(publish_id).await? {
            let Some(app) = self.projects.get_project_app(publish_app.project_app_id).await? else {
                tracing::warn!(
                    "App {} of publish {} does not exist, skipped",
                    publish_app.project_app_id,
                    publish_id
                );
                continue;
            };

            let mut branch_history = self.projects.app_branches(app.id).await?;
            if branch_history.is_empty() {
                branch_history.push(DEFAULT_BRANCH.to_string());
            }

            apps.push(BranchPreviewApp {
                project_app_id: app.id,
                app_name: app.name,
                language: app.language,
                build_path: app.build_path,
                branch_name: publish_app.branch_name,
                compile_command: publish_app.compile_command,
                target_branch: vec![DEFAULT_BRANCH.to_string()],
                branch_history,
                kind: APP_KIND.to_string(),
            });
        }

        Ok(BranchPreview {
            version_no: publish.version_no,
            version_name: publish.name,
            apps,
        })
    }

    /// Images a deploy of the order's current stage would roll out.
    ///
    /// Resolution is best effort: apps without an arrangement, mapping or
    /// reachable source host are listed without an image.
    pub async fn deploy_app_images(
        &self,
        publish_id: i64,
    ) -> Result<Vec<DeployAppImage>, EngineError> {
        let publish = self.get_publish(publish_id).await?;

        let mut images = Vec::new();
        for publish_app in self.publishes.get_publish_apps(publish_id).await? {
            let Some(app) = self.projects.get_project_app(publish_app.project_app_id).await? else {
                tracing::warn!(
                    "App {} of publish {} does not exist, skipped",
                    publish_app.project_app_id,
                    publish_id
                );
                continue;
            };

            let image_addr = match self.projects.get_repo(app.repo_id).await? {
                Some(repo) => {
                    self.app_image(publish.stage_id, &app, &repo, &publish_app.branch_name)
                        .await?
                }
                None => {
                    tracing::warn!("Repository {} of app {} does not exist", app.repo_id, app.name);
                    None
                }
            };

            images.push(DeployAppImage {
                project_app_id: app.id,
                name: app.name,
                kind: APP_KIND.to_string(),
                image_addr,
            });
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_branch_preview_defaults_history() {
        let fixture = Fixture::new();
        fixture.projects.add_branches(Fixture::API_APP, &["dev", "feature"]);

        let preview = fixture
            .manager()
            .branch_preview(fixture.project_id, fixture.publish_id, fixture.stage_id)
            .await
            .unwrap();

        assert_eq!(preview.version_no, "v1.2.0");
        assert_eq!(preview.apps.len(), 2);

        let api = &preview.apps[0];
        assert_eq!(api.app_name, "api");
        assert_eq!(api.branch_name, "feature");
        assert_eq!(api.branch_history, vec!["dev", "feature"]);
        assert_eq!(api.target_branch, vec!["master"]);

        let web = &preview.apps[1];
        assert_eq!(web.branch_history, vec!["master"]);
        assert_eq!(web.kind, "app");
    }

    #[tokio::test]
    async fn test_deploy_images_are_best_effort() {
        let fixture = Fixture::new();
        fixture.projects.remove_image_mappings(Fixture::API_APP);

        let images = fixture
            .manager()
            .deploy_app_images(fixture.publish_id)
            .await
            .unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "api");
        assert!(images[0].image_addr.is_none());
        assert_eq!(images[1].image_addr.as_deref(), Some("registry/app:latest"));
    }
}
