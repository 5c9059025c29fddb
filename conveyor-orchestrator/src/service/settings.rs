//! Integration setting resolution for a stage environment

use conveyor_core::domain::project::ProjectEnv;
use conveyor_core::domain::setting::{
    CiDriverConfig, ClusterConfig, IntegrateSetting, IntegrationConfig, RegistryConfig, SettingKind,
};

use super::{EngineError, PipelineManager};

/// Cluster setting resolved for a deploy
#[derive(Debug, Clone)]
pub struct ClusterTarget {
    pub name: String,
    pub config: ClusterConfig,
}

impl PipelineManager {
    async fn setting(&self, id: i64) -> Result<IntegrateSetting, EngineError> {
        self.settings
            .get_setting(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("integration setting {}", id)))
    }

    pub(crate) async fn project_env(
        &self,
        project_id: i64,
        stage_id: i64,
    ) -> Result<ProjectEnv, EngineError> {
        self.projects
            .get_project_env(project_id, stage_id)
            .await?
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "stage {} of project {} has no environment configured, contact an administrator",
                    stage_id, project_id
                ))
            })
    }

    /// CI backend of the stage; every connection field must be set
    pub(crate) async fn ci_config(&self, env: &ProjectEnv) -> Result<CiDriverConfig, EngineError> {
        let setting = self.setting(env.ci_server).await?;
        let config = match setting.config {
            IntegrationConfig::CiDriver(config) => config,
            other => {
                return Err(EngineError::SettingKind {
                    id: setting.id,
                    expected: SettingKind::CiDriver,
                    actual: other.kind(),
                });
            }
        };

        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(EngineError::Config(format!(
                "CI server setting {} is incomplete (missing {}), check the integration settings",
                setting.name,
                missing.join(", ")
            )));
        }

        tracing::debug!("CI server of env {}: {} as {}", env.id, config.url, config.user);
        Ok(config)
    }

    pub(crate) async fn registry_config(
        &self,
        env: &ProjectEnv,
    ) -> Result<RegistryConfig, EngineError> {
        let setting = self.setting(env.registry).await?;
        match setting.config {
            IntegrationConfig::Registry(config) => Ok(config),
            other => Err(EngineError::SettingKind {
                id: setting.id,
                expected: SettingKind::Registry,
                actual: other.kind(),
            }),
        }
    }

    pub(crate) async fn cluster_target(
        &self,
        env: &ProjectEnv,
    ) -> Result<ClusterTarget, EngineError> {
        let setting = self.setting(env.cluster).await?;
        match setting.config {
            IntegrationConfig::Cluster(config) => Ok(ClusterTarget {
                name: setting.name,
                config,
            }),
            other => Err(EngineError::SettingKind {
                id: setting.id,
                expected: SettingKind::Cluster,
                actual: other.kind(),
            }),
        }
    }

    /// API token of a platform user
    pub(crate) async fn user_token(&self, user: &str) -> Result<String, EngineError> {
        self.settings
            .user_token(user)
            .await?
            .ok_or_else(|| EngineError::Config(format!("user {} has no API token", user)))
    }
}
