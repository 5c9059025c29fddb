//! Integration setting domain types
//!
//! Named credentials for the external systems the engine talks to. The
//! configuration payload is a tagged union over the supported kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrateSetting {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub config: IntegrationConfig,
}

impl IntegrateSetting {
    pub fn kind(&self) -> SettingKind {
        self.config.kind()
    }
}

/// Configuration payload, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IntegrationConfig {
    CiDriver(CiDriverConfig),
    Cluster(ClusterConfig),
    Registry(RegistryConfig),
}

impl IntegrationConfig {
    pub fn kind(&self) -> SettingKind {
        match self {
            IntegrationConfig::CiDriver(_) => SettingKind::CiDriver,
            IntegrationConfig::Cluster(_) => SettingKind::Cluster,
            IntegrationConfig::Registry(_) => SettingKind::Registry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingKind {
    CiDriver,
    Cluster,
    Registry,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::CiDriver => write!(f, "ci-driver"),
            SettingKind::Cluster => write!(f, "cluster"),
            SettingKind::Registry => write!(f, "registry"),
        }
    }
}

/// CI execution backend endpoint and agent workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiDriverConfig {
    pub url: String,
    pub user: String,
    pub token: String,
    pub workspace: String,
}

impl CiDriverConfig {
    /// Names of the required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("url", &self.url),
            ("user", &self.user),
            ("token", &self.token),
            ("workspace", &self.workspace),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Orchestration cluster apply endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub url: String,
    #[serde(default)]
    pub token: String,
}

/// Container registry address and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    pub user: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_config_deserialization() {
        let json = r#"{
            "id": 3,
            "name": "ci-main",
            "type": "ci-driver",
            "url": "http://ci",
            "user": "u",
            "token": "t",
            "workspace": "/ws"
        }"#;
        let setting: IntegrateSetting = serde_json::from_str(json).unwrap();
        assert_eq!(setting.kind(), SettingKind::CiDriver);
        match setting.config {
            IntegrationConfig::CiDriver(config) => assert_eq!(config.workspace, "/ws"),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_missing_ci_fields() {
        let config = CiDriverConfig {
            url: "http://ci".to_string(),
            user: String::new(),
            token: "t".to_string(),
            workspace: " ".to_string(),
        };
        assert_eq!(config.missing_fields(), vec!["user", "workspace"]);
    }
}
