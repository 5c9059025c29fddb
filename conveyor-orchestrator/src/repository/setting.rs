//! Setting Repository
//!
//! Integration settings and per-user API tokens.

use async_trait::async_trait;
use conveyor_core::domain::setting::{IntegrateSetting, IntegrationConfig};
use sqlx::PgPool;

#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn get_setting(&self, id: i64) -> Result<Option<IntegrateSetting>, sqlx::Error>;

    async fn user_token(&self, user: &str) -> Result<Option<String>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgSettingRepository {
    pool: PgPool,
}

impl PgSettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingRepository for PgSettingRepository {
    async fn get_setting(&self, id: i64) -> Result<Option<IntegrateSetting>, sqlx::Error> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT id, name, config FROM integrate_settings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IntegrateSetting::try_from).transpose()
    }

    async fn user_token(&self, user: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT token FROM user_tokens WHERE username = $1")
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(token,)| token))
    }
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    id: i64,
    name: String,
    config: serde_json::Value,
}

impl TryFrom<SettingRow> for IntegrateSetting {
    type Error = sqlx::Error;

    fn try_from(row: SettingRow) -> Result<Self, Self::Error> {
        let config: IntegrationConfig =
            serde_json::from_value(row.config).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(IntegrateSetting {
            id: row.id,
            name: row.name,
            config,
        })
    }
}
