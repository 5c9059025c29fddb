//! Step inspection and preview endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use conveyor_core::dto::publish::{
    BranchPreview, DeployAppImage, LastStepCheck, ManualStepInfo, StepTypeInfo,
};

impl OrchestratorClient {
    /// Manual records of the current and previous step
    pub async fn get_step_info(&self, publish_id: i64) -> Result<ManualStepInfo> {
        let url = self.publish_url(publish_id, "steps/current");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Declared type and name of a step in the current stage
    pub async fn get_step_type(&self, publish_id: i64, step_index: i32) -> Result<StepTypeInfo> {
        let url = self.publish_url(publish_id, &format!("steps/{}", step_index));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn is_last_stage_last_step(
        &self,
        publish_id: i64,
        stage_id: i64,
    ) -> Result<LastStepCheck> {
        let url = self.publish_url(publish_id, &format!("stages/{}/last", stage_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Branch choices of the publish order's apps
    pub async fn branch_preview(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
    ) -> Result<BranchPreview> {
        let url = self.pipeline_url(
            project_id,
            publish_id,
            &format!("stages/{}/branches", stage_id),
        );
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Images a deploy would roll out
    pub async fn deploy_app_images(&self, publish_id: i64) -> Result<Vec<DeployAppImage>> {
        let url = self.publish_url(publish_id, "deploy/apps");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
