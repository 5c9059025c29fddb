//! Publish job lifecycle endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use conveyor_core::domain::job::JobType;
use conveyor_core::dto::job::{
    CallbackResult, CreateBuildJob, CreateDeployJob, JobLaunched, TerminatePublish,
};
use conveyor_core::dto::publish::ConfirmManualStep;

impl OrchestratorClient {
    // =============================================================================
    // Job Submission
    // =============================================================================

    /// Submit the build step of a publish order
    ///
    /// Fails with a 409 [`crate::ClientError`] while another build of the
    /// same publish order and stage is active.
    pub async fn create_build_job(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        req: CreateBuildJob,
    ) -> Result<JobLaunched> {
        let url = self.pipeline_url(project_id, publish_id, &format!("stages/{}/build", stage_id));
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Submit the deploy step of a publish order
    pub async fn create_deploy_job(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        req: CreateDeployJob,
    ) -> Result<JobLaunched> {
        let url = self.pipeline_url(project_id, publish_id, &format!("stages/{}/deploy", stage_id));
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Terminate the running job of a publish order
    pub async fn terminate_publish(
        &self,
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
        job_type: JobType,
    ) -> Result<()> {
        let url = self.pipeline_url(
            project_id,
            publish_id,
            &format!("stages/{}/terminate", stage_id),
        );
        let response = self
            .client
            .post(&url)
            .json(&TerminatePublish { job_type })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Force a publish order into Abort without contacting the CI server
    pub async fn abort_publish(&self, project_id: i64, publish_id: i64) -> Result<()> {
        let url = self.pipeline_url(project_id, publish_id, "abort");
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Confirm the manual step a publish order waits on
    pub async fn confirm_manual_step(
        &self,
        project_id: i64,
        publish_id: i64,
        req: ConfirmManualStep,
    ) -> Result<CallbackResult> {
        let url = self.pipeline_url(project_id, publish_id, "manual");
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }
}
