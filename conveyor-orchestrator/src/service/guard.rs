//! Concurrency guard
//!
//! At most one Init/Running job per execution scope. The advisory check
//! fails fast before any external call; the conditional insert is what
//! actually closes the scope.

use conveyor_core::domain::job::{JobScope, NewPublishJob};
use conveyor_core::domain::publish::{PublishOrder, PublishStatus};

use super::{EngineError, PipelineManager};
use crate::repository::JobInsert;

impl PipelineManager {
    /// Whether the scope has active jobs, with their ids comma separated
    pub async fn has_active_job(&self, scope: JobScope) -> Result<(bool, String), EngineError> {
        let jobs = self.publishes.find_active_jobs(scope).await?;
        let ids = jobs
            .iter()
            .map(|job| job.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Ok((!jobs.is_empty(), ids))
    }

    pub(crate) async fn ensure_idle(&self, scope: JobScope) -> Result<(), EngineError> {
        let (busy, job_ids) = self.has_active_job(scope).await?;
        if busy {
            tracing::warn!(
                "{} scope of project {} stage {} already has active jobs: {}",
                scope.job_type,
                scope.project_id,
                scope.stage_id,
                job_ids
            );
            return Err(EngineError::Conflict { job_ids });
        }
        Ok(())
    }

    /// Persists a job in status Init unless its scope is occupied
    pub(crate) async fn insert_job(&self, job: NewPublishJob) -> Result<i64, EngineError> {
        let job_type = job.job_type;
        match self.publishes.insert_job_if_idle(job).await? {
            JobInsert::Created(id) => {
                tracing::info!("Publish job {} ({}) created", id, job_type);
                Ok(id)
            }
            JobInsert::Busy(ids) => {
                tracing::warn!("Lost the race for the {} scope to jobs {:?}", job_type, ids);
                Err(EngineError::conflict(&ids))
            }
        }
    }

    /// Moves an Init order to Running once it owns a job row, so a job
    /// stuck before submission can still be terminated or aborted
    pub(crate) async fn start_publish(&self, publish: &PublishOrder) -> Result<(), EngineError> {
        if publish.status == PublishStatus::Init {
            self.publishes
                .update_publish_status(publish.id, PublishStatus::Running)
                .await?;
            tracing::debug!("Publish {} is running", publish.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Fixture;
    use conveyor_core::domain::job::{JobScope, JobStatus, JobType};

    #[tokio::test]
    async fn test_has_active_job_lists_ids() {
        let fixture = Fixture::new();
        fixture.publishes.seed_job(7, 1, 2, 3, JobType::Deploy, JobStatus::Running);
        fixture.publishes.seed_job(8, 9, 2, 3, JobType::Deploy, JobStatus::Init);
        fixture.publishes.seed_job(9, 9, 2, 3, JobType::Deploy, JobStatus::Success);

        let manager = fixture.manager();
        let (busy, ids) = manager.has_active_job(JobScope::deploy(2, 3)).await.unwrap();
        assert!(busy);
        assert_eq!(ids, "7,8");

        let (busy, ids) = manager.has_active_job(JobScope::build(2, 3, 1)).await.unwrap();
        assert!(!busy);
        assert!(ids.is_empty());
    }
}
