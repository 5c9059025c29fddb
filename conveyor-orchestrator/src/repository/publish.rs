//! Publish Repository
//!
//! Handles all database operations related to publish orders, their apps,
//! pipeline snapshots, publish jobs and operation logs.

use async_trait::async_trait;
use conveyor_core::domain::job::{JobAppParams, JobScope, JobStatus, NewPublishJob, PublishJob};
use conveyor_core::domain::pipeline::{PipelineInstance, StageDefinition};
use conveyor_core::domain::publish::{OperationLog, PublishApp, PublishOrder, PublishStatus};
use sqlx::PgPool;

/// Outcome of a conditional job insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInsert {
    /// The job was persisted with status Init
    Created(i64),
    /// Active jobs already occupy the scope; nothing was written
    Busy(Vec<i64>),
}

/// Operation log about to be recorded
#[derive(Debug, Clone)]
pub struct NewOperationLog {
    pub publish_id: i64,
    pub pipeline_instance_id: i64,
    pub stage_id: i64,
    pub step_index: i32,
    pub step: String,
    pub creator: String,
    pub message: String,
}

/// Repository trait for publish orders and publish jobs
#[async_trait]
pub trait PublishRepository: Send + Sync {
    async fn get_publish(&self, id: i64) -> Result<Option<PublishOrder>, sqlx::Error>;

    async fn update_publish_status(
        &self,
        id: i64,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error>;

    /// Moves the order to `step_index` and records the step it now waits on
    async fn advance_publish_step(
        &self,
        id: i64,
        step_index: i32,
        step: &str,
        step_type: &str,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error>;

    async fn get_publish_apps(&self, publish_id: i64) -> Result<Vec<PublishApp>, sqlx::Error>;

    async fn get_publish_app(
        &self,
        publish_id: i64,
        project_app_id: i64,
    ) -> Result<Option<PublishApp>, sqlx::Error>;

    async fn get_pipeline_instance(
        &self,
        id: i64,
    ) -> Result<Option<PipelineInstance>, sqlx::Error>;

    /// Inserts the job unless an Init/Running job already occupies its scope.
    ///
    /// The existence check and the insert are one statement.
    async fn insert_job_if_idle(&self, job: NewPublishJob) -> Result<JobInsert, sqlx::Error>;

    async fn find_active_jobs(&self, scope: JobScope) -> Result<Vec<PublishJob>, sqlx::Error>;

    async fn get_job(&self, id: i64) -> Result<Option<PublishJob>, sqlx::Error>;

    async fn latest_job_for_publish(
        &self,
        publish_id: i64,
    ) -> Result<Option<PublishJob>, sqlx::Error>;

    /// Records the external run id and moves the job to Running
    async fn mark_job_running(&self, id: i64, run_id: i64) -> Result<(), sqlx::Error>;

    async fn update_job_status(&self, id: i64, status: JobStatus) -> Result<(), sqlx::Error>;

    /// Operation logs of one step, newest first
    async fn operation_logs(
        &self,
        pipeline_instance_id: i64,
        stage_id: i64,
        step_index: i32,
    ) -> Result<Vec<OperationLog>, sqlx::Error>;

    async fn add_operation_log(&self, log: NewOperationLog) -> Result<i64, sqlx::Error>;
}

/// Postgres implementation of PublishRepository
#[derive(Clone)]
pub struct PgPublishRepository {
    pool: PgPool,
}

impl PgPublishRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn active_job_ids(&self, scope: JobScope) -> Result<Vec<i64>, sqlx::Error> {
        Ok(self
            .find_active_jobs(scope)
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect())
    }
}

#[async_trait]
impl PublishRepository for PgPublishRepository {
    async fn get_publish(&self, id: i64) -> Result<Option<PublishOrder>, sqlx::Error> {
        let row = sqlx::query_as::<_, PublishRow>(
            r#"
            SELECT id, project_id, version_no, name, stage_id, step_index, step, step_type,
                   status, creator, last_pipeline_instance_id, created_at, updated_at
            FROM publishes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_publish_status(
        &self,
        id: i64,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE publishes SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn advance_publish_step(
        &self,
        id: i64,
        step_index: i32,
        step: &str,
        step_type: &str,
        status: PublishStatus,
    ) -> Result<(), sqlx::Error> {
        // step_index never moves backwards
        sqlx::query(
            r#"
            UPDATE publishes
            SET step_index = $1, step = $2, step_type = $3, status = $4, updated_at = $5
            WHERE id = $6 AND step_index <= $1
            "#,
        )
        .bind(step_index)
        .bind(step)
        .bind(step_type)
        .bind(status.as_str())
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_publish_apps(&self, publish_id: i64) -> Result<Vec<PublishApp>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PublishAppRow>(
            r#"
            SELECT id, publish_id, project_app_id, branch_name, compile_command
            FROM publish_apps
            WHERE publish_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(publish_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_publish_app(
        &self,
        publish_id: i64,
        project_app_id: i64,
    ) -> Result<Option<PublishApp>, sqlx::Error> {
        let row = sqlx::query_as::<_, PublishAppRow>(
            r#"
            SELECT id, publish_id, project_app_id, branch_name, compile_command
            FROM publish_apps
            WHERE publish_id = $1 AND project_app_id = $2
            "#,
        )
        .bind(publish_id)
        .bind(project_app_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_pipeline_instance(
        &self,
        id: i64,
    ) -> Result<Option<PipelineInstance>, sqlx::Error> {
        let row: Option<(i64, serde_json::Value)> =
            sqlx::query_as("SELECT id, stages FROM pipeline_instances WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, stages)| {
            let stages: Vec<StageDefinition> =
                serde_json::from_value(stages).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            Ok(PipelineInstance { id, stages })
        })
        .transpose()
    }

    async fn insert_job_if_idle(&self, job: NewPublishJob) -> Result<JobInsert, sqlx::Error> {
        let scope = job.scope();
        let now = chrono::Utc::now();
        let apps = serde_json::to_value(&job.apps).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let inserted: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO publish_jobs
                (publish_id, project_id, stage_id, job_type, status, creator, apps, created_at, updated_at)
            SELECT $1, $2, $3, $4, 'init', $5, $6, $7, $7
            WHERE NOT EXISTS (
                SELECT 1 FROM publish_jobs
                WHERE project_id = $2 AND stage_id = $3 AND job_type = $4
                  AND ($8::BIGINT IS NULL OR publish_id = $8)
                  AND status IN ('init', 'running')
            )
            RETURNING id
            "#,
        )
        .bind(job.publish_id)
        .bind(job.project_id)
        .bind(job.stage_id)
        .bind(job.job_type.as_str())
        .bind(&job.creator)
        .bind(apps)
        .bind(now)
        .bind(scope.publish_id)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some((id,))) => Ok(JobInsert::Created(id)),
            Ok(None) => Ok(JobInsert::Busy(self.active_job_ids(scope).await?)),
            // A concurrent insert won the partial unique index
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Ok(JobInsert::Busy(self.active_job_ids(scope).await?))
            }
            Err(err) => Err(err),
        }
    }

    async fn find_active_jobs(&self, scope: JobScope) -> Result<Vec<PublishJob>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PublishJobRow>(
            r#"
            SELECT id, publish_id, project_id, stage_id, job_type, run_id, status, creator,
                   apps, created_at, updated_at
            FROM publish_jobs
            WHERE project_id = $1 AND stage_id = $2 AND job_type = $3
              AND ($4::BIGINT IS NULL OR publish_id = $4)
              AND status IN ('init', 'running')
            ORDER BY id ASC
            "#,
        )
        .bind(scope.project_id)
        .bind(scope.stage_id)
        .bind(scope.job_type.as_str())
        .bind(scope.publish_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_job(&self, id: i64) -> Result<Option<PublishJob>, sqlx::Error> {
        let row = sqlx::query_as::<_, PublishJobRow>(
            r#"
            SELECT id, publish_id, project_id, stage_id, job_type, run_id, status, creator,
                   apps, created_at, updated_at
            FROM publish_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn latest_job_for_publish(
        &self,
        publish_id: i64,
    ) -> Result<Option<PublishJob>, sqlx::Error> {
        let row = sqlx::query_as::<_, PublishJobRow>(
            r#"
            SELECT id, publish_id, project_id, stage_id, job_type, run_id, status, creator,
                   apps, created_at, updated_at
            FROM publish_jobs
            WHERE publish_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(publish_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn mark_job_running(&self, id: i64, run_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE publish_jobs
            SET run_id = $1, status = 'running', updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(run_id)
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_job_status(&self, id: i64, status: JobStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE publish_jobs SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn operation_logs(
        &self,
        pipeline_instance_id: i64,
        stage_id: i64,
        step_index: i32,
    ) -> Result<Vec<OperationLog>, sqlx::Error> {
        let rows = sqlx::query_as::<_, OperationLogRow>(
            r#"
            SELECT id, publish_id, pipeline_instance_id, stage_id, step_index, step, creator,
                   message, created_at
            FROM operation_logs
            WHERE pipeline_instance_id = $1 AND stage_id = $2 AND step_index = $3
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(pipeline_instance_id)
        .bind(stage_id)
        .bind(step_index)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn add_operation_log(&self, log: NewOperationLog) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO operation_logs
                (publish_id, pipeline_instance_id, stage_id, step_index, step, creator, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(log.publish_id)
        .bind(log.pipeline_instance_id)
        .bind(log.stage_id)
        .bind(log.step_index)
        .bind(&log.step)
        .bind(&log.creator)
        .bind(&log.message)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PublishRow {
    id: i64,
    project_id: i64,
    version_no: String,
    name: String,
    stage_id: i64,
    step_index: i32,
    step: String,
    step_type: String,
    status: String,
    creator: String,
    last_pipeline_instance_id: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PublishRow> for PublishOrder {
    fn from(row: PublishRow) -> Self {
        PublishOrder {
            id: row.id,
            project_id: row.project_id,
            version_no: row.version_no,
            name: row.name,
            stage_id: row.stage_id,
            step_index: row.step_index,
            step: row.step,
            step_type: row.step_type,
            status: row.status.parse().unwrap_or(PublishStatus::Init),
            creator: row.creator,
            last_pipeline_instance_id: row.last_pipeline_instance_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PublishAppRow {
    id: i64,
    publish_id: i64,
    project_app_id: i64,
    branch_name: String,
    compile_command: Option<String>,
}

impl From<PublishAppRow> for PublishApp {
    fn from(row: PublishAppRow) -> Self {
        PublishApp {
            id: row.id,
            publish_id: row.publish_id,
            project_app_id: row.project_app_id,
            branch_name: row.branch_name,
            compile_command: row.compile_command.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PublishJobRow {
    id: i64,
    publish_id: i64,
    project_id: i64,
    stage_id: i64,
    job_type: String,
    run_id: Option<i64>,
    status: String,
    creator: String,
    apps: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PublishJobRow> for PublishJob {
    fn from(row: PublishJobRow) -> Self {
        let apps: Vec<JobAppParams> = serde_json::from_value(row.apps).unwrap_or_default();

        PublishJob {
            id: row.id,
            publish_id: row.publish_id,
            project_id: row.project_id,
            stage_id: row.stage_id,
            job_type: row
                .job_type
                .parse()
                .unwrap_or(conveyor_core::domain::job::JobType::Build),
            run_id: row.run_id,
            status: row.status.parse().unwrap_or(JobStatus::Init),
            creator: row.creator,
            apps,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OperationLogRow {
    id: i64,
    publish_id: i64,
    pipeline_instance_id: i64,
    stage_id: i64,
    step_index: i32,
    step: String,
    creator: String,
    message: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<OperationLogRow> for OperationLog {
    fn from(row: OperationLogRow) -> Self {
        OperationLog {
            id: row.id,
            publish_id: row.publish_id,
            pipeline_instance_id: row.pipeline_instance_id,
            stage_id: row.stage_id,
            step_index: row.step_index,
            step: row.step,
            creator: row.creator,
            message: row.message,
            created_at: row.created_at,
        }
    }
}
