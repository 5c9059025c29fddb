use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'active'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS repos (
        id BIGSERIAL PRIMARY KEY,
        kind VARCHAR(20) NOT NULL,
        base_url TEXT NOT NULL,
        username VARCHAR(255) NOT NULL,
        token TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS compile_envs (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        image TEXT NOT NULL,
        command TEXT NOT NULL DEFAULT '',
        args TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_apps (
        id BIGSERIAL PRIMARY KEY,
        project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        full_name VARCHAR(512) NOT NULL,
        language VARCHAR(64) NOT NULL,
        repo_id BIGINT NOT NULL REFERENCES repos(id),
        build_path TEXT NOT NULL DEFAULT '/',
        compile_env_id BIGINT REFERENCES compile_envs(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_branches (
        id BIGSERIAL PRIMARY KEY,
        project_app_id BIGINT NOT NULL REFERENCES project_apps(id) ON DELETE CASCADE,
        branch_name VARCHAR(255) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS integrate_settings (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        config JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_envs (
        id BIGSERIAL PRIMARY KEY,
        project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        namespace VARCHAR(255) NOT NULL,
        ci_server BIGINT NOT NULL,
        cluster BIGINT NOT NULL,
        registry BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_arranges (
        id BIGSERIAL PRIMARY KEY,
        project_app_id BIGINT NOT NULL REFERENCES project_apps(id) ON DELETE CASCADE,
        env_id BIGINT NOT NULL REFERENCES project_envs(id) ON DELETE CASCADE,
        config TEXT NOT NULL,
        UNIQUE (project_app_id, env_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS image_mappings (
        id BIGSERIAL PRIMARY KEY,
        arrange_id BIGINT NOT NULL REFERENCES app_arranges(id) ON DELETE CASCADE,
        project_app_id BIGINT NOT NULL REFERENCES project_apps(id) ON DELETE CASCADE,
        image TEXT NOT NULL,
        tag_policy VARCHAR(32) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_tokens (
        username VARCHAR(255) PRIMARY KEY,
        token TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_instances (
        id BIGSERIAL PRIMARY KEY,
        stages JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS publishes (
        id BIGSERIAL PRIMARY KEY,
        project_id BIGINT NOT NULL REFERENCES projects(id),
        version_no VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        stage_id BIGINT NOT NULL,
        step_index INTEGER NOT NULL DEFAULT 1,
        step VARCHAR(255) NOT NULL DEFAULT '',
        step_type VARCHAR(32) NOT NULL DEFAULT '',
        status VARCHAR(32) NOT NULL,
        creator VARCHAR(255) NOT NULL,
        last_pipeline_instance_id BIGINT NOT NULL REFERENCES pipeline_instances(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS publish_apps (
        id BIGSERIAL PRIMARY KEY,
        publish_id BIGINT NOT NULL REFERENCES publishes(id),
        project_app_id BIGINT NOT NULL REFERENCES project_apps(id),
        branch_name VARCHAR(255) NOT NULL,
        compile_command TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS publish_jobs (
        id BIGSERIAL PRIMARY KEY,
        publish_id BIGINT NOT NULL REFERENCES publishes(id),
        project_id BIGINT NOT NULL,
        stage_id BIGINT NOT NULL,
        job_type VARCHAR(16) NOT NULL,
        run_id BIGINT,
        status VARCHAR(16) NOT NULL,
        creator VARCHAR(255) NOT NULL,
        apps JSONB NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS operation_logs (
        id BIGSERIAL PRIMARY KEY,
        publish_id BIGINT NOT NULL REFERENCES publishes(id),
        pipeline_instance_id BIGINT NOT NULL,
        stage_id BIGINT NOT NULL,
        step_index INTEGER NOT NULL,
        step VARCHAR(255) NOT NULL,
        creator VARCHAR(255) NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_publish_jobs_publish_id ON publish_jobs(publish_id, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_publish_apps_publish_id ON publish_apps(publish_id)",
    "CREATE INDEX IF NOT EXISTS idx_operation_logs_step ON operation_logs(pipeline_instance_id, stage_id, step_index)",
    // At most one active job per execution scope
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uniq_active_build_job
        ON publish_jobs(project_id, stage_id, publish_id)
        WHERE job_type = 'build' AND status IN ('init', 'running')
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uniq_active_deploy_job
        ON publish_jobs(project_id, stage_id)
        WHERE job_type = 'deploy' AND status IN ('init', 'running')
    "#,
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in TABLES.iter().chain(INDEXES) {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
