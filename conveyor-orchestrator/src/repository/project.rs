//! Project Repository
//!
//! Read access to projects, applications, repositories, stage environments,
//! compile environments, arrangements and image mappings.

use async_trait::async_trait;
use conveyor_core::domain::project::{
    AppArrange, CompileEnv, ImageMapping, Project, ProjectApp, ProjectEnv, ProjectStatus, Repo,
    RepoKind, TagPolicy,
};
use sqlx::PgPool;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error>;

    async fn get_project_app(&self, id: i64) -> Result<Option<ProjectApp>, sqlx::Error>;

    /// Apps with the given ids, in id order. Unknown ids are skipped.
    async fn get_project_apps_by_ids(&self, ids: &[i64]) -> Result<Vec<ProjectApp>, sqlx::Error>;

    /// Stage environment of a project. Stage ids and env ids are the same key.
    async fn get_project_env(
        &self,
        project_id: i64,
        stage_id: i64,
    ) -> Result<Option<ProjectEnv>, sqlx::Error>;

    async fn get_repo(&self, id: i64) -> Result<Option<Repo>, sqlx::Error>;

    async fn get_arrange(
        &self,
        project_app_id: i64,
        env_id: i64,
    ) -> Result<Option<AppArrange>, sqlx::Error>;

    async fn get_image_mapping(
        &self,
        arrange_id: i64,
        project_app_id: i64,
    ) -> Result<Option<ImageMapping>, sqlx::Error>;

    async fn get_compile_env(&self, id: i64) -> Result<Option<CompileEnv>, sqlx::Error>;

    async fn get_compile_env_by_name(&self, name: &str)
    -> Result<Option<CompileEnv>, sqlx::Error>;

    /// Branch names known for an app, oldest first
    async fn app_branches(&self, project_app_id: i64) -> Result<Vec<String>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, status FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_project_app(&self, id: i64) -> Result<Option<ProjectApp>, sqlx::Error> {
        let row = sqlx::query_as::<_, ProjectAppRow>(
            r#"
            SELECT id, project_id, name, full_name, language, repo_id, build_path, compile_env_id
            FROM project_apps
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_project_apps_by_ids(&self, ids: &[i64]) -> Result<Vec<ProjectApp>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ProjectAppRow>(
            r#"
            SELECT id, project_id, name, full_name, language, repo_id, build_path, compile_env_id
            FROM project_apps
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_project_env(
        &self,
        project_id: i64,
        stage_id: i64,
    ) -> Result<Option<ProjectEnv>, sqlx::Error> {
        let row = sqlx::query_as::<_, ProjectEnvRow>(
            r#"
            SELECT id, project_id, name, namespace, ci_server, cluster, registry
            FROM project_envs
            WHERE id = $1 AND project_id = $2
            "#,
        )
        .bind(stage_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_repo(&self, id: i64) -> Result<Option<Repo>, sqlx::Error> {
        let row = sqlx::query_as::<_, RepoRow>(
            "SELECT id, kind, base_url, username, token FROM repos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Repo::try_from).transpose()
    }

    async fn get_arrange(
        &self,
        project_app_id: i64,
        env_id: i64,
    ) -> Result<Option<AppArrange>, sqlx::Error> {
        let row = sqlx::query_as::<_, ArrangeRow>(
            r#"
            SELECT id, project_app_id, env_id, config
            FROM app_arranges
            WHERE project_app_id = $1 AND env_id = $2
            "#,
        )
        .bind(project_app_id)
        .bind(env_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AppArrange {
            id: r.id,
            project_app_id: r.project_app_id,
            env_id: r.env_id,
            config: r.config,
        }))
    }

    async fn get_image_mapping(
        &self,
        arrange_id: i64,
        project_app_id: i64,
    ) -> Result<Option<ImageMapping>, sqlx::Error> {
        let row = sqlx::query_as::<_, ImageMappingRow>(
            r#"
            SELECT id, arrange_id, project_app_id, image, tag_policy
            FROM image_mappings
            WHERE arrange_id = $1 AND project_app_id = $2
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(arrange_id)
        .bind(project_app_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ImageMapping::try_from).transpose()
    }

    async fn get_compile_env(&self, id: i64) -> Result<Option<CompileEnv>, sqlx::Error> {
        let row = sqlx::query_as::<_, CompileEnvRow>(
            "SELECT id, name, image, command, args FROM compile_envs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_compile_env_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CompileEnv>, sqlx::Error> {
        let row = sqlx::query_as::<_, CompileEnvRow>(
            "SELECT id, name, image, command, args FROM compile_envs WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn app_branches(&self, project_app_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT branch_name FROM app_branches WHERE project_app_id = $1 ORDER BY id ASC",
        )
        .bind(project_app_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    status: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let status = match row.status.as_str() {
            "ended" => ProjectStatus::Ended,
            _ => ProjectStatus::Active,
        };
        Project {
            id: row.id,
            name: row.name,
            status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectAppRow {
    id: i64,
    project_id: i64,
    name: String,
    full_name: String,
    language: String,
    repo_id: i64,
    build_path: String,
    compile_env_id: Option<i64>,
}

impl From<ProjectAppRow> for ProjectApp {
    fn from(row: ProjectAppRow) -> Self {
        ProjectApp {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            full_name: row.full_name,
            language: row.language,
            repo_id: row.repo_id,
            build_path: row.build_path,
            compile_env_id: row.compile_env_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectEnvRow {
    id: i64,
    project_id: i64,
    name: String,
    namespace: String,
    ci_server: i64,
    cluster: i64,
    registry: i64,
}

impl From<ProjectEnvRow> for ProjectEnv {
    fn from(row: ProjectEnvRow) -> Self {
        ProjectEnv {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            namespace: row.namespace,
            ci_server: row.ci_server,
            cluster: row.cluster,
            registry: row.registry,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RepoRow {
    id: i64,
    kind: String,
    base_url: String,
    username: String,
    token: String,
}

impl TryFrom<RepoRow> for Repo {
    type Error = sqlx::Error;

    fn try_from(row: RepoRow) -> Result<Self, Self::Error> {
        let kind: RepoKind = row.kind.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?;
        Ok(Repo {
            id: row.id,
            kind,
            base_url: row.base_url,
            user: row.username,
            token: row.token,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArrangeRow {
    id: i64,
    project_app_id: i64,
    env_id: i64,
    config: String,
}

#[derive(sqlx::FromRow)]
struct ImageMappingRow {
    id: i64,
    arrange_id: i64,
    project_app_id: i64,
    image: String,
    tag_policy: String,
}

impl TryFrom<ImageMappingRow> for ImageMapping {
    type Error = sqlx::Error;

    fn try_from(row: ImageMappingRow) -> Result<Self, Self::Error> {
        let tag_policy: TagPolicy = row
            .tag_policy
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
        Ok(ImageMapping {
            id: row.id,
            arrange_id: row.arrange_id,
            project_app_id: row.project_app_id,
            image: row.image,
            tag_policy,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CompileEnvRow {
    id: i64,
    name: String,
    image: String,
    command: String,
    args: String,
}

impl From<CompileEnvRow> for CompileEnv {
    fn from(row: CompileEnvRow) -> Self {
        CompileEnv {
            id: row.id,
            name: row.name,
            image: row.image,
            command: row.command,
            args: row.args,
        }
    }
}
