//! Publish command handlers
//!
//! Submits build and deploy jobs and drives a publish order through
//! termination, forced abort and manual confirmation.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use conveyor_client::OrchestratorClient;
use conveyor_core::domain::job::JobType;
use conveyor_core::dto::job::{
    BuildAppRequest, CallbackResult, CreateBuildJob, CreateDeployJob, DeployAppRequest, EnvItem,
    JobLaunched,
};
use conveyor_core::dto::publish::ConfirmManualStep;

use crate::config::Config;

/// Publish subcommands
#[derive(Subcommand)]
pub enum PublishCommands {
    /// Submit the build step of a publish order
    Build {
        project_id: i64,
        publish_id: i64,
        stage_id: i64,

        /// User submitting the job
        #[arg(long)]
        creator: String,

        /// App to build as ID:BRANCH[:COMPILE COMMAND], repeatable
        #[arg(long = "app", required = true, value_parser = parse_build_app)]
        apps: Vec<BuildAppRequest>,

        /// Extra job variable as KEY=VALUE, repeatable
        #[arg(long = "env", value_parser = parse_env_item)]
        env_vars: Vec<EnvItem>,
    },
    /// Submit the deploy step of a publish order
    Deploy {
        project_id: i64,
        publish_id: i64,
        stage_id: i64,

        /// User submitting the job
        #[arg(long)]
        creator: String,

        /// App id to deploy, repeatable
        #[arg(long = "app", required = true)]
        apps: Vec<i64>,
    },
    /// Terminate the running job of a publish order
    Terminate {
        project_id: i64,
        publish_id: i64,
        stage_id: i64,

        /// Type of the running job (build or deploy)
        #[arg(long, default_value = "build")]
        job_type: String,
    },
    /// Force a publish order into Abort
    Abort { project_id: i64, publish_id: i64 },
    /// Confirm the manual step a publish order waits on
    Confirm {
        project_id: i64,
        publish_id: i64,

        #[arg(long)]
        creator: String,

        #[arg(short, long, default_value = "")]
        message: String,
    },
}

/// Handle publish commands
pub async fn handle_publish_command(command: PublishCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PublishCommands::Build {
            project_id,
            publish_id,
            stage_id,
            creator,
            apps,
            env_vars,
        } => {
            let req = CreateBuildJob {
                creator,
                apps,
                env_vars,
            };
            let launched = client
                .create_build_job(project_id, publish_id, stage_id, req)
                .await
                .context("Build submission failed")?;
            print_launched("Build", &launched);
            Ok(())
        }
        PublishCommands::Deploy {
            project_id,
            publish_id,
            stage_id,
            creator,
            apps,
        } => {
            let req = CreateDeployJob {
                creator,
                apps: apps
                    .into_iter()
                    .map(|project_app_id| DeployAppRequest { project_app_id })
                    .collect(),
            };
            let launched = client
                .create_deploy_job(project_id, publish_id, stage_id, req)
                .await
                .context("Deploy submission failed")?;
            print_launched("Deploy", &launched);
            Ok(())
        }
        PublishCommands::Terminate {
            project_id,
            publish_id,
            stage_id,
            job_type,
        } => terminate(&client, project_id, publish_id, stage_id, &job_type).await,
        PublishCommands::Abort {
            project_id,
            publish_id,
        } => {
            client.abort_publish(project_id, publish_id).await?;
            println!("{} Publish {} aborted", "✓".green(), publish_id);
            Ok(())
        }
        PublishCommands::Confirm {
            project_id,
            publish_id,
            creator,
            message,
        } => {
            let result = client
                .confirm_manual_step(project_id, publish_id, ConfirmManualStep { creator, message })
                .await?;
            println!("{} Manual step confirmed", "✓".green());
            print_callback_result(&result);
            Ok(())
        }
    }
}

async fn terminate(
    client: &OrchestratorClient,
    project_id: i64,
    publish_id: i64,
    stage_id: i64,
    job_type: &str,
) -> Result<()> {
    let job_type: JobType = job_type.parse().map_err(anyhow::Error::msg)?;

    client
        .terminate_publish(project_id, publish_id, stage_id, job_type)
        .await?;
    println!(
        "{} {} job of publish {} terminated",
        "✓".green(),
        job_type,
        publish_id
    );
    Ok(())
}

fn print_launched(kind: &str, launched: &JobLaunched) {
    println!("{} {} job submitted", "✓".green(), kind);
    println!("  {}: {}", "Job".bold(), launched.job_name);
    println!("  {}: {}", "Run".bold(), launched.run_id);
}

fn print_callback_result(result: &CallbackResult) {
    println!("  {}: {}", "Publish".bold(), result.publish_status);
    println!("  {}: {}", "Step".bold(), result.step_index);
    if let Some(job) = &result.next_job {
        println!(
            "  {}: {} run {}",
            "Next job".bold(),
            job.job_name.cyan(),
            job.run_id
        );
    }
}

/// Parses `ID:BRANCH[:COMPILE COMMAND]`
fn parse_build_app(value: &str) -> Result<BuildAppRequest> {
    let mut parts = value.splitn(3, ':');
    let id = parts.next().unwrap_or_default();
    let Some(branch) = parts.next().filter(|branch| !branch.is_empty()) else {
        bail!("expected ID:BRANCH[:COMMAND], got {}", value);
    };

    Ok(BuildAppRequest {
        project_app_id: id
            .parse()
            .with_context(|| format!("invalid app id: {}", id))?,
        branch: branch.to_string(),
        path: String::new(),
        compile_command: parts.next().map(str::to_string),
    })
}

fn parse_env_item(value: &str) -> Result<EnvItem> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(EnvItem::new(key, value)),
        _ => bail!("expected KEY=VALUE, got {}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_app() {
        let app = parse_build_app("11:dev").unwrap();
        assert_eq!(app.project_app_id, 11);
        assert_eq!(app.branch, "dev");
        assert!(app.compile_command.is_none());

        let app = parse_build_app("12:release:make build:all").unwrap();
        assert_eq!(app.branch, "release");
        assert_eq!(app.compile_command.as_deref(), Some("make build:all"));

        assert!(parse_build_app("11").is_err());
        assert!(parse_build_app("api:dev").is_err());
    }

    #[test]
    fn test_parse_env_item() {
        assert_eq!(
            parse_env_item("GOFLAGS=-mod=vendor").unwrap(),
            EnvItem::new("GOFLAGS", "-mod=vendor")
        );
        assert!(parse_env_item("=x").is_err());
        assert!(parse_env_item("NOVALUE").is_err());
    }
}
