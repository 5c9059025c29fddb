//! Step command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use conveyor_core::dto::publish::StepRecord;

use crate::config::Config;

/// Step subcommands
#[derive(Subcommand)]
pub enum StepCommands {
    /// Show the manual history of the current and previous step
    Info { publish_id: i64 },
    /// Show the declared type of a step in the current stage
    Type { publish_id: i64, step_index: i32 },
    /// Check whether a stage is the last one and the order is on its last step
    Last { publish_id: i64, stage_id: i64 },
    /// List the branch choices of the order's apps
    Branches {
        project_id: i64,
        publish_id: i64,
        stage_id: i64,
    },
    /// List the images a deploy would roll out
    Images { publish_id: i64 },
}

/// Handle step commands
pub async fn handle_step_command(command: StepCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        StepCommands::Info { publish_id } => {
            let info = client.get_step_info(publish_id).await?;
            print_record("Current step", &info.current_step);
            match &info.previous_step {
                Some(record) => print_record("Previous step", record),
                None => println!("{}", "No previous manual record.".yellow()),
            }
        }
        StepCommands::Type {
            publish_id,
            step_index,
        } => {
            let info = client.get_step_type(publish_id, step_index).await?;
            println!("{} ({})", info.name.bold(), info.step_type.cyan());
        }
        StepCommands::Last {
            publish_id,
            stage_id,
        } => {
            let check = client.is_last_stage_last_step(publish_id, stage_id).await?;
            println!("  {}: {}", "Last stage".bold(), check.last_stage);
            println!("  {}: {}", "Last step".bold(), check.last_step);
        }
        StepCommands::Branches {
            project_id,
            publish_id,
            stage_id,
        } => {
            let preview = client
                .branch_preview(project_id, publish_id, stage_id)
                .await?;
            println!(
                "{}",
                format!("{} ({})", preview.version_name, preview.version_no).bold()
            );
            for app in preview.apps {
                println!(
                    "  {} [{}] {} <- {}",
                    app.app_name.bold(),
                    app.language,
                    app.branch_name.cyan(),
                    app.branch_history.join(", ")
                );
            }
        }
        StepCommands::Images { publish_id } => {
            let images = client.deploy_app_images(publish_id).await?;
            if images.is_empty() {
                println!("{}", "No apps in this publish order.".yellow());
            }
            for image in images {
                let addr = image
                    .image_addr
                    .map(|addr| addr.green())
                    .unwrap_or_else(|| "unresolved".red());
                println!("  {} {}", image.name.bold(), addr);
            }
        }
    }

    Ok(())
}

fn print_record(title: &str, record: &StepRecord) {
    println!("{}", title.bold());
    println!("  {}: {}", "Name".bold(), record.name);
    if !record.creator.is_empty() {
        println!("  {}: {}", "Confirmed by".bold(), record.creator);
        println!("  {}: {}", "Message".bold(), record.message);
    }
}
