//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod publish;
mod step;

pub use publish::PublishCommands;
pub use step::StepCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit and control publish jobs
    Publish {
        #[command(subcommand)]
        command: PublishCommands,
    },
    /// Inspect the steps of a publish order
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
}

/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Publish { command } => publish::handle_publish_command(command, config).await,
        Commands::Step { command } => step::handle_step_command(command, config).await,
    }
}
