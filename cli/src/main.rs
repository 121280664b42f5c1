mod aws;
mod commands;
mod config;
mod context;
mod docker;
mod error;
#[cfg(test)]
mod fakes;
mod git;
mod logger;
mod process;
mod progress;
mod prompt;
mod runner;
mod selector;
mod stacks;
mod store;
mod workspace;
mod writer;

use crate::commands::app::AppCommands;
use crate::commands::env::EnvCommands;
use crate::commands::job::JobCommands;
use crate::commands::pipeline::PipelineCommands;
use crate::commands::secret::SecretCommands;
use crate::commands::storage::StorageCommands;
use crate::commands::svc::SvcCommands;
use crate::commands::task::TaskCommands;
use crate::commands::Commands;
use crate::context::Context;
use crate::error::Error;
use crate::logger::Logger;
use crate::runner::{Runnable, Runner};
use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// AWS profile to use instead of the default one
    #[arg(long, global = true)]
    profile: Option<String>,

    /// AWS region to use instead of the one of the profile
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
async fn run(command: impl Runnable, ctx: &Context) -> Result<(), Error> {
    command.runner(ctx).run().await
}

#[tokio::main]
async fn main() {
    if let Err(e) = color_eyre::install() {
        log::warn!("Failed to install the error report handler: {e}");
    }

    Logger::init();

    let cli = Cli::parse();
    let config = aws::sdk_config(cli.profile.as_deref(), cli.region.as_deref()).await;

    let ctx = match Context::from_aws(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            Error::from(e).print();
            std::process::exit(1);
        }
    };

    // Match all commands here, in one place
    let result = match cli.command {
        Commands::App(app) => match app {
            AppCommands::Init(cmd) => run(cmd, &ctx).await,
            AppCommands::Ls(cmd) => run(cmd, &ctx).await,
            AppCommands::Show(cmd) => run(cmd, &ctx).await,
            AppCommands::Delete(cmd) => run(cmd, &ctx).await,
        },

        Commands::Env(env) => match env {
            EnvCommands::Init(cmd) => run(cmd, &ctx).await,
            EnvCommands::Ls(cmd) => run(cmd, &ctx).await,
            EnvCommands::Show(cmd) => run(cmd, &ctx).await,
            EnvCommands::Delete(cmd) => run(cmd, &ctx).await,
        },

        Commands::Svc(svc) => match svc {
            SvcCommands::Init(cmd) => run(cmd, &ctx).await,
            SvcCommands::Ls(cmd) => run(cmd, &ctx).await,
            SvcCommands::Show(cmd) => run(cmd, &ctx).await,
            SvcCommands::Status(cmd) => run(cmd, &ctx).await,
            SvcCommands::Package(cmd) => run(cmd, &ctx).await,
            SvcCommands::Deploy(cmd) => run(cmd, &ctx).await,
            SvcCommands::Delete(cmd) => run(cmd, &ctx).await,
        },

        Commands::Job(job) => match job {
            JobCommands::Init(cmd) => run(cmd, &ctx).await,
            JobCommands::Ls(cmd) => run(cmd, &ctx).await,
            JobCommands::Package(cmd) => run(cmd, &ctx).await,
            JobCommands::Deploy(cmd) => run(cmd, &ctx).await,
            JobCommands::Delete(cmd) => run(cmd, &ctx).await,
        },

        Commands::Task(task) => match task {
            TaskCommands::Run(cmd) => run(cmd, &ctx).await,
        },

        Commands::Storage(storage) => match storage {
            StorageCommands::Init(cmd) => run(cmd, &ctx).await,
        },

        Commands::Secret(secret) => match secret {
            SecretCommands::Init(cmd) => run(cmd, &ctx).await,
        },

        Commands::Pipeline(pipeline) => match pipeline {
            PipelineCommands::Init(cmd) => run(cmd, &ctx).await,
            PipelineCommands::Deploy(cmd) => run(cmd, &ctx).await,
            PipelineCommands::Ls(cmd) => run(cmd, &ctx).await,
            PipelineCommands::Show(cmd) => run(cmd, &ctx).await,
            PipelineCommands::Status(cmd) => run(cmd, &ctx).await,
            PipelineCommands::Delete(cmd) => run(cmd, &ctx).await,
        },
    };

    if let Err(e) = result {
        e.print();
        std::process::exit(1);
    }
}
