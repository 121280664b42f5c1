pub mod run;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum TaskCommands {
    /// Run a one-off task on Fargate, in an environment or the default VPC
    Run(run::RunCommand),
}
