pub mod delete;
pub mod init;
pub mod ls;
pub mod show;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum AppCommands {
    /// Create a new application, the workspace and the shared infrastructure
    Init(init::InitCommand),

    /// List all applications in the account and region
    Ls(ls::LsCommand),

    /// Show environments, workloads and pipelines of an application
    Show(show::ShowCommand),

    /// Delete every resource of an application
    Delete(delete::DeleteCommand),
}
