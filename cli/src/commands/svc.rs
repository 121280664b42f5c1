pub mod delete;
pub mod deploy;
pub mod init;
pub mod ls;
pub mod package;
pub mod show;
pub mod status;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum SvcCommands {
    /// Create a new service: manifest, image repository and registration
    Init(init::InitCommand),

    /// List the services of an application
    Ls(ls::LsCommand),

    /// Show the configuration of a service in each environment
    Show(show::ShowCommand),

    /// Show the health of a deployed service
    Status(status::StatusCommand),

    /// Print or save the CloudFormation template of a service
    Package(package::PackageCommand),

    /// Build, push and deploy a service to an environment
    Deploy(deploy::DeployCommand),

    /// Delete a service from one or every environment
    Delete(delete::DeleteCommand),
}
