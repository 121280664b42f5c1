pub mod delete;
pub mod deploy;
pub mod init;
pub mod ls;
pub mod package;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum JobCommands {
    /// Create a new scheduled job: manifest, image repository and registration
    Init(init::InitCommand),

    /// List the jobs of an application
    Ls(ls::LsCommand),

    /// Print or save the CloudFormation template of a job
    Package(package::PackageCommand),

    /// Build, push and deploy a job to an environment
    Deploy(deploy::DeployCommand),

    /// Delete a job from one or every environment
    Delete(delete::DeleteCommand),
}
