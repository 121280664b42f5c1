pub mod init;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum SecretCommands {
    /// Store secrets in SSM Parameter Store, one value per environment
    Init(init::InitCommand),
}
