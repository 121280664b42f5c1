pub mod init;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum StorageCommands {
    /// Add a DynamoDB table, an S3 bucket or an Aurora cluster to a workload
    Init(init::InitCommand),
}
