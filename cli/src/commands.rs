pub mod app;
pub mod env;
pub mod job;
pub mod pipeline;
pub mod secret;
pub mod storage;
pub mod svc;
pub mod task;
pub mod workload;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Applications are groups of environments and workloads
    #[clap(subcommand)]
    App(app::AppCommands),

    /// Environments are networks and clusters the workloads run in
    #[clap(subcommand)]
    Env(env::EnvCommands),

    /// Long running services
    #[clap(subcommand)]
    Svc(svc::SvcCommands),

    /// Scheduled jobs
    #[clap(subcommand)]
    Job(job::JobCommands),

    /// One-off tasks
    #[clap(subcommand)]
    Task(task::TaskCommands),

    /// Tables, buckets and databases attached to a workload
    #[clap(subcommand)]
    Storage(storage::StorageCommands),

    /// Secrets injected into workloads
    #[clap(subcommand)]
    Secret(secret::SecretCommands),

    /// Continuous delivery pipelines
    #[clap(subcommand)]
    Pipeline(pipeline::PipelineCommands),
}
