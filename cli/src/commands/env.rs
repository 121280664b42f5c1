pub mod delete;
pub mod init;
pub mod ls;
pub mod show;

use crate::context::Context;
use clap::Subcommand;
use copilot_common::model::Workload;
use copilot_common::naming;
use futures::future::try_join_all;

#[derive(Subcommand)]
pub(crate) enum EnvCommands {
    /// Create a new environment: network, cluster and load balancer
    Init(init::InitCommand),

    /// List the environments of an application
    Ls(ls::LsCommand),

    /// Show an environment and the workloads deployed to it
    Show(show::ShowCommand),

    /// Delete an environment, it must not have any workload deployed
    Delete(delete::DeleteCommand),
}

/// Workloads of the application with a stack in the environment
pub(crate) async fn deployed_workloads(
    ctx: &Context,
    app: &str,
    env: &str,
) -> eyre::Result<Vec<Workload>> {
    let workloads = ctx.store.list_workloads(app).await?;

    let names = workloads
        .iter()
        .map(|w| naming::workload_stack(app, env, &w.name))
        .collect::<Vec<_>>();

    let stacks = try_join_all(names.iter().map(|name| ctx.stacks.describe(name))).await?;

    Ok(workloads
        .into_iter()
        .zip(stacks)
        .filter_map(|(workload, stack)| stack.map(|_| workload))
        .collect())
}
