pub mod delete;
pub mod deploy;
pub mod init;
pub mod ls;
pub mod show;
pub mod status;

use crate::aws::codepipeline::Pipeline;
use crate::context::Context;
use crate::prompt::Choice;
use copilot_common::naming;
use eyre::{eyre, WrapErr};
use futures::future::try_join_all;
use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum PipelineCommands {
    /// Write the manifest and the buildspec of a new pipeline
    Init(init::InitCommand),

    /// Create or update the pipeline from its manifest
    Deploy(deploy::DeployCommand),

    /// List the deployed pipelines of an application
    Ls(ls::LsCommand),

    /// Show the stages of a pipeline
    Show(show::ShowCommand),

    /// Show the latest status of each stage
    Status(status::StatusCommand),

    /// Delete a pipeline
    Delete(delete::DeleteCommand),
}

/// Deployed pipelines of the application, looked up concurrently
pub(crate) async fn app_pipelines(ctx: &Context, app: &str) -> eyre::Result<Vec<Pipeline>> {
    let prefix = naming::pipeline_stack(app, "");
    let names = ctx.pipelines.list_pipelines().await?;

    let pipelines = try_join_all(
        names
            .iter()
            .filter(|name| name.starts_with(&prefix))
            .map(|name| ctx.pipelines.get_pipeline(name)),
    )
    .await
    .wrap_err("Failed to get the pipelines")?;

    Ok(pipelines
        .into_iter()
        .filter(|p| p.tags.get(naming::TAG_APP).is_some_and(|tag| tag == app))
        .collect())
}

/// Pipeline name from the flag, or picked among the deployed ones
pub(crate) async fn deployed_pipeline(
    ctx: &Context,
    app: &str,
    flag: Option<&str>,
) -> eyre::Result<String> {
    if let Some(name) = flag {
        return Ok(naming::pipeline_stack(app, name));
    }

    let choices = app_pipelines(ctx, app)
        .await?
        .iter()
        .map(|p| Choice::new(&p.name))
        .collect::<Vec<_>>();

    match choices.as_slice() {
        [] => Err(eyre!(
            "No pipeline found in application {app}, run `copilot pipeline deploy` to create one"
        )),
        [only] => Ok(only.value.clone()),
        _ => ctx.prompt.select_one("Which pipeline?", &choices),
    }
}
