use crate::commands::pipeline::app_pipelines;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::stacks;
use copilot_common::naming;

#[derive(clap::Args, Clone)]
pub(crate) struct DeleteCommand {
    /// Name of the application
    #[arg(short, long)]
    name: Option<String>,

    /// Skip the confirmation
    #[arg(long)]
    yes: bool,
}

impl Runnable for DeleteCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        DeleteRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            name: None,
            confirmed: false,
        }
    }
}

struct DeleteRunner {
    command: DeleteCommand,
    ctx: Context,
    name: Option<String>,
    confirmed: bool,
}

impl DeleteRunner {
    fn done(&self, what: &str) {
        println!("{} {what}", console::style("Deleted").green().bold());
    }
}

impl Runner for DeleteRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let name = self.ctx.app_name(self.command.name.as_deref()).await?;

        self.confirmed = self.command.yes
            || self.ctx.prompt.confirm(
                &format!("Are you sure you want to delete application {name} and all of its resources?"),
                false,
            )?;

        self.name = Some(name);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(app) = self.name.clone() else {
            return Err(self.error(Some("Application name is required"), None, None));
        };

        if !self.confirmed {
            println!("{}", console::style("Deletion canceled").dim().bold());
            return Ok(());
        }

        // Fails early if the application is not there
        self.ctx.store.get_application(&app).await?;

        let envs = self.ctx.store.list_environments(&app).await?;
        let workloads = self.ctx.store.list_workloads(&app).await?;

        for workload in &workloads {
            for env in &envs {
                self.ctx
                    .stacks
                    .delete(&naming::workload_stack(&app, &env.name, &workload.name))
                    .await
                    .map_err(|e| self.aws_error("Failed to delete a workload stack", e))?;
            }

            self.ctx
                .registry
                .delete_repository(&naming::repository(&app, &workload.name))
                .await
                .map_err(|e| self.aws_error("Failed to delete an image repository", e))?;

            self.ctx.store.delete_workload(&app, &workload.name).await?;
            self.done(&workload.name);
        }

        let pipelines = app_pipelines(&self.ctx, &app)
            .await
            .map_err(|e| self.aws_error("Failed to list the pipelines", e))?;

        for pipeline in pipelines {
            self.ctx
                .stacks
                .delete(&pipeline.name)
                .await
                .map_err(|e| self.aws_error("Failed to delete a pipeline stack", e))?;

            self.done(&pipeline.name);
        }

        for env in &envs {
            self.ctx
                .stacks
                .delete(&naming::env_stack(&app, &env.name))
                .await
                .map_err(|e| self.aws_error("Failed to delete an environment stack", e))?;

            self.ctx.store.delete_environment(&app, &env.name).await?;
            self.done(&format!("environment {}", env.name));
        }

        // A bucket with objects can't be deleted with its stack
        if let Ok(bucket) = stacks::artifact_bucket(&self.ctx, &app).await {
            self.ctx
                .uploader
                .empty_bucket(&bucket)
                .await
                .map_err(|e| self.aws_error("Failed to empty the artifact bucket", e))?;
        }

        self.ctx
            .stacks
            .delete(&naming::app_stack(&app))
            .await
            .map_err(|e| self.aws_error("Failed to delete the application stack", e))?;

        self.ctx.store.delete_application(&app).await?;

        if let Ok(workspace) = self.ctx.workspace() {
            if workspace.summary().is_ok_and(|s| s.application == app) {
                workspace.delete_summary()?;
            }
        }

        self.done(&format!("application {app}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pipeline::tests::{pipeline, states};
    use crate::fakes::{Answer, Fakes};
    use crate::workspace::Workspace;
    use copilot_common::model::WorkloadType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removes_everything_of_the_app() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.workload("shop", "api", WorkloadType::LoadBalancedWebService).await;
        fakes.stacks.add("shop-test-api", &[]);
        fakes.stacks.add("pipeline-shop-release", &[]);
        fakes.pipelines.add(pipeline("shop", "release"), states());
        let ctx = fakes.context(dir.path());

        let command = DeleteCommand {
            name: Some("shop".into()),
            yes: true,
        };
        command.runner(&ctx).run().await.unwrap();

        assert_eq!(
            fakes.stacks.deleted(),
            vec![
                "shop-test-api",
                "pipeline-shop-release",
                "shop-test",
                "shop-infrastructure"
            ]
        );
        assert_eq!(fakes.registry.deleted(), vec!["shop/api"]);
        assert_eq!(fakes.uploader.emptied(), vec!["shop-artifacts"]);
        assert!(ctx.store.list_applications().await.unwrap().is_empty());
        assert!(ctx.store.list_environments("shop").await.unwrap().is_empty());
        assert!(workspace.summary().is_err());
    }

    #[tokio::test]
    async fn nothing_is_deleted_without_confirmation() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.prompt.answer(Answer::Yes(false));
        let ctx = fakes.context(std::path::Path::new("."));

        let command = DeleteCommand {
            name: Some("shop".into()),
            yes: false,
        };
        command.runner(&ctx).run().await.unwrap();

        assert!(fakes.stacks.deleted().is_empty());
        assert!(ctx.store.get_application("shop").await.is_ok());
    }
}
